//! Frame-stack IR builder
//!
//! Hexagonal layout:
//! - domain: frames and the frame stack
//! - ports: type deduction interface
//! - infrastructure: default operator table and shape matching
//! - application: `IRBuilder` entry points and scope guards

pub mod application;
pub mod domain;
pub mod errors;
pub mod infrastructure;
pub mod ports;

pub use application::{BuildOutput, Closed, FrameGuard, IRBuilder};
pub use domain::{FrameKind, FrameStack};
pub use errors::{BuilderError, BuilderResult};
pub use infrastructure::OperatorTable;
pub use ports::{StructInfo, TypeDeducer};
