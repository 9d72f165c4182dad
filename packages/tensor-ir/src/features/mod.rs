//! Feature modules - Each feature follows Hexagonal Architecture
//!
//! Each feature contains:
//! - domain/     - Pure logic over IR values
//! - ports/      - Interface definitions (traits)
//! - application/ - Use cases
//! - infrastructure/ - Default implementations

pub mod ir_builder;
pub mod transform;
