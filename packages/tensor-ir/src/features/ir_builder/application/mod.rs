pub mod builder;
pub mod guard;

pub use builder::{BuildOutput, Closed, IRBuilder};
pub use guard::FrameGuard;
