pub mod frame;
pub mod frame_stack;

pub use frame::{
    BlockFrame, BranchFrame, Frame, FrameKind, FunctionFrame, IfFrame, ModuleFrame, Scope,
};
pub use frame_stack::{FrameId, FrameStack};
