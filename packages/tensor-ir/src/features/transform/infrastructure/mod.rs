//! Module-level collaborator passes

pub mod bind_params;
pub mod remove_unused;
pub mod resolve_globals;

pub use bind_params::{bind_params, BindParams};
pub use remove_unused::{remove_unused_functions, RemoveUnusedFunctions};
pub use resolve_globals::{resolve_globals, ResolveGlobals};
