pub mod type_deducer;

pub use type_deducer::{StructInfo, TypeDeducer};
