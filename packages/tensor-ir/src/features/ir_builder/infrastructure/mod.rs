pub mod operator_table;
pub mod shape_matcher;

pub use operator_table::OperatorTable;
pub use shape_matcher::match_shape;
