mod types;
mod validation;

pub use types::{Key, Query, RangeOperator};
pub use validation::{validate_key, validate_query, validate_table_name};
