//! Command implementations dispatched from main.rs.

pub mod preprocess;
pub mod query;

// Re-export main entry points
pub use preprocess::{execute_preprocess, PreprocessArgs};
pub use query::{execute_headers, execute_query, HeadersArgs, QueryArgs};
