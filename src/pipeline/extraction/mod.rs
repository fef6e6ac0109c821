pub mod confidence;
pub mod extractor;
pub mod numeric;
pub mod rules;
pub mod sanitize;
pub mod table_detect;
pub mod types;
pub mod units;

pub use confidence::*;
pub use extractor::*;
pub use sanitize::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid extraction pattern for field '{field}': {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}
