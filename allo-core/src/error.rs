/// Error types for allocation and usage processing
use thiserror::Error;

/// Main error type for allocation operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlloError {
    /// Frequency code is not one of D, W, M, A or A-XXX
    #[error("Invalid frequency: {0} (must be one of D, W, M, A, A-JUN, ...)")]
    InvalidFrequency(String),

    /// Restriction type has no magnitude field for the frequency class
    #[error("Invalid restriction type '{restriction}' for frequency {frequency}")]
    InvalidRestrictionType {
        restriction: String,
        frequency: String,
    },

    /// Requested dataset is not in the supported set
    #[error("Invalid dataset name: {0}")]
    InvalidDatasetName(String),

    /// Horizon ends must be both given or both omitted
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// Stream depletion days must be 7, 30 or 150
    #[error("Invalid stream depletion days: {0} (must be 7, 30 or 150)")]
    InvalidStreamDepletionDays(u32),

    /// Group-by column is not a key, site or consent column
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A required field is absent from a source row
    #[error("Missing field '{field}' in {table}")]
    MissingField { table: String, field: String },

    /// A source value could not be converted
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// The source store failed to answer a read
    #[error("Source store error: {0}")]
    Store(String),
}

/// Type alias for Results using AlloError
pub type Result<T> = std::result::Result<T, AlloError>;
