use thiserror::Error;

/// Error types for the compute module
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Input rejected before touching the database
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from budget evaluation
    #[error("Budget error: {0}")]
    Budget(String),

    /// Error while delivering an email
    #[error("Mail error: {0}")]
    Mail(String),

    /// Error while writing CSV output
    #[error("CSV error: {0}")]
    Csv(String),

    /// Runtime error for unexpected situations
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<csv::Error> for ComputeError {
    fn from(error: csv::Error) -> Self {
        ComputeError::Csv(error.to_string())
    }
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;
