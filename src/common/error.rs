use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<base64::DecodeError> for AttendanceError {
    fn from(e: base64::DecodeError) -> Self {
        AttendanceError::DecodeFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
