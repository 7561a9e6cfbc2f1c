use crate::validation::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Row position {position} is out of bounds for ledger '{ledger}' ({len} rows)")]
    RowIndexOutOfBounds {
        ledger: String,
        position: usize,
        len: usize,
    },

    #[error("Invalid applicant identifier '{0}': expected exactly 11 digits")]
    InvalidApplicantId(String),

    #[error("Snapshot for applicant {applicant_id} is corrupt: {details}")]
    CorruptSnapshot {
        applicant_id: String,
        details: String,
    },

    #[error("Snapshot for applicant {applicant_id} moved from revision {expected} to {found} since it was loaded")]
    StaleSnapshot {
        applicant_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("Could not ingest grid record #{index} for '{ledger}': {details}")]
    Ingestion {
        ledger: String,
        index: usize,
        details: String,
    },

    #[error("Crop error: {0}")]
    Crop(String),

    #[error("'{name}' is not a row or column of table '{table}'")]
    UnknownCategory { table: String, name: String },

    #[error("Geographic lookup failed: {0}")]
    Lookup(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "georef")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<rust_xlsxwriter::XlsxError> for IntakeError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        IntakeError::Export(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
