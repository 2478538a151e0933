use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Object not found: {locator}")]
    ObjectNotFound { locator: String },

    #[error("Transfer failed: {message}")]
    TransferError { message: String },

    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Schema conflict: {message}")]
    SchemaConflict { message: String },

    #[error("Load job failed: {message}")]
    LoadJobError { message: String },

    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// 錯誤分類，用於日誌
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Storage,
    Transform,
    Warehouse,
    Configuration,
    System,
}

impl IngestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::InvalidRequest { .. } => ErrorCategory::Request,
            IngestError::ObjectNotFound { .. } | IngestError::TransferError { .. } => {
                ErrorCategory::Storage
            }
            IngestError::MalformedInput { .. }
            | IngestError::SerializationError(_)
            | IngestError::SchemaConflict { .. } => ErrorCategory::Transform,
            IngestError::LoadJobError { .. } => ErrorCategory::Warehouse,
            IngestError::ConfigError { .. } | IngestError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            IngestError::HttpError(_) | IngestError::IoError(_) => ErrorCategory::System,
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        IngestError::InvalidRequest {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        IngestError::MalformedInput {
            message: message.into(),
        }
    }

    pub(crate) fn transfer(message: impl Into<String>) -> Self {
        IngestError::TransferError {
            message: message.into(),
        }
    }

    pub(crate) fn load_job(message: impl Into<String>) -> Self {
        IngestError::LoadJobError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
