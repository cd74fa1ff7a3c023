use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("Illegal transition from {desde} to {hacia}")]
    InvalidTransition { desde: String, hacia: String },

    #[error("The subscription already uses that plan")]
    NoOpChange,

    #[error("Concurrent modification, please retry")]
    Conflict,

    #[error("Cannot delete: {0}")]
    DependencyInUse(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn transicion(desde: &str, hacia: &str) -> Self {
        AppError::InvalidTransition {
            desde: desde.to_string(),
            hacia: hacia.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidCredentials,
    ValidationError,
    NotFound,
    InvalidTransition,
    NoOpChange,
    Conflict,
    DependencyInUse,
    ProcessingError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::NoOpChange => "NO_OP_CHANGE",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::DependencyInUse => "DEPENDENCY_IN_USE",
            ErrorCode::ProcessingError => "PROCESSING_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
