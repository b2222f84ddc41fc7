use datamesh_records::{CellFailure, ValidationError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnonymizeError>;

#[derive(Debug, Error)]
pub enum AnonymizeError {
    #[error("k must be at least 1, got {k}")]
    InvalidK { k: usize },
    #[error("invalid column declaration: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Row(#[from] CellFailure<ValidationError>),
    #[error("argon2 hashing failed: {0}")]
    Hashing(String),
}

impl From<argon2::Error> for AnonymizeError {
    fn from(err: argon2::Error) -> Self {
        AnonymizeError::Hashing(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AnonymizeError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AnonymizeError::Hashing(err.to_string())
    }
}
