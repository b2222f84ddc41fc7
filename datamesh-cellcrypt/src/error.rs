use datamesh_records::{CellFailure, ValidationError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CellCryptError>;

/// Why a single cell could not be sealed or opened.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CellError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no key entry for cell")]
    MissingKey,
    #[error("key dataset holds more than one row for this entity")]
    DuplicateKeyRow,
    #[error("authentication tag verification failed")]
    Authentication,
    #[error("{field} is not valid base64 text")]
    Encoding { field: &'static str },
    #[error("key must be 16 or 32 bytes, got {0}")]
    KeyLength(usize),
    #[error("nonce must be 12 bytes, got {0}")]
    NonceLength(usize),
    #[error("decrypted bytes are not valid utf-8")]
    NotUtf8,
    #[error("aes-gcm seal failed")]
    Seal,
}

#[derive(Debug, Error)]
pub enum CellCryptError {
    #[error("invalid column declaration: {0}")]
    Declaration(#[from] ValidationError),
    #[error(transparent)]
    Cell(#[from] CellFailure<CellError>),
    #[error("secure random source failed: {0}")]
    Entropy(#[from] rand::Error),
}

impl CellCryptError {
    /// The per-cell cause, when the call aborted on a specific cell.
    pub fn cell_error(&self) -> Option<&CellError> {
        match self {
            CellCryptError::Cell(failure) => Some(&failure.error),
            _ => None,
        }
    }
}
