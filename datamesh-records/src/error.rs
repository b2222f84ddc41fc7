use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::EntityId;

/// Input shape problems: missing or malformed columns and identifiers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required column `{column}`")]
    MissingColumn { column: String },
    #[error("column `{column}` is null")]
    NullValue { column: String },
    #[error("column `{column}` holds non-numeric value {value:?}")]
    NotNumeric { column: String, value: String },
    #[error("entity id {entity_id} appears more than once")]
    DuplicateEntity { entity_id: EntityId },
    #[error("column `{column}` declared more than once")]
    DuplicateColumn { column: String },
    #[error("at least one column must be declared")]
    NoColumns,
    #[error("column `{column}` cannot be used here: {reason}")]
    ReservedColumn { column: String, reason: &'static str },
}

/// How a transformation reacts to a bad row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorMode {
    /// The first failure aborts the whole call.
    #[default]
    Strict,
    /// The offending row is dropped and its failure reported with the result.
    Lenient,
}

/// Which row (and, when known, which entity and column) failed and why.
#[derive(Clone, Debug, PartialEq)]
pub struct CellFailure<E> {
    pub row: usize,
    pub entity_id: Option<EntityId>,
    pub column: Option<String>,
    pub error: E,
}

impl<E> CellFailure<E> {
    pub fn row(row: usize, error: E) -> Self {
        Self {
            row,
            entity_id: None,
            column: None,
            error,
        }
    }

    pub fn entity(mut self, entity_id: Option<EntityId>) -> Self {
        self.entity_id = entity_id;
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn map<F, T>(self, f: F) -> CellFailure<T>
    where
        F: FnOnce(E) -> T,
    {
        CellFailure {
            row: self.row,
            entity_id: self.entity_id,
            column: self.column,
            error: f(self.error),
        }
    }
}

impl<E: fmt::Display> fmt::Display for CellFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.row)?;
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity {entity_id})")?;
        }
        if let Some(column) = &self.column {
            write!(f, " column `{column}`")?;
        }
        write!(f, ": {}", self.error)
    }
}

impl<E: Error + 'static> Error for CellFailure<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// Applies an [`ErrorMode`] to per-row failures.
#[derive(Debug)]
pub struct FailureLog<E> {
    mode: ErrorMode,
    failures: Vec<CellFailure<E>>,
}

impl<E> FailureLog<E> {
    pub fn new(mode: ErrorMode) -> Self {
        Self {
            mode,
            failures: Vec::new(),
        }
    }

    /// Strict mode hands the failure back for the caller to abort with;
    /// lenient mode keeps it and lets processing continue.
    pub fn record(&mut self, failure: CellFailure<E>) -> Result<(), CellFailure<E>> {
        match self.mode {
            ErrorMode::Strict => Err(failure),
            ErrorMode::Lenient => {
                self.failures.push(failure);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_failures(self) -> Vec<CellFailure<E>> {
        self.failures
    }
}

/// Rejects an empty or repeated column declaration.
pub fn ensure_distinct_columns<'a, I>(columns: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::BTreeSet::new();
    for column in columns {
        if !seen.insert(column) {
            return Err(ValidationError::DuplicateColumn {
                column: column.to_owned(),
            });
        }
    }
    if seen.is_empty() {
        return Err(ValidationError::NoColumns);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_log_returns_first_failure() {
        let mut log = FailureLog::new(ErrorMode::Strict);
        let failure = CellFailure::row(3, ValidationError::NoColumns);
        assert_eq!(log.record(failure.clone()), Err(failure));
        assert!(log.is_empty());
    }

    #[test]
    fn lenient_log_collects_failures() {
        let mut log = FailureLog::new(ErrorMode::Lenient);
        log.record(CellFailure::row(0, ValidationError::NoColumns))
            .unwrap();
        log.record(
            CellFailure::row(
                1,
                ValidationError::MissingColumn {
                    column: "age".into(),
                },
            )
            .column("age"),
        )
        .unwrap();
        assert_eq!(log.len(), 2);
        let failures = log.into_failures();
        assert_eq!(failures[1].column.as_deref(), Some("age"));
    }

    #[test]
    fn failure_display_names_entity_and_column() {
        let failure = CellFailure::row(
            4,
            ValidationError::NullValue {
                column: "ssn".into(),
            },
        )
        .entity(Some(EntityId::new("u9")))
        .column("ssn");
        assert_eq!(
            failure.to_string(),
            "row 4 (entity u9) column `ssn`: column `ssn` is null"
        );
    }

    #[test]
    fn detects_duplicate_and_empty_declarations() {
        assert_eq!(
            ensure_distinct_columns(["a", "b", "a"]),
            Err(ValidationError::DuplicateColumn { column: "a".into() })
        );
        assert_eq!(
            ensure_distinct_columns(std::iter::empty()),
            Err(ValidationError::NoColumns)
        );
        assert!(ensure_distinct_columns(["a", "b"]).is_ok());
    }
}
