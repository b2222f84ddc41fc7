//! Replaces direct identifiers with salted Argon2id hashes.
//!
//! Each listed column `c` becomes `c<suffix>` holding a PHC string
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`). Every cell gets its own
//! random salt, so equal inputs never produce equal outputs; use
//! [`Pseudonymizer::verify`] to check a value against a stored hash.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use datamesh_records::{
    ensure_distinct_columns, CellFailure, FailureLog, Record, ValidationError, Value,
};
use rand::rngs::OsRng;
use rand::RngCore;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::HashingConfig;
use crate::error::{AnonymizeError, Result};

const SALT_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub struct PseudonymizedDataset {
    pub records: Vec<Record>,
    pub failures: Vec<CellFailure<ValidationError>>,
}

#[derive(Clone)]
pub struct Pseudonymizer {
    argon2: Argon2<'static>,
    config: HashingConfig,
}

impl Pseudonymizer {
    /// Fails with [`AnonymizeError::Hashing`] when the cost parameters are
    /// out of Argon2's range.
    pub fn new(config: HashingConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_cost_kib,
            config.time_cost,
            config.parallelism,
            None,
        )?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            config,
        })
    }

    pub fn config(&self) -> &HashingConfig {
        &self.config
    }

    pub fn hashed_column(&self, column: &str) -> String {
        format!("{column}{}", self.config.suffix)
    }

    /// PHC hash of `value` under a fresh salt.
    pub fn hash_value(&self, value: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt).map_err(|err| AnonymizeError::Hashing(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt)?;
        Ok(self.argon2.hash_password(value.as_bytes(), &salt)?.to_string())
    }

    /// `Ok(false)` for a well-formed hash of some other value; `Err` when
    /// `phc` does not parse.
    pub fn verify(&self, value: &str, phc: &str) -> Result<bool> {
        let hash = PasswordHash::new(phc)?;
        Ok(self.argon2.verify_password(value.as_bytes(), &hash).is_ok())
    }

    /// Rows are checked before any hash is computed: strict mode stops at the
    /// first bad row, lenient mode hashes only the rows that pass.
    pub fn pseudonymize<S: AsRef<str>>(
        &self,
        records: &[Record],
        columns: &[S],
    ) -> Result<PseudonymizedDataset> {
        let columns = self.declared_columns(columns)?;
        debug!(rows = records.len(), columns = columns.len(), "pseudonymizing");

        let mut failures = FailureLog::new(self.config.error_mode);
        let mut accepted = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            match self.check_row(record, &columns) {
                Ok(()) => accepted.push(record),
                Err((column, err)) => {
                    warn!(row, column = %column, error = %err, "skipping row");
                    failures.record(CellFailure::row(row, err).column(column))?;
                }
            }
        }

        let hash_row = |record: &&Record| -> Result<Record> {
            let mut output = (*record).clone();
            for &column in &columns {
                let replacement = match record.get(column).and_then(Value::plaintext) {
                    None => Value::Null,
                    Some(text) => Value::Text(self.hash_value(&text)?),
                };
                output.remove(column);
                output.insert(self.hashed_column(column), replacement);
            }
            Ok(output)
        };
        let output = if self.config.parallel {
            accepted.par_iter().map(hash_row).collect::<Result<Vec<_>>>()?
        } else {
            accepted.iter().map(hash_row).collect::<Result<Vec<_>>>()?
        };

        info!(rows = output.len(), failures = failures.len(), "pseudonymization complete");
        Ok(PseudonymizedDataset {
            records: output,
            failures: failures.into_failures(),
        })
    }

    fn declared_columns<'a, S: AsRef<str>>(
        &self,
        columns: &'a [S],
    ) -> std::result::Result<Vec<&'a str>, ValidationError> {
        let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
        ensure_distinct_columns(columns.iter().copied())?;
        for &column in &columns {
            let target = self.hashed_column(column);
            if target != column && columns.contains(&target.as_str()) {
                return Err(ValidationError::ReservedColumn {
                    column: target,
                    reason: "another listed column hashes into it",
                });
            }
        }
        Ok(columns)
    }

    fn check_row(
        &self,
        record: &Record,
        columns: &[&str],
    ) -> std::result::Result<(), (String, ValidationError)> {
        for &column in columns {
            record.require(column).map_err(|err| (column.to_owned(), err))?;
            let target = self.hashed_column(column);
            if target != column && record.contains(&target) {
                return Err((
                    column.to_owned(),
                    ValidationError::ReservedColumn {
                        column: target,
                        reason: "the row already holds it and hashing would overwrite it",
                    },
                ));
            }
        }
        Ok(())
    }
}
