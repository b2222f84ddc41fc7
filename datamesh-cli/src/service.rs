//! Command implementations: load the input datasets, run one transformation,
//! write the outputs, and summarize the run.
//!
//! # Example
//! ```
//! use datamesh_cli::config::Config;
//! use datamesh_cli::service::DatameshService;
//!
//! let service = DatameshService::new(Config::sample());
//! assert_eq!(service.quasi_identifiers().len(), 2);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use datamesh_anonymize::{
    AnonymizeConfig, AnonymizeError, AnonymizeWarning, Anonymizer, Pseudonymizer,
    QualityEvaluator, QuasiIdentifier,
};
use datamesh_cellcrypt::{CellCipher, CellCryptError, CipherDataset, KeyDataset};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::store::{ensure_separate, load, load_records, save, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    CellCrypt(#[from] CellCryptError),
    #[error(transparent)]
    Anonymize(#[from] AnonymizeError),
    #[error("missing setting: {0}")]
    Missing(&'static str),
}

/// Rows read, rows written, and rows dropped by lenient mode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub failures: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnonymizeReport {
    pub run: RunReport,
    pub k: usize,
    pub classes: usize,
    pub c_avg: Option<f64>,
    pub warnings: Vec<AnonymizeWarning>,
}

pub struct DatameshService {
    config: Config,
}

impl DatameshService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn quasi_identifiers(&self) -> &[QuasiIdentifier] {
        &self.config.dataset.quasi_identifiers
    }

    pub fn encrypt(
        &self,
        input: &Path,
        id_column: Option<&str>,
        columns: &[String],
        cipher_out: &Path,
        keys_out: &Path,
    ) -> Result<RunReport, ServiceError> {
        ensure_separate(cipher_out, keys_out)?;
        let id_column = self.id_column(id_column)?;
        let columns = pick(columns, &self.config.dataset.encrypt_columns);
        let records = load_records(input)?;

        let output = CellCipher::new(self.config.cellcrypt.clone()).encrypt(
            &records,
            id_column,
            columns,
        )?;
        for failure in &output.failures {
            warn!(%failure, "row left unencrypted");
        }
        save(cipher_out, &output.ciphertexts)?;
        save(keys_out, &output.keys)?;

        Ok(RunReport {
            rows_in: records.len(),
            rows_out: output.ciphertexts.len(),
            failures: output.failures.len(),
        })
    }

    pub fn decrypt(
        &self,
        ciphertexts: &Path,
        keys: &Path,
        id_column: Option<&str>,
        columns: &[String],
        output: &Path,
    ) -> Result<RunReport, ServiceError> {
        let id_column = self.id_column(id_column)?;
        let columns = pick(columns, &self.config.dataset.encrypt_columns);
        let sealed: CipherDataset = load(ciphertexts)?;
        let keys: KeyDataset = load(keys)?;

        let opened = CellCipher::new(self.config.cellcrypt.clone()).decrypt(
            &sealed,
            &keys,
            id_column,
            columns,
        )?;
        for failure in &opened.failures {
            warn!(%failure, "row left sealed");
        }
        save(output, &opened.records)?;

        Ok(RunReport {
            rows_in: sealed.len(),
            rows_out: opened.records.len(),
            failures: opened.failures.len(),
        })
    }

    pub fn anonymize(
        &self,
        input: &Path,
        output: &Path,
        k: Option<usize>,
        suppress: Option<&str>,
    ) -> Result<AnonymizeReport, ServiceError> {
        let qis = self.required_quasi_identifiers()?;
        let config = AnonymizeConfig {
            k: k.unwrap_or(self.config.anonymize.k),
            id_column: self
                .config
                .anonymize
                .id_column
                .clone()
                .or_else(|| self.config.dataset.id_column.clone()),
            ..self.config.anonymize.clone()
        };
        let suppress = suppress.or(self.config.dataset.suppress.as_deref());
        let records = load_records(input)?;

        let anonymized = Anonymizer::new(config).anonymize(&records, qis, suppress)?;
        let run = &anonymized.partitioning;
        for failure in &run.failures {
            warn!(%failure, "row left out of anonymized output");
        }
        save(output, &anonymized.records)?;

        Ok(AnonymizeReport {
            run: RunReport {
                rows_in: records.len(),
                rows_out: anonymized.records.len(),
                failures: run.failures.len(),
            },
            k: run.k,
            classes: run.classes.len(),
            c_avg: run.normalized_average_class_size(),
            warnings: run.warnings.clone(),
        })
    }

    pub fn sweep(
        &self,
        input: &Path,
        k_values: &[usize],
    ) -> Result<BTreeMap<usize, f64>, ServiceError> {
        let qis = self.required_quasi_identifiers()?;
        let k_values = pick(k_values, &self.config.sweep.k_values);
        let records = load_records(input)?;

        let metrics =
            QualityEvaluator::new(self.config.anonymize.clone()).sweep(&records, qis, k_values)?;
        info!(points = metrics.len(), "sweep complete");
        Ok(metrics)
    }

    pub fn hash(
        &self,
        input: &Path,
        columns: &[String],
        output: &Path,
    ) -> Result<RunReport, ServiceError> {
        let columns = pick(columns, &self.config.dataset.hash_columns);
        if columns.is_empty() {
            return Err(ServiceError::Missing("hash columns"));
        }
        let records = load_records(input)?;

        let hashed = Pseudonymizer::new(self.config.hashing.clone())?.pseudonymize(&records, columns)?;
        for failure in &hashed.failures {
            warn!(%failure, "row left out of hashed output");
        }
        save(output, &hashed.records)?;

        Ok(RunReport {
            rows_in: records.len(),
            rows_out: hashed.records.len(),
            failures: hashed.failures.len(),
        })
    }

    fn id_column<'a>(&'a self, flag: Option<&'a str>) -> Result<&'a str, ServiceError> {
        flag.or(self.config.dataset.id_column.as_deref())
            .ok_or(ServiceError::Missing("id column"))
    }

    fn required_quasi_identifiers(&self) -> Result<&[QuasiIdentifier], ServiceError> {
        let qis = self.quasi_identifiers();
        if qis.is_empty() {
            return Err(ServiceError::Missing("quasi-identifiers"));
        }
        Ok(qis)
    }
}

/// Command-line values win over configured ones when any were given.
fn pick<'a, T>(flags: &'a [T], configured: &'a [T]) -> &'a [T] {
    if flags.is_empty() {
        configured
    } else {
        flags
    }
}
