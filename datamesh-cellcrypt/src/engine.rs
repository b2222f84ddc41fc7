use std::collections::HashSet;

use datamesh_records::{
    ensure_distinct_columns, CellFailure, EntityId, FailureLog, Record, ValidationError, Value,
};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    cell::{self, CellMaterial},
    config::CellCryptConfig,
    error::{CellError, Result},
    vault::{
        encode_ciphertext, key_column, key_row, nonce_column, CipherCell, CipherDataset,
        KeyDataset, KeyEntry, KeyVault,
    },
};

type Failure = CellFailure<CellError>;

#[derive(Clone, Debug, Default)]
pub struct EncryptionOutput {
    pub ciphertexts: CipherDataset,
    pub keys: KeyDataset,
    /// Rows left out of both datasets (lenient mode only).
    pub failures: Vec<Failure>,
}

#[derive(Clone, Debug, Default)]
pub struct DecryptionOutput {
    pub records: Vec<Record>,
    /// Rows left out of `records` (lenient mode only).
    pub failures: Vec<Failure>,
}

/// Stateless engine; each call depends only on its inputs and the RNG.
#[derive(Clone, Debug, Default)]
pub struct CellCipher {
    config: CellCryptConfig,
}

struct SealJob<'a> {
    column: &'a str,
    plaintext: Option<String>,
    material: Option<CellMaterial>,
}

struct RowPlan<'a> {
    row: usize,
    entity_id: EntityId,
    cells: Vec<SealJob<'a>>,
}

struct OpenJob<'a> {
    row: usize,
    entity_id: EntityId,
    cells: Vec<(&'a str, Option<(Vec<u8>, KeyEntry)>)>,
}

impl CellCipher {
    pub fn new(config: CellCryptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CellCryptConfig {
        &self.config
    }

    /// Encrypts `columns` of every record with keys and nonces drawn from the
    /// operating system CSPRNG.
    pub fn encrypt<S: AsRef<str>>(
        &self,
        records: &[Record],
        id_column: &str,
        columns: &[S],
    ) -> Result<EncryptionOutput> {
        self.encrypt_with_rng(records, id_column, columns, &mut OsRng)
    }

    /// Same as [`CellCipher::encrypt`] with an explicit randomness source.
    /// Only test harnesses should pass a seeded generator.
    pub fn encrypt_with_rng<S, R>(
        &self,
        records: &[Record],
        id_column: &str,
        columns: &[S],
        rng: &mut R,
    ) -> Result<EncryptionOutput>
    where
        S: AsRef<str>,
        R: RngCore + CryptoRng,
    {
        let columns = declared_columns(id_column, columns)?;
        let mut log = FailureLog::new(self.config.error_mode);
        let mut seen = HashSet::with_capacity(records.len());
        let mut plans = Vec::with_capacity(records.len());
        debug!(
            rows = records.len(),
            columns = columns.len(),
            key_size = self.config.key_size.as_str(),
            "planning cell encryption"
        );

        for (row, record) in records.iter().enumerate() {
            let entity_id = match check_encrypt_row(record, id_column, &mut seen) {
                Ok(entity_id) => entity_id,
                Err(failure) => {
                    let failure = failure_at(row, failure);
                    warn!(%failure, "skipping row");
                    log.record(failure)?;
                    continue;
                }
            };
            // material is drawn in row order so a seeded rng reproduces runs.
            // absent cells pass through as null
            let mut cells = Vec::with_capacity(columns.len());
            for &column in &columns {
                let plaintext = record.get(column).and_then(Value::plaintext);
                let material = match plaintext {
                    Some(_) => Some(CellMaterial::generate(self.config.key_size, rng)?),
                    None => None,
                };
                cells.push(SealJob {
                    column,
                    plaintext,
                    material,
                });
            }
            plans.push(RowPlan {
                row,
                entity_id,
                cells,
            });
        }

        let sealed = self.map_rows(&plans, seal_row);
        let mut ciphertexts = Vec::with_capacity(plans.len());
        let mut keys = Vec::with_capacity(plans.len());
        for (plan, sealed) in plans.iter().zip(sealed) {
            let ciphertext_cells = match sealed {
                Ok(cells) => cells,
                Err(failure) => {
                    warn!(%failure, "skipping row");
                    log.record(failure)?;
                    continue;
                }
            };
            let source = &records[plan.row];
            let mut cipher_record = source.clone();
            for (job, ciphertext) in plan.cells.iter().zip(&ciphertext_cells) {
                cipher_record.insert(job.column, encode_ciphertext(ciphertext.as_deref()));
            }
            let id_value = source.get(id_column).cloned().unwrap_or_default();
            keys.push(key_row(
                id_column,
                id_value,
                plan.cells
                    .iter()
                    .map(|job| (job.column, job.material.as_ref())),
            ));
            ciphertexts.push(cipher_record);
        }

        let failures = log.into_failures();
        info!(
            encrypted_rows = ciphertexts.len(),
            failed_rows = failures.len(),
            "cell encryption finished"
        );
        Ok(EncryptionOutput {
            ciphertexts: CipherDataset::from_records(ciphertexts),
            keys: KeyDataset::from_records(keys),
            failures,
        })
    }

    /// Joins cipher rows to key rows by entity id and opens every declared
    /// column. Tag mismatches surface as [`CellError::Authentication`].
    ///
    /// Opened cells come back as [`Value::Text`] holding the sealed text, so a
    /// number encrypted as `52000` decrypts to `"52000"`. Null or absent cells
    /// come back as [`Value::Null`].
    pub fn decrypt<S: AsRef<str>>(
        &self,
        ciphertexts: &CipherDataset,
        keys: &KeyDataset,
        id_column: &str,
        columns: &[S],
    ) -> Result<DecryptionOutput> {
        let columns = declared_columns(id_column, columns)?;
        let vault = KeyVault::index(keys, id_column);
        if vault.skipped_rows() > 0 {
            warn!(
                skipped = vault.skipped_rows(),
                "key rows without an entity id were ignored"
            );
        }
        debug!(
            rows = ciphertexts.len(),
            key_rows = vault.len(),
            columns = columns.len(),
            "planning cell decryption"
        );

        let prepared: Vec<std::result::Result<OpenJob<'_>, Failure>> = ciphertexts
            .records()
            .iter()
            .enumerate()
            .map(|(row, record)| prepare_open(row, record, id_column, &columns, &vault))
            .collect();
        let opened = self.map_rows(&prepared, |prepared| match prepared {
            Ok(job) => open_row(job),
            Err(failure) => Err(failure.clone()),
        });

        let mut log = FailureLog::new(self.config.error_mode);
        let mut records = Vec::with_capacity(opened.len());
        for (record, opened) in ciphertexts.records().iter().zip(opened) {
            match opened {
                Ok(plain) => {
                    let mut record = record.clone();
                    for (column, value) in plain {
                        record.insert(column, value);
                    }
                    records.push(record);
                }
                Err(failure) => {
                    warn!(%failure, "skipping row");
                    log.record(failure)?;
                }
            }
        }

        let failures = log.into_failures();
        info!(
            decrypted_rows = records.len(),
            failed_rows = failures.len(),
            "cell decryption finished"
        );
        Ok(DecryptionOutput { records, failures })
    }

    fn map_rows<T, U, F>(&self, items: &[T], f: F) -> Vec<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        if self.config.parallel {
            items.par_iter().map(f).collect()
        } else {
            items.iter().map(f).collect()
        }
    }
}

fn declared_columns<'a, S: AsRef<str>>(
    id_column: &str,
    columns: &'a [S],
) -> std::result::Result<Vec<&'a str>, ValidationError> {
    let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    ensure_distinct_columns(columns.iter().copied())?;
    for &column in &columns {
        if column == id_column {
            return Err(ValidationError::ReservedColumn {
                column: column.to_owned(),
                reason: "the id column joins ciphertexts to keys and cannot be encrypted",
            });
        }
        if key_column(column) == id_column || nonce_column(column) == id_column {
            return Err(ValidationError::ReservedColumn {
                column: id_column.to_owned(),
                reason: "the id column collides with a key dataset field",
            });
        }
    }
    Ok(columns)
}

fn check_encrypt_row(
    record: &Record,
    id_column: &str,
    seen: &mut HashSet<EntityId>,
) -> std::result::Result<EntityId, Failure> {
    let entity_id = record
        .entity_id(id_column)
        .map_err(|err| CellFailure::row(0, CellError::from(err)).column(id_column))?;
    if !seen.insert(entity_id.clone()) {
        return Err(CellFailure::row(
            0,
            CellError::from(ValidationError::DuplicateEntity {
                entity_id: entity_id.clone(),
            }),
        )
        .entity(Some(entity_id))
        .column(id_column));
    }
    Ok(entity_id)
}

fn failure_at(row: usize, failure: Failure) -> Failure {
    CellFailure { row, ..failure }
}

fn seal_row(plan: &RowPlan<'_>) -> std::result::Result<Vec<Option<Vec<u8>>>, Failure> {
    plan.cells
        .iter()
        .map(|job| match (&job.plaintext, &job.material) {
            (Some(plaintext), Some(material)) => cell::seal(material, plaintext)
                .map(Some)
                .map_err(|err| {
                    CellFailure::row(plan.row, err)
                        .entity(Some(plan.entity_id.clone()))
                        .column(job.column)
                }),
            _ => Ok(None),
        })
        .collect()
}

fn prepare_open<'a>(
    row: usize,
    record: &Record,
    id_column: &str,
    columns: &[&'a str],
    vault: &KeyVault<'_>,
) -> std::result::Result<OpenJob<'a>, Failure> {
    let entity_id = record
        .entity_id(id_column)
        .map_err(|err| CellFailure::row(row, CellError::from(err)).column(id_column))?;
    let mut cells = Vec::with_capacity(columns.len());
    for &column in columns {
        let fail = |err: CellError| {
            CellFailure::row(row, err)
                .entity(Some(entity_id.clone()))
                .column(column)
        };
        let cipher = CipherCell::read(record, &entity_id, column).map_err(fail)?;
        // a null cell never needs a key and never reaches the cipher
        let job = match cipher.ciphertext {
            Some(ciphertext) => Some((ciphertext, vault.entry(&entity_id, column).map_err(fail)?)),
            None => None,
        };
        cells.push((column, job));
    }
    Ok(OpenJob {
        row,
        entity_id,
        cells,
    })
}

fn open_row<'a>(job: &OpenJob<'a>) -> std::result::Result<Vec<(&'a str, Value)>, Failure> {
    job.cells
        .iter()
        .map(|(column, cell)| match cell {
            Some((ciphertext, entry)) => cell::open(&entry.key, &entry.nonce, ciphertext)
                .map(|plaintext| (*column, Value::Text(plaintext)))
                .map_err(|err| {
                    CellFailure::row(job.row, err)
                        .entity(Some(job.entity_id.clone()))
                        .column(*column)
                }),
            None => Ok((*column, Value::Null)),
        })
        .collect()
}
