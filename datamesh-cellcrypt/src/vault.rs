//! The two artifacts of an encryption run. [`CipherDataset`] keeps the
//! original rows with ciphertext in the encrypted columns; [`KeyDataset`]
//! keeps one row per entity with `<column>_key` / `<column>_nonce` pairs.
//! Holding both is equivalent to holding the plaintext, so they are separate
//! types that serialize independently and are never merged.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use datamesh_records::{EntityId, Record, Value};
use serde::{Deserialize, Serialize};

use crate::{
    cell::{CellKey, CellMaterial, CellNonce},
    error::CellError,
};

pub fn key_column(column: &str) -> String {
    format!("{column}_key")
}

pub fn nonce_column(column: &str) -> String {
    format!("{column}_nonce")
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherDataset {
    records: Vec<Record>,
}

impl CipherDataset {
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyDataset {
    rows: Vec<Record>,
}

impl KeyDataset {
    pub fn from_records(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    pub fn records(&self) -> &[Record] {
        &self.rows
    }

    pub fn into_records(self) -> Vec<Record> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Ciphertext of one encrypted cell; `None` when the plaintext was null or absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CipherCell {
    pub entity_id: EntityId,
    pub column: String,
    pub ciphertext: Option<Vec<u8>>,
}

impl CipherCell {
    pub fn read(record: &Record, entity_id: &EntityId, column: &str) -> Result<Self, CellError> {
        let ciphertext = match record.get(column) {
            None | Some(Value::Null) => None,
            Some(value) => Some(decode_field(value, "ciphertext")?),
        };
        Ok(Self {
            entity_id: entity_id.clone(),
            column: column.to_owned(),
            ciphertext,
        })
    }
}

/// Decoded key material for one (entity, column) pair.
#[derive(Clone, Debug)]
pub struct KeyEntry {
    pub entity_id: EntityId,
    pub column: String,
    pub key: CellKey,
    pub nonce: CellNonce,
}

/// Builds the key-dataset row for one entity from its per-column material.
pub(crate) fn key_row<'a, I>(id_column: &str, id_value: Value, cells: I) -> Record
where
    I: IntoIterator<Item = (&'a str, Option<&'a CellMaterial>)>,
{
    let mut row = Record::new().with(id_column, id_value);
    for (column, material) in cells {
        let (key, nonce) = match material {
            Some(material) => (
                Value::Text(STANDARD.encode(material.key.as_bytes())),
                Value::Text(STANDARD.encode(material.nonce.as_bytes())),
            ),
            None => (Value::Null, Value::Null),
        };
        row.insert(key_column(column), key);
        row.insert(nonce_column(column), nonce);
    }
    row
}

pub(crate) fn encode_ciphertext(ciphertext: Option<&[u8]>) -> Value {
    match ciphertext {
        Some(bytes) => Value::Text(STANDARD.encode(bytes)),
        None => Value::Null,
    }
}

enum Slot<'a> {
    Unique(&'a Record),
    Duplicate,
}

/// Lookup index over a [`KeyDataset`], keyed by entity id.
pub struct KeyVault<'a> {
    slots: HashMap<EntityId, Slot<'a>>,
    skipped: usize,
}

impl<'a> KeyVault<'a> {
    pub fn index(keys: &'a KeyDataset, id_column: &str) -> Self {
        let mut slots = HashMap::with_capacity(keys.len());
        let mut skipped = 0;
        for row in keys.records() {
            let Ok(entity_id) = row.entity_id(id_column) else {
                skipped += 1;
                continue;
            };
            slots
                .entry(entity_id)
                .and_modify(|slot| *slot = Slot::Duplicate)
                .or_insert(Slot::Unique(row));
        }
        Self { slots, skipped }
    }

    /// Key rows that carried no usable entity id and can never be joined.
    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn entry(&self, entity_id: &EntityId, column: &str) -> Result<KeyEntry, CellError> {
        let row = match self.slots.get(entity_id) {
            Some(Slot::Unique(row)) => *row,
            Some(Slot::Duplicate) => return Err(CellError::DuplicateKeyRow),
            None => return Err(CellError::MissingKey),
        };
        let key = match row.get(&key_column(column)) {
            None | Some(Value::Null) => return Err(CellError::MissingKey),
            Some(value) => CellKey::from_bytes(decode_field(value, "key")?)?,
        };
        let nonce = match row.get(&nonce_column(column)) {
            None | Some(Value::Null) => return Err(CellError::MissingKey),
            Some(value) => CellNonce::from_slice(&decode_field(value, "nonce")?)?,
        };
        Ok(KeyEntry {
            entity_id: entity_id.clone(),
            column: column.to_owned(),
            key,
            nonce,
        })
    }
}

fn decode_field(value: &Value, field: &'static str) -> Result<Vec<u8>, CellError> {
    match value {
        Value::Text(text) => STANDARD
            .decode(text.trim())
            .map_err(|_| CellError::Encoding { field }),
        _ => Err(CellError::Encoding { field }),
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::config::KeySize;

    fn keys_for(ids: &[&str]) -> KeyDataset {
        let material = CellMaterial::generate(KeySize::Aes128, &mut OsRng).unwrap();
        KeyDataset::from_records(
            ids.iter()
                .map(|id| key_row("id", Value::text(*id), [("ssn", Some(&material))]))
                .collect(),
        )
    }

    #[test]
    fn key_rows_carry_paired_fields() {
        let keys = keys_for(&["u1"]);
        let row = &keys.records()[0];
        let columns: Vec<&str> = row.columns().collect();
        assert_eq!(columns, vec!["id", "ssn_key", "ssn_nonce"]);
    }

    #[test]
    fn vault_resolves_entries() {
        let keys = keys_for(&["u1", "u2"]);
        let vault = KeyVault::index(&keys, "id");
        let entry = vault.entry(&EntityId::new("u2"), "ssn").unwrap();
        assert_eq!(entry.key.size(), KeySize::Aes128);
        assert_eq!(entry.column, "ssn");
        assert_eq!(
            vault.entry(&EntityId::new("u3"), "ssn").unwrap_err(),
            CellError::MissingKey
        );
        assert_eq!(
            vault.entry(&EntityId::new("u1"), "email").unwrap_err(),
            CellError::MissingKey
        );
    }

    #[test]
    fn vault_flags_duplicate_entities() {
        let keys = keys_for(&["u1", "u1"]);
        let vault = KeyVault::index(&keys, "id");
        assert_eq!(
            vault.entry(&EntityId::new("u1"), "ssn").unwrap_err(),
            CellError::DuplicateKeyRow
        );
    }

    #[test]
    fn null_material_reads_as_missing() {
        let keys = KeyDataset::from_records(vec![key_row("id", Value::text("u1"), [("ssn", None::<&CellMaterial>)])]);
        let vault = KeyVault::index(&keys, "id");
        assert_eq!(
            vault.entry(&EntityId::new("u1"), "ssn").unwrap_err(),
            CellError::MissingKey
        );
    }

    #[test]
    fn rejects_non_base64_material() {
        let keys = KeyDataset::from_records(vec![Record::new()
            .with("id", "u1")
            .with("ssn_key", "@@not-base64@@")
            .with("ssn_nonce", "AAAAAAAAAAAAAAAA")]);
        let vault = KeyVault::index(&keys, "id");
        assert_eq!(
            vault.entry(&EntityId::new("u1"), "ssn").unwrap_err(),
            CellError::Encoding { field: "key" }
        );
    }
}
