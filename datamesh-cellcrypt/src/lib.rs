//! Field-level authenticated encryption for tabular datasets.
//!
//! Every (row, column) cell is sealed with AES-GCM under its own freshly
//! generated key and 96-bit nonce, so no key ever encrypts more than one
//! value. Encryption yields two artifacts: a [`CipherDataset`] with the
//! ciphertext in place of each plaintext, and a [`KeyDataset`] with one row
//! per entity carrying `<column>_key` / `<column>_nonce` in base64. The two
//! must be stored under different access controls; holding both is the same
//! as holding the plaintext.
//!
//! # Quickstart
//! ```
//! use datamesh_cellcrypt::{CellCipher, CellCryptConfig};
//! use datamesh_records::{Record, Value};
//!
//! let cipher = CellCipher::new(CellCryptConfig::default());
//! let records = vec![Record::new().with("id", "u1").with("ssn", "123-45-6789")];
//!
//! let sealed = cipher.encrypt(&records, "id", &["ssn"]).unwrap();
//! assert_ne!(sealed.ciphertexts.records()[0].get("ssn"), records[0].get("ssn"));
//!
//! let opened = cipher
//!     .decrypt(&sealed.ciphertexts, &sealed.keys, "id", &["ssn"])
//!     .unwrap();
//! assert_eq!(opened.records[0].get("ssn"), Some(&Value::text("123-45-6789")));
//! ```

pub mod cell;
pub mod config;
pub mod engine;
pub mod error;
pub mod vault;

pub use cell::{CellKey, CellMaterial, CellNonce, NONCE_LEN};
pub use config::{CellCryptConfig, KeySize};
pub use engine::{CellCipher, DecryptionOutput, EncryptionOutput};
pub use error::{CellCryptError, CellError, Result};
pub use vault::{key_column, nonce_column, CipherCell, CipherDataset, KeyDataset, KeyEntry, KeyVault};
