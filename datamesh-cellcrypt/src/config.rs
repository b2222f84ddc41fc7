use datamesh_records::ErrorMode;
use serde::{Deserialize, Serialize};

/// AES key length used for freshly generated cell keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeySize {
    #[default]
    Aes128,
    Aes256,
}

impl KeySize {
    pub const fn byte_len(self) -> usize {
        match self {
            KeySize::Aes128 => 16,
            KeySize::Aes256 => 32,
        }
    }

    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(KeySize::Aes128),
            32 => Some(KeySize::Aes256),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeySize::Aes128 => "aes-128",
            KeySize::Aes256 => "aes-256",
        }
    }
}

/// Cell encryption section.
///
/// # TOML
/// ```text
/// [cellcrypt]
/// key-size = "aes-256"
/// error-mode = "lenient"
/// parallel = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CellCryptConfig {
    /// Length of each generated key. Decryption accepts either size.
    #[serde(default)]
    pub key_size: KeySize,
    /// Abort on the first bad row, or skip it and report it.
    #[serde(default)]
    pub error_mode: ErrorMode,
    /// Seal/open cells on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
}

impl CellCryptConfig {
    pub fn sample() -> Self {
        Self {
            key_size: KeySize::Aes256,
            error_mode: ErrorMode::Strict,
            parallel: true,
        }
    }
}
