//! The per-cell AEAD primitive: one fresh key and one fresh 96-bit nonce per
//! value, AES-GCM with no associated data.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{config::KeySize, error::CellError};

pub const NONCE_LEN: usize = 12;

/// Symmetric key for exactly one cell. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CellKey(Vec<u8>);

impl CellKey {
    pub fn generate<R: RngCore + CryptoRng>(size: KeySize, rng: &mut R) -> Result<Self, rand::Error> {
        let mut bytes = vec![0u8; size.byte_len()];
        rng.try_fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CellError> {
        match KeySize::from_len(bytes.len()) {
            Some(_) => Ok(Self(bytes)),
            None => Err(CellError::KeyLength(bytes.len())),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn size(&self) -> KeySize {
        // constructors only admit 16 or 32 bytes
        if self.0.len() == KeySize::Aes256.byte_len() {
            KeySize::Aes256
        } else {
            KeySize::Aes128
        }
    }
}

impl fmt::Debug for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellKey({}, <redacted>)", self.size().as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellNonce([u8; NONCE_LEN]);

impl CellNonce {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, rand::Error> {
        let mut bytes = [0u8; NONCE_LEN];
        rng.try_fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CellError> {
        let bytes: [u8; NONCE_LEN] = bytes
            .try_into()
            .map_err(|_| CellError::NonceLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Key and nonce generated together for one cell.
#[derive(Clone, Debug)]
pub struct CellMaterial {
    pub key: CellKey,
    pub nonce: CellNonce,
}

impl CellMaterial {
    pub fn generate<R: RngCore + CryptoRng>(size: KeySize, rng: &mut R) -> Result<Self, rand::Error> {
        Ok(Self {
            key: CellKey::generate(size, rng)?,
            nonce: CellNonce::generate(rng)?,
        })
    }
}

/// Encrypts the UTF-8 bytes of `plaintext`; the result is ciphertext || tag.
pub fn seal(material: &CellMaterial, plaintext: &str) -> Result<Vec<u8>, CellError> {
    let nonce = Nonce::from_slice(material.nonce.as_bytes());
    let sealed = match material.key.size() {
        KeySize::Aes128 => Aes128Gcm::new_from_slice(material.key.as_bytes())
            .map_err(|_| CellError::KeyLength(material.key.as_bytes().len()))?
            .encrypt(nonce, plaintext.as_bytes()),
        KeySize::Aes256 => Aes256Gcm::new_from_slice(material.key.as_bytes())
            .map_err(|_| CellError::KeyLength(material.key.as_bytes().len()))?
            .encrypt(nonce, plaintext.as_bytes()),
    };
    sealed.map_err(|_| CellError::Seal)
}

/// Verifies the tag and decrypts. A failed tag never yields plaintext.
pub fn open(key: &CellKey, nonce: &CellNonce, ciphertext: &[u8]) -> Result<String, CellError> {
    let nonce = Nonce::from_slice(nonce.as_bytes());
    let opened = match key.size() {
        KeySize::Aes128 => Aes128Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CellError::KeyLength(key.as_bytes().len()))?
            .decrypt(nonce, ciphertext),
        KeySize::Aes256 => Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CellError::KeyLength(key.as_bytes().len()))?
            .decrypt(nonce, ciphertext),
    };
    let plaintext = opened.map_err(|_| CellError::Authentication)?;
    String::from_utf8(plaintext).map_err(|_| CellError::NotUtf8)
}
