//! Encrypted storage backend wrapper.
//!
//! The local queue holds personal data of data subjects (names, e-mail
//! addresses, request details), so deployments on shared machines can wrap
//! the file backend with AES-256-GCM encryption at rest.
//!
//! ## Security Model
//!
//! - Each blob is encrypted independently with a fresh random nonce
//! - Blob structure: `nonce (12 bytes) || ciphertext || tag (16 bytes)`
//! - Keys are never stored; they must be provided by the application
//! - Key material is zeroized on drop

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Encryption key for the encrypted backend.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StorageError::Encryption(format!(
                "invalid key size: expected {KEY_SIZE}, got {}",
                bytes.len()
            )));
        }
        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Generates a random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Returns the key as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An encrypted storage backend that wraps another backend.
///
/// Blob names stay in clear text (they are collection names); blob contents
/// are sealed with AES-256-GCM.
///
/// # Example
///
/// ```
/// use complysync_storage::{EncryptedBackend, EncryptionKey, InMemoryBackend, StorageBackend};
///
/// let key = EncryptionKey::generate();
/// let backend = EncryptedBackend::new(Box::new(InMemoryBackend::new()), key);
/// backend.write("profiles", b"alice@example.com").unwrap();
/// assert_eq!(backend.read("profiles").unwrap().unwrap(), b"alice@example.com");
/// ```
pub struct EncryptedBackend {
    inner: Box<dyn StorageBackend>,
    cipher: Aes256Gcm,
}

impl EncryptedBackend {
    /// Creates a new encrypted backend wrapping the given inner backend.
    pub fn new(inner: Box<dyn StorageBackend>, key: EncryptionKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self { inner, cipher }
    }

    fn encrypt(&self, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| StorageError::Encryption("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, data: &[u8]) -> StorageResult<Vec<u8>> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StorageError::Encryption("ciphertext too short".into()));
        }

        let (nonce, sealed) = data.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| StorageError::Encryption("authentication failed".into()))
    }
}

impl StorageBackend for EncryptedBackend {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        match self.inner.read(name)? {
            Some(data) => self.decrypt(&data).map(Some),
            None => Ok(None),
        }
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        let sealed = self.encrypt(data)?;
        self.inner.write(name, &sealed)
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        self.inner.remove(name)
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        self.inner.names()
    }
}
