//! Value encryption for masked config fields
//!
//! [`Crypto`] is the capability a [`ConfigStore`](crate::ConfigStore) uses to
//! encrypt masked values at rest. It starts uninitialized; [`Crypto::init`]
//! loads (or generates and persists) a 256-bit key from a [`KeyStore`], after
//! which it stays ready for the lifetime of the value.
//!
//! Key store backends:
//! - **Keychain**: OS-level secure storage - requires `keychain` feature
//! - **File**: JSON key file with owner-only permissions, the portable default
//! - **Memory**: in-memory only, for tests

mod file;
#[cfg(feature = "keychain")]
mod keychain;
mod memory;

pub use file::FileKeyStore;
#[cfg(feature = "keychain")]
pub use keychain::KeychainKeyStore;
pub use memory::MemoryKeyStore;

use crate::error::{Error, Result};
use crate::sync::MutexExt;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info, warn};
use rand::Rng;
use std::sync::{Arc, Mutex, OnceLock};

/// Name the encryption key is stored under in a [`KeyStore`]
pub const KEY_NAME: &str = "crmkit-key";

/// Key size for AES-256-GCM
pub const KEY_LENGTH: usize = 32;

/// Nonce size for AES-GCM (96 bits)
pub const NONCE_LENGTH: usize = 12;

const TAG_LENGTH: usize = 16;

/// Trait for key material storage backends
pub trait KeyStore: Send + Sync {
    /// Retrieve a stored value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, name: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn store(&self, name: &str, value: &str) -> Result<()>;

    /// Remove a value; removing a missing value is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, name: &str) -> Result<()>;

    /// Backend name for logging/debugging
    fn backend_name(&self) -> &'static str;
}

/// Key store that falls back to a second backend when the first fails
///
/// Used to prefer the OS keychain while still working on headless machines
/// (CI, containers) where no keychain daemon is running.
pub struct FallbackKeyStore {
    primary: Arc<dyn KeyStore>,
    fallback: Arc<dyn KeyStore>,
}

impl FallbackKeyStore {
    pub fn new(primary: Arc<dyn KeyStore>, fallback: Arc<dyn KeyStore>) -> Self {
        Self { primary, fallback }
    }
}

impl KeyStore for FallbackKeyStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        match self.primary.get(name) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) => debug!("Primary key store error: {e}"),
        }
        self.fallback.get(name)
    }

    fn store(&self, name: &str, value: &str) -> Result<()> {
        match self.primary.store(name, value) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    "Key store {} failed ({e}), using fallback: {}",
                    self.primary.backend_name(),
                    self.fallback.backend_name()
                );
                self.fallback.store(name, value)
            }
        }
    }

    fn remove(&self, name: &str) -> Result<()> {
        if let Err(e) = self.primary.remove(name) {
            debug!("Primary key store error on remove: {e}");
        }
        self.fallback.remove(name)
    }

    fn backend_name(&self) -> &'static str {
        "fallback"
    }
}

/// Encryption capability backing masked config values
///
/// Share one instance between stores with `Arc<Crypto>`.
pub struct Crypto {
    key_store: Arc<dyn KeyStore>,
    cipher: OnceLock<Aes256Gcm>,
    init_lock: Mutex<()>,
}

impl Crypto {
    /// Create an uninitialized provider reading its key from `key_store`
    pub fn new(key_store: Arc<dyn KeyStore>) -> Self {
        Self {
            key_store,
            cipher: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Create an uninitialized provider with an ephemeral in-memory key store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyStore::new()))
    }

    /// Create a provider that is ready immediately with the given key
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be loaded into the cipher.
    pub fn with_key(key: &[u8; KEY_LENGTH]) -> Result<Self> {
        let store = MemoryKeyStore::new();
        store.store(KEY_NAME, &STANDARD.encode(key))?;
        let crypto = Self::new(Arc::new(store));
        crypto.init()?;
        Ok(crypto)
    }

    /// Provider backed by the platform key store
    ///
    /// With the `keychain` feature this is the OS keychain with the global
    /// key file as fallback; otherwise just the key file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn platform_default() -> Result<Self> {
        let key_file = crate::file::global_dir()?.join(file::KEY_FILE_NAME);
        let file_store: Arc<dyn KeyStore> = Arc::new(FileKeyStore::new(key_file));

        #[cfg(feature = "keychain")]
        let store: Arc<dyn KeyStore> = Arc::new(FallbackKeyStore::new(
            Arc::new(KeychainKeyStore::new("crmkit")),
            file_store,
        ));

        #[cfg(not(feature = "keychain"))]
        let store = file_store;

        Ok(Self::new(store))
    }

    /// Generate a random 32-byte encryption key
    #[must_use]
    pub fn generate_key() -> [u8; KEY_LENGTH] {
        rand::rng().random()
    }

    /// Load or create the key; repeated calls are no-ops
    ///
    /// # Errors
    ///
    /// Returns an error if the key store fails or holds a malformed key.
    pub fn init(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let _guard = self.init_lock.lock_recovered();
        if self.is_ready() {
            return Ok(());
        }

        let key = match self.key_store.get(KEY_NAME)? {
            Some(encoded) => decode_key(&encoded)?,
            None => {
                let key = Self::generate_key();
                self.key_store.store(KEY_NAME, &STANDARD.encode(key))?;
                info!(
                    "Generated new encryption key in {}",
                    self.key_store.backend_name()
                );
                key
            }
        };

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| Error::KeyStore("encryption key: Invalid key length".into()))?;
        let _ = self.cipher.set(cipher);

        debug!("Crypto initialized from {}", self.key_store.backend_name());
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.cipher.get().is_some()
    }

    fn cipher(&self, operation: &str) -> Result<&Aes256Gcm> {
        self.cipher
            .get()
            .ok_or_else(|| Error::CryptoNotInitialized(operation.to_string()))
    }

    /// Encrypt a string into `base64(nonce):base64(ciphertext || tag)`
    ///
    /// Every call uses a fresh random nonce, so equal plaintexts produce
    /// different ciphertexts.
    ///
    /// # Errors
    ///
    /// Returns `Error::CryptoNotInitialized` before [`init`](Self::init).
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher("encrypt")?;

        let nonce_bytes: [u8; NONCE_LENGTH] = rand::rng().random();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| Error::Encryption(format!("{e}")))?;

        Ok(format!(
            "{}:{}",
            STANDARD.encode(nonce_bytes),
            STANDARD.encode(ciphertext)
        ))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt)
    ///
    /// # Errors
    ///
    /// Returns `Error::CryptoNotInitialized` before [`init`](Self::init) and
    /// `Error::Decryption` for malformed input, a wrong key or tampering.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let cipher = self.cipher("decrypt")?;

        let (nonce_bytes, data) = split_ciphertext(ciphertext)
            .ok_or_else(|| Error::Decryption("value is not in nonce:ciphertext form".into()))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), data.as_ref())
            .map_err(|_| Error::Decryption("authentication failed (wrong key?)".into()))?;

        String::from_utf8(plaintext).map_err(|e| Error::Decryption(format!("utf8: {e}")))
    }

    /// Whether `value` has the shape of a ciphertext produced by this type
    ///
    /// A format check only; it cannot tell which key produced the value.
    pub fn is_encrypted(value: &str) -> bool {
        split_ciphertext(value).is_some()
    }
}

fn split_ciphertext(value: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let (nonce, data) = value.split_once(':')?;
    let nonce = STANDARD.decode(nonce).ok()?;
    let data = STANDARD.decode(data).ok()?;
    (nonce.len() == NONCE_LENGTH && data.len() >= TAG_LENGTH).then_some((nonce, data))
}

fn decode_key(encoded: &str) -> Result<[u8; KEY_LENGTH]> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::KeyStore(format!("encryption key: Invalid encoding: {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::KeyStore(format!(
            "encryption key: expected {KEY_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_before_init() {
        let crypto = Crypto::in_memory();
        assert!(!crypto.is_ready());
        assert!(matches!(
            crypto.encrypt("x").unwrap_err(),
            Error::CryptoNotInitialized(_)
        ));
        assert!(matches!(
            crypto.decrypt("x").unwrap_err(),
            Error::CryptoNotInitialized(_)
        ));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let crypto = Crypto::in_memory();
        crypto.init().unwrap();

        let ciphertext = crypto.encrypt("00Dxx0000001gPL!AR8AQ").unwrap();
        assert_ne!(ciphertext, "00Dxx0000001gPL!AR8AQ");
        assert!(Crypto::is_encrypted(&ciphertext));
        assert_eq!(crypto.decrypt(&ciphertext).unwrap(), "00Dxx0000001gPL!AR8AQ");

        let empty = crypto.encrypt("").unwrap();
        assert_eq!(crypto.decrypt(&empty).unwrap(), "");
    }

    #[test]
    fn test_fresh_nonce_each_time() {
        let crypto = Crypto::with_key(&[7u8; KEY_LENGTH]).unwrap();
        let first = crypto.encrypt("same").unwrap();
        let second = crypto.encrypt("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_init_is_idempotent_and_reuses_stored_key() {
        let store = Arc::new(MemoryKeyStore::new());
        let crypto = Crypto::new(store.clone());
        crypto.init().unwrap();
        let stored = store.get(KEY_NAME).unwrap().unwrap();
        crypto.init().unwrap();
        assert_eq!(store.get(KEY_NAME).unwrap().unwrap(), stored);

        // A second provider over the same store decrypts the first one's output
        let ciphertext = crypto.encrypt("secret").unwrap();
        let other = Crypto::new(store);
        other.init().unwrap();
        assert_eq!(other.decrypt(&ciphertext).unwrap(), "secret");
    }

    #[test]
    fn test_concurrent_init_settles_on_one_key() {
        let store = Arc::new(MemoryKeyStore::new());
        let crypto = Arc::new(Crypto::new(store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let crypto = crypto.clone();
                std::thread::spawn(move || crypto.init().unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ciphertext = crypto.encrypt("value").unwrap();
        let reloaded = Crypto::new(store);
        reloaded.init().unwrap();
        assert_eq!(reloaded.decrypt(&ciphertext).unwrap(), "value");
    }

    #[test]
    fn test_wrong_key_fails() {
        let first = Crypto::with_key(&[1u8; KEY_LENGTH]).unwrap();
        let second = Crypto::with_key(&[2u8; KEY_LENGTH]).unwrap();

        let ciphertext = first.encrypt("secret").unwrap();
        assert!(matches!(
            second.decrypt(&ciphertext).unwrap_err(),
            Error::Decryption(_)
        ));
    }

    #[test]
    fn test_malformed_ciphertext() {
        let crypto = Crypto::with_key(&[3u8; KEY_LENGTH]).unwrap();
        for bad in ["plain text", "abc:def", "AAAA:AAAA", ""] {
            assert!(!Crypto::is_encrypted(bad));
            assert!(matches!(
                crypto.decrypt(bad).unwrap_err(),
                Error::Decryption(_)
            ));
        }
    }

    #[test]
    fn test_malformed_stored_key() {
        let store = Arc::new(MemoryKeyStore::new());
        store.store(KEY_NAME, "dG9vIHNob3J0").unwrap();

        let crypto = Crypto::new(store);
        assert!(matches!(crypto.init().unwrap_err(), Error::KeyStore(_)));
        assert!(!crypto.is_ready());
    }

    struct BrokenStore;

    impl KeyStore for BrokenStore {
        fn get(&self, _name: &str) -> Result<Option<String>> {
            Err(Error::KeyStore("unavailable".into()))
        }
        fn store(&self, _name: &str, _value: &str) -> Result<()> {
            Err(Error::KeyStore("unavailable".into()))
        }
        fn remove(&self, _name: &str) -> Result<()> {
            Err(Error::KeyStore("unavailable".into()))
        }
        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_fallback_key_store() {
        let fallback = Arc::new(MemoryKeyStore::new());
        let store = FallbackKeyStore::new(Arc::new(BrokenStore), fallback.clone());

        store.store("k", "v").unwrap();
        assert_eq!(fallback.get("k").unwrap(), Some("v".to_string()));
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
