//! OS keychain key store using the keyring crate

use super::KeyStore;
use crate::error::{Error, Result};
use keyring::Entry;
use log::{debug, warn};

/// Key store backed by the platform keychain
pub struct KeychainKeyStore {
    service_name: String,
}

impl KeychainKeyStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        Entry::new(&self.service_name, name)
            .map_err(|e| Error::KeyStore(format!("{name}: Failed to create keychain entry: {e}")))
    }
}

impl KeyStore for KeychainKeyStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        match self.entry(name)?.get_password() {
            Ok(value) => {
                debug!("Key retrieved from keychain: {name}");
                Ok(Some(value))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                warn!("Failed to read key from keychain: {e}");
                Err(Error::KeyStore(format!("{name}: Failed to read key: {e}")))
            }
        }
    }

    fn store(&self, name: &str, value: &str) -> Result<()> {
        self.entry(name)?
            .set_password(value)
            .map_err(|e| Error::KeyStore(format!("{name}: Failed to store key in keychain: {e}")))?;
        debug!("Key stored in keychain: {name}");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        match self.entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::KeyStore(format!("{name}: Failed to remove key: {e}"))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "keychain"
    }
}
