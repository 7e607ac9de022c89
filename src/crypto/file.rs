//! File-backed key store
//!
//! A portable stand-in for the OS keychain: key material lives in a JSON
//! file readable only by the owner. Suitable for CI and containers.

use super::KeyStore;
use crate::error::Result;
use crate::storage::{JsonStorage, StorageBackend};
use crate::sync::RwLockExt;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Default key file name inside the global state folder
pub(crate) const KEY_FILE_NAME: &str = "key.json";

/// On-disk format of the key file
#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    version: u32,
    #[serde(default)]
    keys: BTreeMap<String, String>,
}

/// Key store persisting values to a JSON file with 0600 permissions
pub struct FileKeyStore {
    path: PathBuf,
    storage: JsonStorage,
    cache: RwLock<Option<KeyFile>>,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            storage: JsonStorage::new(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<KeyFile> {
        if !self.path.exists() {
            return Ok(KeyFile::default());
        }
        self.storage.read(&self.path)
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut KeyFile) -> T) -> Result<T> {
        let mut cache = self.cache.write_recovered();
        if cache.is_none() {
            *cache = Some(self.load()?);
        }
        let file = cache.get_or_insert_with(KeyFile::default);
        Ok(f(file))
    }

    fn save(&self, file: &mut KeyFile) -> Result<()> {
        file.version = 1;
        self.storage.write(&self.path, file)
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        self.with_file(|file| file.keys.get(name).cloned())
    }

    fn store(&self, name: &str, value: &str) -> Result<()> {
        let mut cache = self.cache.write_recovered();
        let mut file = match cache.take() {
            Some(file) => file,
            None => self.load()?,
        };
        file.keys.insert(name.to_string(), value.to_string());
        // On failure the cache stays empty so the next access reloads disk
        self.save(&mut file)?;
        *cache = Some(file);

        debug!("Key stored in file: {name}");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut cache = self.cache.write_recovered();
        let mut file = match cache.take() {
            Some(file) => file,
            None => self.load()?,
        };
        if file.keys.remove(name).is_some() {
            self.save(&mut file)?;
        }
        *cache = Some(file);

        debug!("Key removed from file: {name}");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "key_file"
    }
}
