//! JSON files backed by a [`ConfigStore`]
//!
//! A [`ConfigFile`] binds a store to one file on disk. Reads replace the
//! store contents, writes persist the at-rest tree (ciphertext for masked
//! keys) atomically with owner-only permissions.

mod options;

pub use options::{
    ConfigFileOptions, ConfigFileOptionsBuilder, ConfigLocation, DEFAULT_STATE_FOLDER, global_dir,
};

use std::fs::Metadata;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use crate::crypto::Crypto;
use crate::error::{Error, Result};
use crate::storage::{JsonStorage, StorageBackend};
use crate::store::{ConfigContents, ConfigSchema, ConfigStore};

/// A [`ConfigStore`] persisted as a JSON object in a single file
///
/// Derefs to the store, so every store operation is available directly.
///
/// # Example
///
/// ```no_run
/// use crmkit::{ConfigFile, ConfigFileOptions, ConfigLocation};
///
/// let options = ConfigFileOptions::builder("config.json")
///     .location(ConfigLocation::local("."))
///     .build();
///
/// let mut settings = ConfigFile::<()>::open(options, None)?;
/// settings.set("defaultusername", "admin@example.com")?;
/// settings.write_if_changed()?;
/// # Ok::<(), crmkit::Error>(())
/// ```
pub struct ConfigFile<Schema: ConfigSchema = ()> {
    store: ConfigStore<Schema>,
    path: PathBuf,
    storage: JsonStorage,
    throw_on_not_found: bool,
}

impl<Schema: ConfigSchema> ConfigFile<Schema> {
    /// Resolve the file path and create an empty store; no I/O happens
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the path cannot be resolved and
    /// `Error::InvalidPattern` if the schema declares a bad pattern.
    pub fn new(options: ConfigFileOptions, crypto: Option<Arc<Crypto>>) -> Result<Self> {
        let path = options.file_path()?;
        Ok(Self {
            store: ConfigStore::new(crypto)?,
            path,
            storage: options.storage,
            throw_on_not_found: options.throw_on_not_found,
        })
    }

    /// Create the file handle, initialize crypto if the schema masks keys,
    /// then load the file
    ///
    /// # Errors
    ///
    /// Any error from [`new`](Self::new), [`Crypto::init`] or
    /// [`read`](Self::read).
    pub fn open(options: ConfigFileOptions, crypto: Option<Arc<Crypto>>) -> Result<Self> {
        let mut file = Self::new(options, crypto)?;
        if !Schema::ENCRYPTED_KEYS.is_empty() {
            if let Some(crypto) = file.store.crypto() {
                crypto.init()?;
            }
        }
        let throw_on_not_found = file.throw_on_not_found;
        file.read(throw_on_not_found)?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Filesystem metadata of the file
    ///
    /// # Errors
    ///
    /// Returns `Error::PathNotFound` if the file does not exist.
    pub fn stat(&self) -> Result<Metadata> {
        std::fs::metadata(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::PathNotFound(self.path.display().to_string())
            } else {
                Error::FileRead {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })
    }

    /// Replace the store contents with the file's contents
    ///
    /// A missing file loads as an empty object unless `throw_on_not_found`
    /// is set. Tracking is cleared afterwards, so a freshly read file has no
    /// pending changes.
    ///
    /// # Errors
    ///
    /// - `Error::PathNotFound` if the file is missing and `throw_on_not_found`
    /// - `Error::FileRead` on I/O failure
    /// - `Error::Parse` if the file is not a JSON object
    pub fn read(&mut self, throw_on_not_found: bool) -> Result<&ConfigContents> {
        let contents = if self.exists() {
            debug!("Reading config file: {}", self.path.display());
            match self.storage.read::<Value>(&self.path)? {
                Value::Object(map) => map,
                other => {
                    return Err(Error::Parse(format!(
                        "Expected a JSON object in {}, found {}",
                        self.path.display(),
                        json_kind(&other)
                    )));
                }
            }
        } else if throw_on_not_found {
            return Err(Error::PathNotFound(self.path.display().to_string()));
        } else {
            debug!(
                "Config file {} not found, starting empty",
                self.path.display()
            );
            ConfigContents::new()
        };

        self.store.set_contents(contents);
        self.store.clear_tracking();
        Ok(self.store.contents())
    }

    /// Persist the at-rest contents, replacing the file atomically
    ///
    /// # Errors
    ///
    /// Returns `Error::DirectoryCreate` or `Error::FileWrite` on I/O failure.
    pub fn write(&mut self) -> Result<()> {
        self.storage.write(&self.path, self.store.contents())?;
        self.store.clear_tracking();
        info!("Wrote config file: {}", self.path.display());
        Ok(())
    }

    /// Persist only when the store has recorded changes
    ///
    /// Returns whether a write happened.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn write_if_changed(&mut self) -> Result<bool> {
        if !self.store.has_changes() {
            debug!("No changes to write for {}", self.path.display());
            return Ok(false);
        }
        self.write()?;
        Ok(true)
    }

    /// Delete the file; the in-memory contents are kept
    ///
    /// # Errors
    ///
    /// Returns `Error::PathNotFound` if the file does not exist.
    pub fn unlink(&self) -> Result<()> {
        if !self.exists() {
            return Err(Error::PathNotFound(self.path.display().to_string()));
        }
        crate::error::remove_file(&self.path)?;
        info!("Removed config file: {}", self.path.display());
        Ok(())
    }

    /// Take the store out of the file handle
    pub fn into_store(self) -> ConfigStore<Schema> {
        self.store
    }
}

impl<Schema: ConfigSchema> Deref for ConfigFile<Schema> {
    type Target = ConfigStore<Schema>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl<Schema: ConfigSchema> DerefMut for ConfigFile<Schema> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
