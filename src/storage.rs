//! Storage backend trait and the JSON implementation used by config files

use crate::error::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;

/// On-disk encoding of config and key files
///
/// Only JSON is implemented; the trait keeps the encoding apart from the
/// read/modify/write flow in `file`.
pub trait StorageBackend: Clone + Send + Sync {
    /// Extension without the dot, e.g. `json`
    fn extension(&self) -> &str;

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String>;

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T>;

    /// Decode the whole file at `path`
    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = crate::error::read_file(path)?;
        self.deserialize(&content)
    }

    /// Replace the file at `path` with the encoded `data`
    ///
    /// The content goes to `<name>.tmp` first, is restricted to the owner,
    /// then renamed over the target so readers never see a partial file.
    fn write<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let content = self.serialize(data)?;

        if let Some(parent) = path.parent() {
            crate::security::ensure_secure_dir(parent)?;
        }

        let file_name = path.file_name().ok_or_else(|| {
            Error::Config(format!(
                "Invalid path '{}': must have a filename",
                path.display()
            ))
        })?;
        let mut temp_filename = file_name.to_os_string();
        temp_filename.push(".tmp");
        let temp_path = path.with_file_name(temp_filename);

        std::fs::write(&temp_path, &content).map_err(|e| Error::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;
        crate::security::set_secure_file_permissions(&temp_path)?;

        std::fs::rename(&temp_path, path).map_err(|e| Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// JSON encoding, indented unless built with [`JsonStorage::compact`]
#[derive(Clone, Debug)]
pub struct JsonStorage {
    pretty: bool,
}

impl JsonStorage {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Single-line output, for files nobody edits by hand
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for JsonStorage {
    fn extension(&self) -> &str {
        "json"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(data).map_err(Error::from)
        } else {
            serde_json::to_string(data).map_err(Error::from)
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        serde_json::from_str(content).map_err(|e| Error::Parse(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
