//! In-memory key store for tests

use super::KeyStore;
use crate::error::Result;
use crate::sync::RwLockExt;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory key storage (not persisted)
#[derive(Default)]
pub struct MemoryKeyStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.values.read_recovered().get(name).cloned())
    }

    fn store(&self, name: &str, value: &str) -> Result<()> {
        self.values
            .write_recovered()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.values.write_recovered().remove(name);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
