//! Common test utilities for crmkit integration tests
//!
//! Provides shared schemas, a temp-dir fixture and helper functions.

#![allow(dead_code)]

use crmkit::{
    ConfigFile, ConfigFileOptions, ConfigLocation, ConfigSchema, Crypto, EncryptedKey,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

// =============================================================================
// Test Schemas
// =============================================================================

/// Schema mixing exact and pattern keys
pub struct BillingSchema;

impl ConfigSchema for BillingSchema {
    const ENCRYPTED_KEYS: &'static [EncryptedKey] = &[
        EncryptedKey::Exact("creditCardNumber"),
        EncryptedKey::Exact("credit"),
        EncryptedKey::Pattern("password"),
    ];
}

// =============================================================================
// Test Fixture
// =============================================================================

/// Isolated state directory plus a shared crypto provider
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub crypto: Arc<Crypto>,
}

impl TestFixture {
    pub fn new() -> Self {
        init_logging();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let crypto = Arc::new(Crypto::in_memory());
        crypto.init().expect("Failed to init crypto");
        Self { temp_dir, crypto }
    }

    /// Location that resolves to the temp dir itself
    pub fn location(&self) -> ConfigLocation {
        ConfigLocation::Explicit(self.temp_dir.path().to_path_buf())
    }

    pub fn options(&self, filename: &str) -> ConfigFileOptions {
        ConfigFileOptions::builder(filename)
            .location(self.location())
            .build()
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.temp_dir.path().join(filename)
    }

    /// Open a billing file sharing the fixture's crypto
    pub fn billing_file(&self, filename: &str) -> ConfigFile<BillingSchema> {
        ConfigFile::open(self.options(filename), Some(self.crypto.clone()))
            .expect("Failed to open config file")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Raw JSON content of a file, if present
pub fn read_json(path: &std::path::Path) -> Option<serde_json::Value> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
