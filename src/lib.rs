//! # crmkit - CLI state store
//!
//! Path-addressed JSON config files for command-line tooling, with
//! selected values encrypted at rest and dirty tracking for cheap writes.
//!
//! ## Features
//!
//! - **Path expressions**: `a.b`, `a[0]`, `a['x.y']` and `a["x"]` address nested values
//! - **Masked keys**: Per-schema exact keys and case-insensitive patterns are
//!   stored as AES-256-GCM ciphertext; reads can decrypt on demand
//! - **Change tracking**: Every mutation is recorded so unchanged files are never rewritten
//! - **Atomic, private files**: Writes go through a temp file and land with `0600` permissions
//! - **Key storage**: The data key lives in a key file, memory, or the OS keychain
//!   (`keychain` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crmkit::{AuthFile, ConfigLocation, Crypto};
//! use std::sync::Arc;
//!
//! let crypto = Arc::new(Crypto::platform_default()?);
//! let mut auth = AuthFile::for_username("admin@example.com", ConfigLocation::Global, crypto)?;
//!
//! auth.set("accessToken", "00Dxx!AQ4AQ...")?;
//! auth.set("instanceUrl", "https://example.my.salesforce.com")?;
//! auth.write_if_changed()?;
//!
//! // On disk: ciphertext. In memory on demand: plaintext.
//! let token = auth.get_decrypted("accessToken")?;
//! # Ok::<(), crmkit::Error>(())
//! ```
//!
//! ## Defining a Schema
//!
//! ```rust
//! use crmkit::{ConfigSchema, ConfigStore, EncryptedKey};
//!
//! struct Billing;
//!
//! impl ConfigSchema for Billing {
//!     const ENCRYPTED_KEYS: &'static [EncryptedKey] = &[
//!         EncryptedKey::Exact("creditCardNumber"), // exact, case-sensitive
//!         EncryptedKey::Pattern("password"),       // substring, case-insensitive
//!     ];
//! }
//!
//! let store = ConfigStore::<Billing>::new(None)?;
//! assert!(store.policy().matches_key("superPassword"));
//! assert!(store.policy().matches_key("clientSecret")); // default key
//! # Ok::<(), crmkit::Error>(())
//! ```
//!
//! Only the last segment of a path decides masking: with the schema above,
//! `cards.creditCardNumber` is encrypted but `creditCardNumber.type` is not.
//!
//! ## Change Tracking
//!
//! | Operation | `updated` | `deleted` |
//! |-----------|-----------|-----------|
//! | `set("a", v)` | `a` | |
//! | `set("a.b", v)` | `a`, `a.b` | |
//! | `unset("a.b")` | `a` | `a.b` |
//! | `unset("a")` | (nested `a.*` dropped) | `a` |
//! | `set_contents(new)` | every new key | old keys not in `new` |
//!
//! A key is never in both sets at once.

// Core modules
mod error;
pub mod security;
pub mod storage;
mod sync;

// Grouped modules
pub mod crypto;
pub mod file;
pub mod path;
pub mod store;
pub mod stores;

// Re-exports from core
pub use error::{Error, Result};
pub use storage::{JsonStorage, StorageBackend};

pub use crypto::{Crypto, FallbackKeyStore, FileKeyStore, KeyStore, MemoryKeyStore};
#[cfg(feature = "keychain")]
pub use crypto::KeychainKeyStore;

pub use file::{ConfigFile, ConfigFileOptions, ConfigFileOptionsBuilder, ConfigLocation};
pub use path::{IntoPath, Path, Segment};
pub use store::{
    ChangeSet, ConfigContents, ConfigSchema, ConfigStore, DEFAULT_ENCRYPTED_KEYS, EncryptedKey,
    KeyMatcher, MaskingPolicy,
};
pub use stores::{AliasGroup, Aliases, AuthFile, AuthSchema, OrgUsers, ProjectSettings};
