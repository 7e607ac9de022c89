//! Masking policy: which keys are encrypted at rest

use crate::error::{Error, Result};
use crate::path::Path;
use regex::{Regex, RegexBuilder};

/// Encrypted-key declaration, as written in a [`ConfigSchema`](super::ConfigSchema)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptedKey {
    /// Matches a key with exactly this name (case-sensitive)
    Exact(&'static str),
    /// Case-insensitive regex searched anywhere in the key name
    Pattern(&'static str),
}

/// Keys encrypted in every store regardless of schema
pub const DEFAULT_ENCRYPTED_KEYS: &[EncryptedKey] = &[EncryptedKey::Pattern("secret")];

/// Compiled form of an [`EncryptedKey`]
#[derive(Debug, Clone)]
pub enum KeyMatcher {
    Exact(String),
    Pattern(Regex),
}

impl KeyMatcher {
    /// Compile a declaration
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if a pattern is not a valid regex.
    pub fn compile(key: &EncryptedKey) -> Result<Self> {
        match key {
            EncryptedKey::Exact(name) => Ok(KeyMatcher::Exact((*name).to_string())),
            EncryptedKey::Pattern(pattern) => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(KeyMatcher::Pattern)
                .map_err(|e| Error::InvalidPattern {
                    pattern: (*pattern).to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatcher::Exact(name) => name == key,
            KeyMatcher::Pattern(regex) => regex.is_match(key),
        }
    }
}

/// Decides whether a value is stored encrypted, from its terminal key alone
#[derive(Debug, Clone, Default)]
pub struct MaskingPolicy {
    matchers: Vec<KeyMatcher>,
}

impl MaskingPolicy {
    /// Policy for `declared` keys plus [`DEFAULT_ENCRYPTED_KEYS`]
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if any pattern fails to compile.
    pub fn new(declared: &[EncryptedKey]) -> Result<Self> {
        let matchers = declared
            .iter()
            .chain(DEFAULT_ENCRYPTED_KEYS)
            .map(KeyMatcher::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { matchers })
    }

    /// Whether a value stored under `key` is masked
    pub fn matches_key(&self, key: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(key))
    }

    /// Whether the value at `path` is masked (judged by its terminal segment)
    pub fn should_mask(&self, path: &Path) -> bool {
        self.matches_key(&path.terminal().as_key())
    }
}
