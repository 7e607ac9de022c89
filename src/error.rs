//! Error types for crmkit

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for crmkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for crmkit
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    FileDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    // -------------------------------------------------------------------------
    // Path Expression Errors
    // -------------------------------------------------------------------------
    #[error("Invalid path expression '{expression}': {reason}")]
    InvalidPath { expression: String, reason: String },

    // -------------------------------------------------------------------------
    // Crypto Errors
    // -------------------------------------------------------------------------
    #[error("Crypto is not initialized (needed for '{0}'); call Crypto::init() first")]
    CryptoNotInitialized(String),

    #[error("Can only encrypt strings but found {found} at '{path}'")]
    InvalidCryptoValue { path: String, found: String },

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Invalid encrypted key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // -------------------------------------------------------------------------
    // Key Store Errors
    // -------------------------------------------------------------------------
    #[error("Key store error: {0}")]
    KeyStore(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is a "not found" type error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::PathNotFound(_))
    }

    /// Check if this error came from the crypto layer
    #[must_use]
    pub fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Error::CryptoNotInitialized(_)
                | Error::InvalidCryptoValue { .. }
                | Error::Decryption(_)
                | Error::Encryption(_)
        )
    }
}

// =============================================================================
// Filesystem Helper Functions
// =============================================================================
// These reduce repetitive map_err patterns in the file and key store modules.

use std::path::Path;

/// Read a file to string with proper error handling
pub(crate) fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Delete a file with proper error handling
pub(crate) fn remove_file(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| Error::FileDelete {
        path: path.to_path_buf(),
        source: e,
    })
}
