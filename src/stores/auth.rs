//! Per-user auth info: `<username>.json`

use std::sync::Arc;

use crate::crypto::Crypto;
use crate::error::Result;
use crate::file::{ConfigFile, ConfigFileOptions, ConfigLocation};
use crate::store::{ConfigSchema, EncryptedKey};

/// Masking schema for auth files
pub struct AuthSchema;

impl ConfigSchema for AuthSchema {
    const ENCRYPTED_KEYS: &'static [EncryptedKey] = &[
        EncryptedKey::Exact("accessToken"),
        EncryptedKey::Exact("refreshToken"),
        EncryptedKey::Exact("clientSecret"),
        EncryptedKey::Pattern("token"),
        EncryptedKey::Pattern("password"),
        EncryptedKey::Pattern("secret"),
    ];
}

/// Auth info for one username, tokens encrypted at rest
pub type AuthFile = ConfigFile<AuthSchema>;

impl ConfigFile<AuthSchema> {
    /// Open the auth file of `username`, initializing `crypto` first
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `username` cannot be used as a file name,
    /// plus any error from [`ConfigFile::open`].
    pub fn for_username(
        username: &str,
        location: ConfigLocation,
        crypto: Arc<Crypto>,
    ) -> Result<Self> {
        super::validate_file_stem("username", username)?;
        let options = ConfigFileOptions::builder(format!("{username}.json"))
            .location(location)
            .build();
        Self::open(options, Some(crypto))
    }
}
