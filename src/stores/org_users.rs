//! Usernames known for an org: `orgs/<org_id>.json`

use serde_json::Value;

use crate::error::Result;
use crate::file::{ConfigFile, ConfigFileOptions, ConfigLocation};

const USERNAMES_KEY: &str = "usernames";

/// Usernames authenticated against one org
pub struct OrgUsers {
    org_id: String,
    file: ConfigFile,
}

impl OrgUsers {
    /// Open the metadata file of `org_id`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `org_id` cannot be used as a file name,
    /// plus any error from [`ConfigFile::open`].
    pub fn open(location: ConfigLocation, org_id: &str) -> Result<Self> {
        super::validate_file_stem("org id", org_id)?;
        let options = ConfigFileOptions::builder(format!("orgs/{org_id}.json"))
            .location(location)
            .build();
        Ok(Self {
            org_id: org_id.to_string(),
            file: ConfigFile::open(options, None)?,
        })
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    /// Known usernames, in the order they were added
    pub fn usernames(&self) -> Vec<String> {
        self.file
            .get(USERNAMES_KEY)
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| name.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Add `username` unless already present; returns whether it was added
    ///
    /// # Errors
    ///
    /// Any error from [`ConfigStore::set`](crate::ConfigStore::set).
    pub fn add_username(&mut self, username: &str) -> Result<bool> {
        let mut usernames = self.usernames();
        if usernames.iter().any(|known| known == username) {
            return Ok(false);
        }
        usernames.push(username.to_string());
        self.file.set(USERNAMES_KEY, usernames)?;
        Ok(true)
    }

    /// Remove `username`; returns whether it was present
    ///
    /// # Errors
    ///
    /// Any error from [`ConfigStore::set`](crate::ConfigStore::set).
    pub fn remove_username(&mut self, username: &str) -> Result<bool> {
        let mut usernames = self.usernames();
        let before = usernames.len();
        usernames.retain(|known| known != username);
        if usernames.len() == before {
            return Ok(false);
        }
        self.file.set(USERNAMES_KEY, usernames)?;
        Ok(true)
    }

    /// Persist pending changes
    ///
    /// # Errors
    ///
    /// Any error from [`ConfigFile::write_if_changed`].
    pub fn write(&mut self) -> Result<bool> {
        self.file.write_if_changed()
    }

    pub fn file(&self) -> &ConfigFile {
        &self.file
    }
}
