//! Project or user settings: `config.json`

use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::file::{ConfigFile, ConfigFileOptions, ConfigLocation};

pub const PROJECT_SETTINGS_FILE_NAME: &str = "config.json";

/// Plain settings file; derefs to its [`ConfigFile`]
pub struct ProjectSettings {
    file: ConfigFile,
}

impl ProjectSettings {
    /// Open `config.json` at `location`
    ///
    /// # Errors
    ///
    /// Any error from [`ConfigFile::open`].
    pub fn open(location: ConfigLocation) -> Result<Self> {
        let options = ConfigFileOptions::builder(PROJECT_SETTINGS_FILE_NAME)
            .location(location)
            .build();
        Ok(Self {
            file: ConfigFile::open(options, None)?,
        })
    }
}

impl Deref for ProjectSettings {
    type Target = ConfigFile;

    fn deref(&self) -> &Self::Target {
        &self.file
    }
}

impl DerefMut for ProjectSettings {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.file
    }
}
