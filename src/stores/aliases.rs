//! Short names for usernames and other values: `alias.json`
//!
//! The file groups aliases by kind, e.g.
//! `{"orgs": {"prod": "admin@example.com"}}`.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::file::{ConfigFile, ConfigFileOptions, ConfigLocation};
use crate::path::{Path, Segment};

pub const ALIAS_FILE_NAME: &str = "alias.json";

/// Top-level group an alias belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AliasGroup {
    /// Org usernames
    #[default]
    Orgs,
    Custom(String),
}

impl AliasGroup {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Orgs => "orgs",
            Self::Custom(name) => name,
        }
    }
}

/// Alias table for one group, backed by `alias.json`
pub struct Aliases {
    file: ConfigFile,
    group: AliasGroup,
}

impl Aliases {
    /// Open the `orgs` group
    ///
    /// # Errors
    ///
    /// Any error from [`ConfigFile::open`].
    pub fn open(location: ConfigLocation) -> Result<Self> {
        Self::open_group(location, AliasGroup::Orgs)
    }

    /// Open a specific group
    ///
    /// # Errors
    ///
    /// Any error from [`ConfigFile::open`].
    pub fn open_group(location: ConfigLocation, group: AliasGroup) -> Result<Self> {
        let options = ConfigFileOptions::builder(ALIAS_FILE_NAME)
            .location(location)
            .build();
        Ok(Self {
            file: ConfigFile::open(options, None)?,
            group,
        })
    }

    pub fn group(&self) -> &AliasGroup {
        &self.group
    }

    fn alias_path(&self, alias: &str) -> Result<Path> {
        Path::from_segments(vec![
            Segment::Key(self.group.as_str().to_string()),
            Segment::Key(alias.to_string()),
        ])
    }

    fn entries(&self) -> Option<&Map<String, Value>> {
        self.file
            .get(Path::from_keys([self.group.as_str()]).ok()?)
            .and_then(Value::as_object)
    }

    /// Point `alias` at `value`, replacing any previous target
    ///
    /// # Errors
    ///
    /// Any error from [`ConfigStore::update`](crate::ConfigStore::update).
    pub fn set(&mut self, alias: &str, value: &str) -> Result<()> {
        let mut entry = Map::new();
        entry.insert(alias.to_string(), Value::String(value.to_string()));
        self.file
            .update(Path::from_keys([self.group.as_str()])?, entry)
    }

    /// Remove `alias`, returning whether it existed
    ///
    /// # Errors
    ///
    /// Any error from [`ConfigStore::unset`](crate::ConfigStore::unset).
    pub fn unset(&mut self, alias: &str) -> Result<bool> {
        let path = self.alias_path(alias)?;
        self.file.unset(path)
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries()?.get(alias).and_then(Value::as_str)
    }

    /// The aliased value, or `alias_or_value` itself when no alias matches
    pub fn resolve<'a>(&'a self, alias_or_value: &'a str) -> &'a str {
        self.get(alias_or_value).unwrap_or(alias_or_value)
    }

    /// Every alias pointing at `value`, in insertion order
    pub fn aliases_for(&self, value: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|(_, target)| target == value)
            .map(|(alias, _)| alias)
            .collect()
    }

    /// All `(alias, value)` pairs of the group, in insertion order
    pub fn all(&self) -> Vec<(String, String)> {
        self.entries()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(alias, target)| {
                        target.as_str().map(|t| (alias.clone(), t.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
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
