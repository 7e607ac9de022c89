//! Where a config file lives and how it is written

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::JsonStorage;

/// Default name of the per-user and per-project state folder
pub const DEFAULT_STATE_FOLDER: &str = ".crmkit";

/// Directory holding user-wide state: `<home>/.crmkit`
///
/// # Errors
///
/// Returns `Error::Config` if the home directory cannot be determined.
pub fn global_dir() -> Result<PathBuf> {
    home_dir().map(|home| home.join(DEFAULT_STATE_FOLDER))
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Expand a leading `~` to the home directory
fn expand_tilde(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path,
        },
        Err(_) => path,
    }
}

/// Base directory for a config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigLocation {
    /// The state folder in the user's home directory
    #[default]
    Global,
    /// The state folder inside a project root
    Local(PathBuf),
    /// A directory used as-is, without a state folder
    Explicit(PathBuf),
}

impl ConfigLocation {
    /// Shorthand for [`ConfigLocation::Local`], with `~` expansion
    pub fn local(project_root: impl Into<PathBuf>) -> Self {
        Self::Local(expand_tilde(project_root.into()))
    }

    /// Shorthand for [`ConfigLocation::Explicit`], with `~` expansion
    pub fn explicit(dir: impl Into<PathBuf>) -> Self {
        Self::Explicit(expand_tilde(dir.into()))
    }

    /// Resolve to a concrete directory using `state_folder`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for [`ConfigLocation::Global`] when the home
    /// directory cannot be determined.
    pub fn resolve(&self, state_folder: &str) -> Result<PathBuf> {
        match self {
            Self::Global => Ok(home_dir()?.join(state_folder)),
            Self::Local(root) => Ok(root.join(state_folder)),
            Self::Explicit(dir) => Ok(dir.clone()),
        }
    }
}

/// Options for opening a [`ConfigFile`](super::ConfigFile)
///
/// # Example
///
/// ```
/// use crmkit::{ConfigFileOptions, ConfigLocation};
///
/// let options = ConfigFileOptions::builder("alias.json")
///     .location(ConfigLocation::explicit("/tmp/crmkit-demo"))
///     .compact_json()
///     .build();
///
/// assert_eq!(
///     options.file_path().unwrap(),
///     std::path::Path::new("/tmp/crmkit-demo/alias.json")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ConfigFileOptions {
    /// File name, possibly with subdirectories (e.g. `orgs/00D.json`)
    pub filename: String,

    /// Base directory
    pub location: ConfigLocation,

    /// State folder name used by `Global` and `Local` locations
    pub state_folder: String,

    /// Serializer used for reads and writes
    pub storage: JsonStorage,

    /// Fail on read when the file does not exist instead of starting empty
    pub throw_on_not_found: bool,
}

impl ConfigFileOptions {
    pub fn builder(filename: impl Into<String>) -> ConfigFileOptionsBuilder {
        ConfigFileOptionsBuilder::new(filename)
    }

    /// Full path of the file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the location cannot be resolved or the
    /// filename is empty.
    pub fn file_path(&self) -> Result<PathBuf> {
        if self.filename.trim().is_empty() {
            return Err(Error::Config("Config filename must not be empty".into()));
        }
        Ok(self
            .location
            .resolve(&self.state_folder)?
            .join(Path::new(&self.filename)))
    }
}

/// Builder for [`ConfigFileOptions`]
#[derive(Debug, Clone)]
pub struct ConfigFileOptionsBuilder {
    filename: String,
    location: ConfigLocation,
    state_folder: String,
    pretty_json: bool,
    throw_on_not_found: bool,
}

impl ConfigFileOptionsBuilder {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            location: ConfigLocation::Global,
            state_folder: DEFAULT_STATE_FOLDER.into(),
            pretty_json: true,
            throw_on_not_found: false,
        }
    }

    /// Set the base directory (default: [`ConfigLocation::Global`])
    pub fn location(mut self, location: ConfigLocation) -> Self {
        self.location = location;
        self
    }

    /// Set the state folder name (default: `.crmkit`)
    pub fn state_folder(mut self, folder: impl Into<String>) -> Self {
        self.state_folder = folder.into();
        self
    }

    /// Use compact JSON (no pretty printing)
    pub fn compact_json(mut self) -> Self {
        self.pretty_json = false;
        self
    }

    /// Make a missing file an error on read
    pub fn throw_on_not_found(mut self, throw: bool) -> Self {
        self.throw_on_not_found = throw;
        self
    }

    pub fn build(self) -> ConfigFileOptions {
        ConfigFileOptions {
            filename: self.filename,
            location: self.location,
            state_folder: self.state_folder,
            storage: if self.pretty_json {
                JsonStorage::new()
            } else {
                JsonStorage::compact()
            },
            throw_on_not_found: self.throw_on_not_found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let options = ConfigFileOptions::builder("config.json").build();
        assert_eq!(options.location, ConfigLocation::Global);
        assert_eq!(options.state_folder, DEFAULT_STATE_FOLDER);
        assert!(!options.throw_on_not_found);
    }

    #[test]
    fn test_location_resolution() {
        let root = PathBuf::from("/work/project");
        assert_eq!(
            ConfigLocation::Local(root.clone()).resolve(".crmkit").unwrap(),
            root.join(".crmkit")
        );
        assert_eq!(
            ConfigLocation::Explicit(root.clone()).resolve(".crmkit").unwrap(),
            root
        );
    }

    #[test]
    fn test_custom_state_folder() {
        let options = ConfigFileOptions::builder("orgs/00D.json")
            .location(ConfigLocation::Local("/work/project".into()))
            .state_folder(".sfdx")
            .build();
        assert_eq!(
            options.file_path().unwrap(),
            PathBuf::from("/work/project/.sfdx/orgs/00D.json")
        );
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                ConfigLocation::explicit("~/state"),
                ConfigLocation::Explicit(home.join("state"))
            );
        }
        assert_eq!(
            ConfigLocation::explicit("/abs/state"),
            ConfigLocation::Explicit("/abs/state".into())
        );
    }

    #[test]
    fn test_empty_filename_rejected() {
        let options = ConfigFileOptions::builder("  ")
            .location(ConfigLocation::Explicit("/tmp".into()))
            .build();
        assert!(matches!(options.file_path(), Err(Error::Config(_))));
    }
}
