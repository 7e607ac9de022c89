//! Concrete stores for the files the CLI keeps on disk
//!
//! | Store | File | Masked keys |
//! |-------|------|-------------|
//! | [`AuthFile`] | `<username>.json` | tokens, passwords, client secret |
//! | [`Aliases`] | `alias.json` | none |
//! | [`OrgUsers`] | `orgs/<org_id>.json` | none |
//! | [`ProjectSettings`] | `config.json` | none |

mod aliases;
mod auth;
mod org_users;
mod settings;

pub use aliases::{ALIAS_FILE_NAME, AliasGroup, Aliases};
pub use auth::{AuthFile, AuthSchema};
pub use org_users::OrgUsers;
pub use settings::{PROJECT_SETTINGS_FILE_NAME, ProjectSettings};

use crate::error::{Error, Result};

/// Reject identifiers that would escape the state folder when used as a
/// file name
pub(crate) fn validate_file_stem(kind: &str, value: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.chars().any(char::is_control);
    if invalid {
        return Err(Error::Config(format!(
            "Invalid {kind} '{value}': cannot be used as a file name"
        )));
    }
    Ok(())
}
