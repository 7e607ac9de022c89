//! File permission helpers for persisted credentials
//!
//! Auth files and key files hold ciphertext and key material, so they are
//! restricted to the owning user on Unix. Other platforms rely on the
//! per-user profile directory ACLs and the helpers are no-ops there.

use crate::error::{Error, Result};
use std::path::Path;

/// Restrict a file to owner read/write (0o600)
///
/// # Errors
///
/// Returns `Error::FileRead` if the metadata cannot be read and
/// `Error::FileWrite` if the permissions cannot be applied.
#[cfg(unix)]
pub fn set_secure_file_permissions(path: &Path) -> Result<()> {
    set_mode(path, 0o600)
}

/// Restrict a directory to owner access (0o700)
///
/// # Errors
///
/// Same as [`set_secure_file_permissions`].
#[cfg(unix)]
pub fn set_secure_dir_permissions(path: &Path) -> Result<()> {
    set_mode(path, 0o700)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .permissions();
    perms.set_mode(mode);

    fs::set_permissions(path, perms).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
pub fn set_secure_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub fn set_secure_dir_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Create a directory (and parents) and restrict it to the owner
///
/// Existing directories keep their permissions so that pointing a config
/// file at a shared project folder does not lock other users out of it.
///
/// # Errors
///
/// Returns `Error::DirectoryCreate` if the directory cannot be created.
pub fn ensure_secure_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source: e,
    })?;

    set_secure_dir_permissions(path)
}
