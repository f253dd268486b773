//! Sibling naming conventions and installation-root containment

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{DirectorError, FileOperation, Result};
use crate::platform::Platform;

/// Suffix of files this tool has switched off
pub const DISABLED_SUFFIX: &str = ".disabled-by-mod-director";

/// `<file>.disabled-by-mod-director`
pub fn disabled_path(file: &Path) -> PathBuf {
    with_name_suffix(file, DISABLED_SUFFIX)
}

/// `name-patched.ext`, written by the bansoukou patcher
pub fn patched_path(file: &Path) -> PathBuf {
    with_stem_suffix(file, "-patched")
}

/// `name.disabled.ext`, the unpatched file the bansoukou patcher set aside
pub fn patch_disabled_path(file: &Path) -> PathBuf {
    with_stem_suffix(file, ".disabled")
}

fn with_name_suffix(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    file.with_file_name(name)
}

fn with_stem_suffix(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.file_stem().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    if let Some(extension) = file.extension() {
        name.push(".");
        name.push(extension);
    }
    file.with_file_name(name)
}

/// Make `path` absolute and fold away `.` and `..` without touching the disk
pub fn normalize(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| DirectorError::io(path, FileOperation::Read, e))?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Reject anything that does not live below the installation root
pub fn ensure_within(path: &Path, root: &Path) -> Result<PathBuf> {
    let root = normalize(root)?;
    let path = normalize(path)?;
    if path.starts_with(&root) {
        Ok(path)
    } else {
        Err(DirectorError::OutsideInstallationRoot { path, root })
    }
}

/// Where a descriptor's file goes: default mod dir, root (`.`) or a named folder
pub fn install_target(platform: &dyn Platform, folder: Option<&str>, file_name: &str) -> Result<PathBuf> {
    let target = match folder {
        None => platform.mod_file(file_name),
        Some(folder) if folder == "." => platform.root_file(file_name),
        Some(folder) => platform.custom_file(file_name, folder),
    };
    ensure_within(&target, &platform.installation_root())
}
