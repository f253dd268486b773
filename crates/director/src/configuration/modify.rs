use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{DirectorError, FileOperation, Result};
use crate::manage::paths::{disabled_path, ensure_within, normalize};

/// A file mutation applied while the configuration is loaded
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyInstruction {
    /// Folder relative to the installation root
    pub folder: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub new_folder: Option<String>,
    #[serde(default)]
    pub new_file_name: Option<String>,
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub delete: bool,
}

impl ModifyInstruction {
    /// Apply below `root`; anything no longer matching is left alone
    pub async fn apply(&self, root: &Path) -> Result<()> {
        let folder = ensure_within(&root.join(&self.folder), root)?;

        let Some(file_name) = self.file_name.as_deref() else {
            if self.delete && folder == normalize(root)? {
                return Err(DirectorError::Configuration {
                    path: folder,
                    message: "refusing to delete the installation root".to_string(),
                });
            }
            if self.delete && is_dir(&folder).await {
                info!("Deleting folder {}", folder.display());
                fs::remove_dir_all(&folder)
                    .await
                    .map_err(|e| DirectorError::io(&folder, FileOperation::Delete, e))?;
            }
            return Ok(());
        };

        let file = ensure_within(&folder.join(file_name), root)?;
        if !is_file(&file).await {
            debug!("{} does not exist, nothing to modify", file.display());
            return Ok(());
        }

        if self.disable {
            info!("Disabling file {}", file.display());
            let disabled = disabled_path(&file);
            return fs::rename(&file, &disabled)
                .await
                .map_err(|e| DirectorError::io(&file, FileOperation::Move, e));
        }

        if self.delete {
            info!("Deleting file {}", file.display());
            return fs::remove_file(&file)
                .await
                .map_err(|e| DirectorError::io(&file, FileOperation::Delete, e));
        }

        let Some(destination) = self.destination(root, file_name, &file)? else {
            return Ok(());
        };
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DirectorError::io(parent, FileOperation::CreateDir, e))?;
        }

        if fs::try_exists(&destination).await.unwrap_or(false) {
            let disabled = disabled_path(&destination);
            if fs::try_exists(&disabled).await.unwrap_or(false) {
                fs::remove_file(&disabled)
                    .await
                    .map_err(|e| DirectorError::io(&disabled, FileOperation::Delete, e))?;
            }
            fs::rename(&destination, &disabled)
                .await
                .map_err(|e| DirectorError::io(&destination, FileOperation::Move, e))?;
        }

        info!("Moving file {} to {}", file.display(), destination.display());
        fs::rename(&file, &destination)
            .await
            .map_err(|e| DirectorError::io(&file, FileOperation::Move, e))
    }

    /// New location from `newFolder` and/or `newFileName`
    fn destination(&self, root: &Path, file_name: &str, file: &Path) -> Result<Option<PathBuf>> {
        let moved = self.new_folder.as_deref().map(|folder| root.join(folder).join(file_name));
        let renamed = match (&self.new_file_name, moved) {
            (Some(new_name), Some(moved)) => Some(moved.with_file_name(new_name)),
            (Some(new_name), None) => Some(file.with_file_name(new_name)),
            (None, moved) => moved,
        };

        renamed.map(|path| ensure_within(&path, root)).transpose()
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}
