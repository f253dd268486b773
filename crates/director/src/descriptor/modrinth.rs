use std::path::Path;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{RemoteContext, ResolvedInfo};
use crate::error::{DirectorError, Result};
use crate::http::parse_url;
use crate::progress::TaskProgress;

/// One file of a version on the Modrinth catalog
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModrinthMod {
    pub version_id: String,
    #[serde(default)]
    pub file_index: usize,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionInformation {
    #[serde(default)]
    files: Vec<VersionFile>,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    filename: String,
    url: Url,
}

impl ModrinthMod {
    pub const REMOTE_TYPE: &'static str = "Modrinth";

    pub fn offline_name(&self) -> String {
        self.version_id.clone()
    }

    pub async fn query_information(&self, context: &RemoteContext) -> Result<ResolvedInfo> {
        let api_url = parse_url(&format!("{}/version/{}", context.modrinth_api_url(), self.version_id))?;

        let version: VersionInformation = context.client().get_json(&api_url).await?;
        let file = version
            .files
            .into_iter()
            .nth(self.file_index)
            .ok_or_else(|| DirectorError::MissingFileIndex {
                version_id: self.version_id.clone(),
                index: self.file_index,
            })?;
        debug!("Modrinth version {} resolved to {}", self.version_id, file.filename);

        let info = match &self.file_name {
            Some(name) => ResolvedInfo::new(name.clone(), name.clone()),
            None => ResolvedInfo::new(file.filename.clone(), file.filename),
        };

        Ok(info.with_download_url(Some(file.url)))
    }

    pub async fn fetch(
        &self,
        context: &RemoteContext,
        info: &ResolvedInfo,
        target: &Path,
        progress: &TaskProgress,
    ) -> Result<()> {
        let url = info.download_url.as_ref().ok_or_else(|| DirectorError::QueryFailed {
            remote: Self::REMOTE_TYPE.to_string(),
            reason: format!("version {} has no download URL", self.version_id),
        })?;

        progress.set_steps(1);
        context.client().get(url).await?.copy_to_file(target, progress).await?;
        progress.step();
        Ok(())
    }
}
