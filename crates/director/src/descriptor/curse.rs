use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::{RemoteContext, ResolvedInfo};
use crate::error::{DirectorError, Result};
use crate::http::parse_url;
use crate::progress::TaskProgress;

/// Fixed file of an addon on the Curse catalog
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseMod {
    pub addon_id: u64,
    pub file_id: u64,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    data: FileInformation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInformation {
    display_name: String,
    file_name: String,
    #[serde(default)]
    download_url: Option<String>,
}

impl CurseMod {
    pub const REMOTE_TYPE: &'static str = "Curse";

    pub fn offline_name(&self) -> String {
        format!("{}:{}", self.addon_id, self.file_id)
    }

    pub async fn query_information(&self, context: &RemoteContext) -> Result<ResolvedInfo> {
        let api_url = parse_url(&format!(
            "{}/mods/{}/files/{}",
            context.curse_api_url(),
            self.addon_id,
            self.file_id
        ))?;

        let envelope: FileEnvelope = context.client().get_json(&api_url).await?;
        let file = envelope.data;
        debug!("Curse file {} resolved to {}", self.offline_name(), file.file_name);

        let download_url = file.download_url.as_deref().map(parse_url).transpose()?;
        let info = match &self.file_name {
            Some(name) => ResolvedInfo::new(name.clone(), name.clone()),
            None => ResolvedInfo::new(file.display_name, file.file_name),
        };

        Ok(info.with_download_url(download_url))
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
            reason: format!("file {} has no download URL", self.offline_name()),
        })?;

        progress.set_steps(1);
        context.client().get(url).await?.copy_to_file(target, progress).await?;
        progress.step();
        Ok(())
    }
}
