use serde::Deserialize;
use url::Url;

use crate::error::Result;
use crate::http::WebClient;

pub const DEFAULT_PACK_NAME: &str = "Modpack Director";

/// Contents of `modpack.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModpackConfiguration {
    pub pack_name: String,
    #[serde(default)]
    pub icon: Option<ModpackIcon>,
    #[serde(default)]
    pub local_version: Option<String>,
    /// Plain-text document whose first line is the current version
    #[serde(default)]
    pub remote_version: Option<Url>,
    #[serde(default)]
    pub refuse_launch: bool,
    #[serde(default)]
    pub requires_restart: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModpackIcon {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ModpackConfiguration {
    fn default() -> Self {
        Self {
            pack_name: DEFAULT_PACK_NAME.to_string(),
            icon: None,
            local_version: None,
            remote_version: None,
            refuse_launch: false,
            requires_restart: false,
        }
    }
}

impl ModpackConfiguration {
    /// First line of the remote version document, if one is configured
    pub async fn fetch_remote_version(&self, client: &WebClient) -> Result<Option<String>> {
        let Some(url) = &self.remote_version else {
            return Ok(None);
        };

        let text = client.get_text(url).await?;
        Ok(Some(text.lines().next().unwrap_or_default().trim_end().to_string()))
    }

    /// Free-text check: the remote version string has to mention the local one
    pub fn is_outdated(&self, remote_version: Option<&str>) -> bool {
        match (remote_version, self.local_version.as_deref()) {
            (Some(remote), Some(local)) => !remote.contains(local),
            _ => false,
        }
    }
}
