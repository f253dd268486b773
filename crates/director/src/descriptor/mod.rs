//! Remote mod descriptors and the backends that resolve and fetch them

mod curse;
mod metadata;
mod modrinth;
mod policy;
mod url;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

pub use self::curse::CurseMod;
pub use self::metadata::{HashAlgorithm, HashOutcome, RemoteMetadata, check_hashes, side_matches};
pub use self::modrinth::ModrinthMod;
pub use self::policy::InstallationPolicy;
pub use self::url::UrlMod;

use crate::blocklist::RepostBlocklist;
use crate::config::DirectorConfig;
use crate::error::Result;
use crate::http::WebClient;
use crate::progress::TaskProgress;

/// Name and file name of a descriptor, queried once per run
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInfo {
    pub display_name: String,
    pub file_name: String,
    /// Where catalog backends download from
    pub download_url: Option<::url::Url>,
}

impl ResolvedInfo {
    pub fn new<D: Into<String>, F: Into<String>>(display_name: D, file_name: F) -> Self {
        Self {
            display_name: display_name.into(),
            file_name: file_name.into(),
            download_url: None,
        }
    }

    pub fn with_download_url(mut self, url: Option<::url::Url>) -> Self {
        self.download_url = url;
        self
    }
}

/// Everything a backend needs to reach the network
#[derive(Debug, Clone)]
pub struct RemoteContext {
    client: WebClient,
    blocklist: Arc<RepostBlocklist>,
    curse_api_url: Arc<str>,
    modrinth_api_url: Arc<str>,
}

impl RemoteContext {
    pub fn new(client: WebClient, blocklist: RepostBlocklist, config: &DirectorConfig) -> Self {
        Self {
            client,
            blocklist: Arc::new(blocklist),
            curse_api_url: config.curse_api_url.as_str().into(),
            modrinth_api_url: config.modrinth_api_url.as_str().into(),
        }
    }

    /// Context with a fresh client and an empty blocklist
    pub fn standalone(config: &DirectorConfig) -> Result<Self> {
        Ok(Self::new(WebClient::new(config)?, RepostBlocklist::default(), config))
    }

    pub fn client(&self) -> &WebClient {
        &self.client
    }

    pub fn blocklist(&self) -> &RepostBlocklist {
        &self.blocklist
    }

    pub fn check_url(&self, url: &::url::Url) -> Result<()> {
        self.blocklist.check(url)
    }

    pub fn curse_api_url(&self) -> &str {
        &self.curse_api_url
    }

    pub fn modrinth_api_url(&self) -> &str {
        &self.modrinth_api_url
    }
}

/// Backend a descriptor is resolved and fetched through
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteSource {
    Curse(CurseMod),
    Modrinth(ModrinthMod),
    Url(UrlMod),
}

impl RemoteSource {
    pub fn remote_type(&self) -> String {
        match self {
            RemoteSource::Curse(_) => CurseMod::REMOTE_TYPE.to_string(),
            RemoteSource::Modrinth(_) => ModrinthMod::REMOTE_TYPE.to_string(),
            RemoteSource::Url(source) => source.remote_type(),
        }
    }

    pub fn offline_name(&self) -> String {
        match self {
            RemoteSource::Curse(source) => source.offline_name(),
            RemoteSource::Modrinth(source) => source.offline_name(),
            RemoteSource::Url(source) => source.offline_name(),
        }
    }
}

impl From<CurseMod> for RemoteSource {
    fn from(source: CurseMod) -> Self {
        RemoteSource::Curse(source)
    }
}

impl From<ModrinthMod> for RemoteSource {
    fn from(source: ModrinthMod) -> Self {
        RemoteSource::Modrinth(source)
    }
}

impl From<UrlMod> for RemoteSource {
    fn from(source: UrlMod) -> Self {
        RemoteSource::Url(source)
    }
}

/// One mod to acquire, immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDescriptor {
    pub source: RemoteSource,
    pub metadata: Option<RemoteMetadata>,
    pub policy: InstallationPolicy,
    pub options: HashMap<String, Value>,
    /// Sub-folder of the installation root; `.` is the root itself
    pub folder: Option<String>,
    pub inject: bool,
}

impl RemoteDescriptor {
    pub fn new<S: Into<RemoteSource>>(source: S) -> Self {
        Self {
            source: source.into(),
            metadata: None,
            policy: InstallationPolicy::default(),
            options: HashMap::new(),
            folder: None,
            inject: true,
        }
    }

    pub fn with_metadata(mut self, metadata: RemoteMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_policy(mut self, policy: InstallationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_option<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Redirect into a folder; an explicit folder turns injection off
    pub fn with_folder<S: Into<String>>(mut self, folder: S) -> Self {
        self.folder = Some(folder.into());
        self.inject = false;
        self
    }

    pub fn with_inject(mut self, inject: bool) -> Self {
        self.inject = inject;
        self
    }

    pub fn remote_type(&self) -> String {
        self.source.remote_type()
    }

    pub fn offline_name(&self) -> String {
        self.source.offline_name()
    }

    pub async fn query_information(&self, context: &RemoteContext) -> Result<ResolvedInfo> {
        match &self.source {
            RemoteSource::Curse(source) => source.query_information(context).await,
            RemoteSource::Modrinth(source) => source.query_information(context).await,
            RemoteSource::Url(source) => source.query_information(),
        }
    }

    /// Write the remote bytes to `target`
    pub async fn fetch(
        &self,
        context: &RemoteContext,
        info: &ResolvedInfo,
        target: &Path,
        progress: &TaskProgress,
    ) -> Result<()> {
        match &self.source {
            RemoteSource::Curse(source) => source.fetch(context, info, target, progress).await,
            RemoteSource::Modrinth(source) => source.fetch(context, info, target, progress).await,
            RemoteSource::Url(source) => {
                source
                    .fetch(
                        context,
                        self.policy.extract,
                        self.policy.delete_after_extract,
                        target,
                        progress,
                    )
                    .await
            }
        }
    }
}

/// JSON form of a descriptor: backend fields plus the shared ones
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorDocument<T> {
    #[serde(flatten)]
    pub source: T,
    #[serde(default)]
    pub metadata: Option<RemoteMetadata>,
    #[serde(default)]
    pub installation_policy: Option<InstallationPolicy>,
    #[serde(default)]
    pub options: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub inject: Option<bool>,
}

impl<T: Into<RemoteSource>> From<DescriptorDocument<T>> for RemoteDescriptor {
    fn from(document: DescriptorDocument<T>) -> Self {
        let inject = document.inject.unwrap_or(document.folder.is_none());
        Self {
            source: document.source.into(),
            metadata: document.metadata,
            policy: document.installation_policy.unwrap_or_default(),
            options: document.options.unwrap_or_default(),
            folder: document.folder,
            inject,
        }
    }
}

/// Backend selected by a configuration file suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Curse,
    Modrinth,
    Url,
}

impl SourceKind {
    pub fn parse(self, value: Value) -> serde_json::Result<RemoteDescriptor> {
        Ok(match self {
            SourceKind::Curse => serde_json::from_value::<DescriptorDocument<CurseMod>>(value)?.into(),
            SourceKind::Modrinth => serde_json::from_value::<DescriptorDocument<ModrinthMod>>(value)?.into(),
            SourceKind::Url => serde_json::from_value::<DescriptorDocument<UrlMod>>(value)?.into(),
        })
    }
}
