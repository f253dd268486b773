//! Loading descriptor files, modify instructions and the modpack configuration

mod modify;
mod modpack;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tracing::{error, info, warn};
use url::Url;

pub use self::modify::ModifyInstruction;
pub use self::modpack::{DEFAULT_PACK_NAME, ModpackConfiguration, ModpackIcon};

use crate::descriptor::{RemoteDescriptor, SourceKind};
use crate::error::{DirectorError, FileOperation};
use crate::http::WebClient;
use crate::sink::{ErrorRecord, ErrorSink, Severity};

pub const MODPACK_FILE: &str = "modpack.json";

/// Everything read from the configuration directory
#[derive(Debug, Default)]
pub struct LoadedConfiguration {
    /// `None` when there is no `modpack.json`
    pub modpack: Option<ModpackConfiguration>,
    /// Descriptors in load order
    pub descriptors: Vec<RemoteDescriptor>,
}

#[derive(Debug, Deserialize)]
struct RemoteConfig {
    url: Url,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BundleConfig {
    curse: Vec<Value>,
    modrinth: Vec<Value>,
    url: Vec<Value>,
    modify: Vec<Value>,
}

/// Kind of configuration file, decided by suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKind {
    Remote,
    Bundle,
    Modify,
    Single(SourceKind),
}

impl ConfigKind {
    fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".remote.json") {
            Some(ConfigKind::Remote)
        } else if name.ends_with(".bundle.json") {
            Some(ConfigKind::Bundle)
        } else if name.ends_with(".modify.json") {
            Some(ConfigKind::Modify)
        } else if name.ends_with(".curse.json") {
            Some(ConfigKind::Single(SourceKind::Curse))
        } else if name.ends_with(".modrinth.json") {
            Some(ConfigKind::Single(SourceKind::Modrinth))
        } else if name.ends_with(".url.json") {
            Some(ConfigKind::Single(SourceKind::Url))
        } else {
            None
        }
    }
}

/// Walks the configuration directory and turns it into descriptors
pub struct ConfigurationLoader<'a> {
    directory: PathBuf,
    installation_root: PathBuf,
    client: &'a WebClient,
    sink: &'a ErrorSink,
}

impl<'a> ConfigurationLoader<'a> {
    pub fn new<D: Into<PathBuf>, R: Into<PathBuf>>(
        directory: D,
        installation_root: R,
        client: &'a WebClient,
        sink: &'a ErrorSink,
    ) -> Self {
        Self {
            directory: directory.into(),
            installation_root: installation_root.into(),
            client,
            sink,
        }
    }

    /// Read `modpack.json` first, then every other `*.json` in sorted path order.
    ///
    /// Problems are recorded in the sink; a broken `modpack.json` stops loading.
    pub async fn load(&self) -> LoadedConfiguration {
        let mut loaded = LoadedConfiguration::default();

        let modpack_path = self.directory.join(MODPACK_FILE);
        if fs::try_exists(&modpack_path).await.unwrap_or(false) {
            match self.load_modpack(&modpack_path).await {
                Ok(modpack) => loaded.modpack = Some(modpack),
                Err(e) => {
                    self.sink.record_and_log(
                        ErrorRecord::new(Severity::Severe, "Failed to read modpack configuration").with_cause(e),
                    );
                    return loaded;
                }
            }
        }

        let files = match collect_json_files(&self.directory).await {
            Ok(files) => files,
            Err(e) => {
                self.sink.record_and_log(
                    ErrorRecord::new(Severity::Severe, "Failed to iterate configuration directory").with_cause(e),
                );
                return loaded;
            }
        };

        for file in files {
            info!("Loading config {}", file.display());
            match fs::read(&file).await {
                Ok(bytes) => {
                    let name = file.to_string_lossy().into_owned();
                    self.process(name, bytes, &mut loaded.descriptors).await;
                }
                Err(e) => self.open_failed(DirectorError::io(&file, FileOperation::Read, e)),
            }
        }

        info!("Loaded {} remote mod descriptors", loaded.descriptors.len());
        loaded
    }

    async fn load_modpack(&self, path: &Path) -> crate::error::Result<ModpackConfiguration> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| DirectorError::io(path, FileOperation::Read, e))?;
        serde_json::from_slice(&bytes).map_err(|e| DirectorError::json(path.display().to_string(), e))
    }

    /// Handle one document; remote documents are fetched and handled in turn
    async fn process(&self, name: String, bytes: Vec<u8>, descriptors: &mut Vec<RemoteDescriptor>) {
        let mut pending = vec![(name, bytes)];

        while let Some((name, bytes)) = pending.pop() {
            let Some(kind) = ConfigKind::from_name(&name) else {
                warn!("Ignoring unknown json file {}", name);
                continue;
            };

            match kind {
                ConfigKind::Remote => {
                    if let Some(fetched) = self.fetch_remote(&name, &bytes).await {
                        pending.push(fetched);
                    }
                }
                ConfigKind::Bundle => self.handle_bundle(&name, &bytes, descriptors).await,
                ConfigKind::Modify => match serde_json::from_slice::<ModifyInstruction>(&bytes) {
                    Ok(instruction) => self.apply_modify(&name, &instruction).await,
                    Err(e) => self.parse_failed(&name, e),
                },
                ConfigKind::Single(source) => {
                    let parsed = serde_json::from_slice::<Value>(&bytes).and_then(|value| source.parse(value));
                    match parsed {
                        Ok(descriptor) => descriptors.push(descriptor),
                        Err(e) => self.parse_failed(&name, e),
                    }
                }
            }
        }
    }

    /// Download the document a `.remote.json` points at, named after its last path segment
    async fn fetch_remote(&self, name: &str, bytes: &[u8]) -> Option<(String, Vec<u8>)> {
        let remote: RemoteConfig = match serde_json::from_slice(bytes) {
            Ok(remote) => remote,
            Err(e) => {
                self.parse_failed(name, e);
                return None;
            }
        };

        let fetched = match self.client.get(&remote.url).await {
            Ok(response) => response.bytes().await,
            Err(e) => Err(e),
        };

        match fetched {
            Ok(data) => {
                let remote_name = remote
                    .url
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .unwrap_or_default()
                    .to_string();
                info!("Loaded remote config {} from {}", remote_name, remote.url);
                Some((remote_name, data))
            }
            Err(e) => {
                self.open_failed(e);
                None
            }
        }
    }

    async fn handle_bundle(&self, name: &str, bytes: &[u8], descriptors: &mut Vec<RemoteDescriptor>) {
        let bundle: BundleConfig = match serde_json::from_slice(bytes) {
            Ok(bundle) => bundle,
            Err(e) => {
                self.parse_failed(name, e);
                return;
            }
        };

        let groups = [
            (SourceKind::Curse, bundle.curse),
            (SourceKind::Modrinth, bundle.modrinth),
            (SourceKind::Url, bundle.url),
        ];
        for (kind, entries) in groups {
            for entry in entries {
                match kind.parse(entry) {
                    Ok(descriptor) => descriptors.push(descriptor),
                    Err(e) => self.parse_failed(name, e),
                }
            }
        }

        for entry in bundle.modify {
            match serde_json::from_value::<ModifyInstruction>(entry) {
                Ok(instruction) => self.apply_modify(name, &instruction).await,
                Err(e) => self.parse_failed(name, e),
            }
        }
    }

    async fn apply_modify(&self, name: &str, instruction: &ModifyInstruction) {
        if let Err(e) = instruction.apply(&self.installation_root).await {
            self.sink.record_and_log(
                ErrorRecord::new(Severity::Severe, format!("Failed to apply modification from {}", name))
                    .with_cause(e),
            );
        }
    }

    fn parse_failed(&self, name: &str, e: serde_json::Error) {
        error!("Failed to parse {}", name);
        self.sink.record_and_log(
            ErrorRecord::new(Severity::Severe, "Failed to parse a configuration for reading")
                .with_cause(DirectorError::json(name.to_string(), e)),
        );
    }

    fn open_failed(&self, e: DirectorError) {
        self.sink.record_and_log(
            ErrorRecord::new(Severity::Severe, "Failed to open a configuration for reading").with_cause(e),
        );
    }
}

/// Every `*.json` below `directory` except `modpack.json`, sorted by path string
async fn collect_json_files(directory: &Path) -> crate::error::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![directory.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| DirectorError::io(&dir, FileOperation::List, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DirectorError::io(&dir, FileOperation::List, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| DirectorError::io(&path, FileOperation::Read, e))?;

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file()
                && path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != MODPACK_FILE)
            {
                files.push(path);
            }
        }
    }

    files.sort_by_cached_key(|path| path.to_string_lossy().into_owned());
    Ok(files)
}
