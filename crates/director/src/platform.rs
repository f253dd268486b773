//! Platform collaborator: logical side and path resolution for the host environment

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Logical side a mod runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Side {
    #[serde(rename = "CLIENT", alias = "client")]
    Client,
    #[serde(rename = "SERVER", alias = "server")]
    Server,
    /// Either side, or the side could not be determined
    #[serde(rename = "UNKNOWN", alias = "unknown", alias = "EITHER", alias = "either")]
    Unknown,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Client => write!(f, "CLIENT"),
            Side::Server => write!(f, "SERVER"),
            Side::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(Side::Client),
            "server" => Ok(Side::Server),
            "unknown" | "either" => Ok(Side::Unknown),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// Host integration seam: where things live and which side we are on
pub trait Platform: Send + Sync {
    fn name(&self) -> &str;

    fn side(&self) -> Side;

    fn configuration_directory(&self) -> PathBuf;

    fn installation_root(&self) -> PathBuf;

    /// File inside the default mod directory
    fn mod_file(&self, file_name: &str) -> PathBuf;

    /// File directly inside the installation root
    fn root_file(&self, file_name: &str) -> PathBuf;

    /// File inside a named sub-folder of the installation root
    fn custom_file(&self, file_name: &str, folder: &str) -> PathBuf;
}

/// Platform for running outside of any game launcher
#[derive(Debug, Clone)]
pub struct StandalonePlatform {
    root: PathBuf,
    config_dir: PathBuf,
    mods_dir: PathBuf,
    side: Side,
}

impl StandalonePlatform {
    /// Standard layout below `root`: `config/mod-director` and `mods`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        Self {
            config_dir: root.join("config").join("mod-director"),
            mods_dir: root.join("mods"),
            root,
            side: Side::Unknown,
        }
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn with_configuration_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_mods_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.mods_dir = dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Platform for StandalonePlatform {
    fn name(&self) -> &str {
        "Standalone"
    }

    fn side(&self) -> Side {
        self.side
    }

    fn configuration_directory(&self) -> PathBuf {
        self.config_dir.clone()
    }

    fn installation_root(&self) -> PathBuf {
        self.root.clone()
    }

    fn mod_file(&self, file_name: &str) -> PathBuf {
        self.mods_dir.join(file_name)
    }

    fn root_file(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    fn custom_file(&self, file_name: &str, folder: &str) -> PathBuf {
        self.root.join(folder).join(file_name)
    }
}
