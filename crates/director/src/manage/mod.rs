//! Resolution, selection and installation of remote descriptors

pub mod install;
pub mod paths;
pub mod resolve;
pub mod select;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

use crate::descriptor::{InstallationPolicy, RemoteContext, RemoteDescriptor, ResolvedInfo};
use crate::error::DirectorError;
use crate::platform::Platform;
use crate::progress::ProgressCallback;
use crate::sink::{ErrorSink, Severity};

pub use self::install::Installer;
pub use self::resolve::{ModpackVersions, Resolution, ResolutionBuckets, Resolver};
pub use self::select::{
    InstallSelector, KeepDefaults, PresetSelection, SelectableOption, Selection, SelectionHandler,
};

/// Collaborators shared by every task of a run
#[derive(Clone)]
pub struct PipelineContext {
    pub platform: Arc<dyn Platform>,
    pub remote: RemoteContext,
    pub sink: Arc<ErrorSink>,
    pub progress: ProgressCallback,
}

/// A descriptor with its resolved information and absolute target
#[derive(Debug, Clone)]
pub struct InstallableMod {
    /// Position of the descriptor in load order
    pub index: usize,
    pub descriptor: Arc<RemoteDescriptor>,
    pub info: ResolvedInfo,
    pub target: PathBuf,
}

impl InstallableMod {
    pub fn policy(&self) -> &InstallationPolicy {
        &self.descriptor.policy
    }
}

/// Ledger entry handed to whatever loads the files afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledMod {
    pub path: PathBuf,
    pub options: HashMap<String, Value>,
    pub inject: bool,
}

/// Installed files of one run, at most one entry per path
#[derive(Debug, Default)]
pub struct InstalledLedger {
    entries: Mutex<Vec<InstalledMod>>,
}

impl InstalledLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless the path is already recorded
    pub fn add(&self, installed: InstalledMod) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if entries.iter().any(|e| e.path == installed.path) {
            warn!("{} was already recorded as installed", installed.path.display());
            return false;
        }
        entries.push(installed);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<InstalledMod> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Policy decides, except that blocklist hits are always fatal
pub(crate) fn failure_severity(policy: &InstallationPolicy, error: &DirectorError) -> Severity {
    if error.is_blocklisted() {
        Severity::Severe
    } else {
        policy.failure_severity()
    }
}
