//! Pre-install phase: sort every descriptor into excluded, fresh or reinstall

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::fs;
use tracing::{Instrument, debug, info, info_span, warn};

use super::paths::{disabled_path, ensure_within, install_target, patch_disabled_path, patched_path};
use super::{InstallableMod, PipelineContext, failure_severity};
use crate::descriptor::{HashOutcome, RemoteDescriptor, check_hashes, side_matches};
use crate::error::{DirectorError, FileOperation};
use crate::pool::TaskPool;
use crate::progress::TaskProgress;
use crate::sink::{ErrorRecord, Severity};

/// Local and remote modpack version strings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModpackVersions {
    pub local: Option<String>,
    pub remote: Option<String>,
}

impl ModpackVersions {
    /// A required tag must equal the remote version if known, else the local one
    pub fn is_compliant(&self, required: Option<&str>) -> bool {
        let Some(required) = required else {
            return true;
        };

        match (&self.remote, &self.local) {
            (Some(remote), _) => remote == required,
            (None, Some(local)) => local == required,
            (None, None) => true,
        }
    }
}

/// Bucket a single descriptor landed in
#[derive(Debug, Clone)]
pub enum Resolution {
    Excluded(Arc<RemoteDescriptor>),
    Fresh(InstallableMod),
    Reinstall(InstallableMod),
}

/// Result of the whole phase, each bucket in load order
#[derive(Debug, Default)]
pub struct ResolutionBuckets {
    pub excluded: Vec<Arc<RemoteDescriptor>>,
    pub fresh: Vec<InstallableMod>,
    pub reinstall: Vec<InstallableMod>,
}

impl ResolutionBuckets {
    fn from_resolutions(mut resolutions: Vec<(usize, Resolution)>) -> Self {
        resolutions.sort_by_key(|(index, _)| *index);

        let mut buckets = Self::default();
        for (_, resolution) in resolutions {
            match resolution {
                Resolution::Excluded(descriptor) => buckets.excluded.push(descriptor),
                Resolution::Fresh(installable) => buckets.fresh.push(installable),
                Resolution::Reinstall(installable) => buckets.reinstall.push(installable),
            }
        }
        buckets
    }
}

#[derive(Clone)]
pub struct Resolver {
    context: PipelineContext,
    versions: Arc<ModpackVersions>,
}

impl Resolver {
    pub fn new(context: PipelineContext, versions: ModpackVersions) -> Self {
        Self {
            context,
            versions: Arc::new(versions),
        }
    }

    /// Classify every descriptor concurrently and wait for all of them
    pub async fn resolve_all(&self, pool: &TaskPool, descriptors: &[Arc<RemoteDescriptor>]) -> ResolutionBuckets {
        let results = Arc::new(Mutex::new(Vec::with_capacity(descriptors.len())));

        let tasks: Vec<_> = descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let resolver = self.clone();
                let descriptor = descriptor.clone();
                let results = results.clone();
                let span = info_span!("resolve", mod_name = %descriptor.offline_name());
                async move {
                    let resolution = resolver.resolve(index, descriptor).await;
                    results
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push((index, resolution));
                }
                .instrument(span)
            })
            .collect();

        pool.run_all(tasks, &self.context.sink).await;

        let resolutions = std::mem::take(&mut *results.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
        ResolutionBuckets::from_resolutions(resolutions)
    }

    /// Resolve one descriptor, reporting progress on its own task
    pub async fn resolve(&self, index: usize, descriptor: Arc<RemoteDescriptor>) -> Resolution {
        let progress = TaskProgress::start(
            self.context.progress.clone(),
            descriptor.offline_name(),
            "Checking installation status",
        );
        progress.indeterminate(true);
        progress.message("Checking installation requirements");

        let resolution = self.classify(index, descriptor, &progress).await;
        progress.done();
        resolution
    }

    async fn classify(&self, index: usize, descriptor: Arc<RemoteDescriptor>, progress: &TaskProgress) -> Resolution {
        let sink = &self.context.sink;
        let platform = &self.context.platform;

        if !side_matches(descriptor.metadata.as_ref(), platform.side()) {
            debug!("Skipping {} because it is not meant for side {}", descriptor.offline_name(), platform.side());
            return Resolution::Excluded(descriptor);
        }

        progress.message("Querying mod information");
        let info = match descriptor.query_information(&self.context.remote).await {
            Ok(info) => info,
            Err(e) => {
                sink.record_and_log(
                    ErrorRecord::new(
                        failure_severity(&descriptor.policy, &e),
                        format!(
                            "Failed to query information for mod {} from {}",
                            descriptor.offline_name(),
                            descriptor.remote_type()
                        ),
                    )
                    .with_cause(e),
                );
                return Resolution::Excluded(descriptor);
            }
        };
        progress.title(info.display_name.clone());

        let target = match install_target(platform.as_ref(), descriptor.folder.as_deref(), &info.file_name) {
            Ok(target) => target,
            Err(e) => {
                sink.record_and_log(
                    ErrorRecord::new(
                        Severity::Severe,
                        format!("Refusing to install {}", descriptor.offline_name()),
                    )
                    .with_cause(e),
                );
                return Resolution::Excluded(descriptor);
            }
        };

        if is_file(&disabled_path(&target)).await {
            debug!("{} is disabled, skipping", target.display());
            return Resolution::Excluded(descriptor);
        }

        if !self.versions.is_compliant(descriptor.policy.modpack_version.as_deref()) {
            debug!(
                "{} belongs to modpack version {:?}, skipping",
                descriptor.offline_name(),
                descriptor.policy.modpack_version
            );
            return Resolution::Excluded(descriptor);
        }

        let installable = InstallableMod {
            index,
            descriptor: descriptor.clone(),
            info,
            target,
        };
        let resolution = self.decide(installable).await;

        if let Resolution::Fresh(ref installable) | Resolution::Reinstall(ref installable) = resolution {
            self.supersede(installable).await;
        }
        resolution
    }

    /// Compare what is already on disk against the descriptor
    async fn decide(&self, installable: InstallableMod) -> Resolution {
        let target = &installable.target;
        let patched = patched_path(target);
        let patch_disabled = patch_disabled_path(target);
        let target_exists = is_file(target).await;

        let hashed = installable
            .descriptor
            .metadata
            .as_ref()
            .filter(|metadata| metadata.has_hashes());

        if let Some(metadata) = hashed {
            let patch_pair_exists = is_file(&patched).await && is_file(&patch_disabled).await;
            if target_exists || patch_pair_exists {
                let checked = if target_exists { target.as_path() } else { patch_disabled.as_path() };
                match check_hashes(checked, metadata).await {
                    HashOutcome::Unknown => {
                        info!("Skipping download of {} as hashes can't be determined but file exists", target.display());
                        return Resolution::Excluded(installable.descriptor);
                    }
                    HashOutcome::Matched => {
                        info!("Skipping download of {} as the hashes match", target.display());
                        return Resolution::Excluded(installable.descriptor);
                    }
                    HashOutcome::Unmatched => {
                        warn!("File {} exists, but hashes do not match, downloading again!", target.display());
                        remove_if_present(&patched).await;
                        remove_if_present(&patch_disabled).await;
                        return Resolution::Reinstall(installable);
                    }
                }
            }
        }

        if installable.policy().force_redownload() && target_exists {
            info!("Force downloading {} as download always is set", target.display());
            Resolution::Reinstall(installable)
        } else if target_exists {
            debug!("{} exists and no hashes are given, skipping download", target.display());
            Resolution::Excluded(installable.descriptor)
        } else {
            Resolution::Fresh(installable)
        }
    }

    /// Disable the file this descriptor replaces, if it is still around
    async fn supersede(&self, installable: &InstallableMod) {
        let Some(name) = installable.policy().supersede.as_deref() else {
            return;
        };

        let superseded = installable.target.with_file_name(name);
        let root = self.context.platform.installation_root();
        let superseded = match ensure_within(&superseded, &root) {
            Ok(path) => path,
            Err(e) => {
                self.context.sink.record_and_log(
                    ErrorRecord::new(Severity::Warning, format!("Not superseding {}", name)).with_cause(e),
                );
                return;
            }
        };

        if !is_file(&superseded).await {
            return;
        }

        info!("Superseding {} with {}", superseded.display(), installable.target.display());
        let disabled = disabled_path(&superseded);
        if let Err(e) = fs::rename(&superseded, &disabled).await {
            self.context.sink.record_and_log(
                ErrorRecord::new(Severity::Warning, format!("Failed to disable superseded file {}", name))
                    .with_cause(DirectorError::io(&superseded, FileOperation::Move, e)),
            );
        }
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn remove_if_present(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectorConfig;
    use crate::descriptor::{InstallationPolicy, RemoteContext, RemoteMetadata, UrlMod};
    use crate::platform::{Side, StandalonePlatform};
    use crate::progress::{IntoProgressCallback, NullProgressReporter};
    use crate::sink::ErrorSink;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn resolver(root: &Path, side: Side, versions: ModpackVersions) -> Resolver {
        let config = DirectorConfig::builder().without_blocklist().build();
        let context = PipelineContext {
            platform: Arc::new(StandalonePlatform::new(root).with_side(side)),
            remote: RemoteContext::standalone(&config).unwrap(),
            sink: Arc::new(ErrorSink::new()),
            progress: NullProgressReporter.into_callback(),
        };
        Resolver::new(context, versions)
    }

    fn url_descriptor(file: &str) -> RemoteDescriptor {
        let url: UrlMod = serde_json::from_value(serde_json::json!({
            "url": format!("http://127.0.0.1:9/{}", file)
        }))
        .unwrap();
        RemoteDescriptor::new(url)
    }

    fn hashed(descriptor: RemoteDescriptor, hex: &str) -> RemoteDescriptor {
        descriptor.with_metadata(RemoteMetadata {
            hashes: vec![("SHA-256".to_string(), hex.to_string())],
            side: None,
        })
    }

    fn mods_dir(dir: &TempDir) -> PathBuf {
        let mods = dir.path().join("mods");
        std::fs::create_dir_all(&mods).unwrap();
        mods
    }

    async fn classify(resolver: &Resolver, descriptor: RemoteDescriptor) -> Resolution {
        resolver.resolve(0, Arc::new(descriptor)).await
    }

    #[test]
    fn test_version_compliance() {
        let both = ModpackVersions {
            local: Some("1.0".to_string()),
            remote: Some("1.1".to_string()),
        };
        assert!(both.is_compliant(None));
        assert!(both.is_compliant(Some("1.1")));
        assert!(!both.is_compliant(Some("1.0")));

        let local = ModpackVersions {
            local: Some("1.0".to_string()),
            remote: None,
        };
        assert!(local.is_compliant(Some("1.0")));
        assert!(!local.is_compliant(Some("1.1")));

        assert!(ModpackVersions::default().is_compliant(Some("anything")));
    }

    #[tokio::test]
    async fn test_fresh_when_nothing_exists() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), Side::Client, ModpackVersions::default());

        match classify(&resolver, url_descriptor("a.jar")).await {
            Resolution::Fresh(installable) => {
                assert!(installable.target.ends_with("mods/a.jar"));
                assert_eq!(installable.info.file_name, "a.jar");
            }
            other => panic!("Expected fresh install, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_side_is_excluded() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), Side::Server, ModpackVersions::default());
        let descriptor = url_descriptor("client-only.jar").with_metadata(RemoteMetadata {
            hashes: Vec::new(),
            side: Some(Side::Client),
        });

        assert!(matches!(classify(&resolver, descriptor).await, Resolution::Excluded(_)));
    }

    #[tokio::test]
    async fn test_existing_file_without_hashes_is_excluded() {
        let dir = tempdir().unwrap();
        std::fs::write(mods_dir(&dir).join("a.jar"), "x").unwrap();
        let resolver = resolver(dir.path(), Side::Client, ModpackVersions::default());

        assert!(matches!(classify(&resolver, url_descriptor("a.jar")).await, Resolution::Excluded(_)));

        let forced = url_descriptor("a.jar").with_policy(InstallationPolicy {
            download_always: true,
            ..Default::default()
        });
        assert!(matches!(classify(&resolver, forced).await, Resolution::Reinstall(_)));
    }

    #[tokio::test]
    async fn test_hash_outcomes_drive_classification() {
        let dir = tempdir().unwrap();
        let mods = mods_dir(&dir);
        std::fs::write(mods.join("hello.jar"), "hello").unwrap();
        std::fs::write(mods.join("goodbye.jar"), "goodbye").unwrap();
        let resolver = resolver(dir.path(), Side::Client, ModpackVersions::default());

        let matched = hashed(url_descriptor("hello.jar"), HELLO_SHA256);
        assert!(matches!(classify(&resolver, matched).await, Resolution::Excluded(_)));

        let unmatched = hashed(url_descriptor("goodbye.jar"), HELLO_SHA256);
        assert!(matches!(classify(&resolver, unmatched).await, Resolution::Reinstall(_)));
    }

    #[tokio::test]
    async fn test_patched_pair_is_checked_and_cleared() {
        let dir = tempdir().unwrap();
        let mods = mods_dir(&dir);
        std::fs::write(mods.join("lib-patched.jar"), "patched").unwrap();
        std::fs::write(mods.join("lib.disabled.jar"), "goodbye").unwrap();
        let resolver = resolver(dir.path(), Side::Client, ModpackVersions::default());

        let descriptor = hashed(url_descriptor("lib.jar"), HELLO_SHA256);
        assert!(matches!(classify(&resolver, descriptor).await, Resolution::Reinstall(_)));
        assert!(!mods.join("lib-patched.jar").exists());
        assert!(!mods.join("lib.disabled.jar").exists());
    }

    #[tokio::test]
    async fn test_disabled_marker_and_version_exclude() {
        let dir = tempdir().unwrap();
        let mods = mods_dir(&dir);
        std::fs::write(mods.join("off.jar.disabled-by-mod-director"), "").unwrap();
        let versions = ModpackVersions {
            local: Some("2.0".to_string()),
            remote: None,
        };
        let resolver = resolver(dir.path(), Side::Client, versions);

        assert!(matches!(classify(&resolver, url_descriptor("off.jar")).await, Resolution::Excluded(_)));

        let old = url_descriptor("old.jar").with_policy(InstallationPolicy {
            modpack_version: Some("1.0".to_string()),
            ..Default::default()
        });
        assert!(matches!(classify(&resolver, old).await, Resolution::Excluded(_)));
        assert!(resolver.context.sink.is_empty());
    }

    #[tokio::test]
    async fn test_escaping_folder_is_severe() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), Side::Client, ModpackVersions::default());
        let descriptor = url_descriptor("evil.jar").with_folder("../../outside");

        assert!(matches!(classify(&resolver, descriptor).await, Resolution::Excluded(_)));
        assert!(resolver.context.sink.has_fatal());
    }

    #[tokio::test]
    async fn test_supersede_disables_sibling() {
        let dir = tempdir().unwrap();
        let mods = mods_dir(&dir);
        std::fs::write(mods.join("old-1.0.jar"), "old").unwrap();
        let resolver = resolver(dir.path(), Side::Client, ModpackVersions::default());

        let descriptor = url_descriptor("new-2.0.jar").with_policy(InstallationPolicy {
            supersede: Some("old-1.0.jar".to_string()),
            ..Default::default()
        });
        assert!(matches!(classify(&resolver, descriptor).await, Resolution::Fresh(_)));
        assert!(!mods.join("old-1.0.jar").exists());
        assert!(mods.join("old-1.0.jar.disabled-by-mod-director").exists());
    }

    #[tokio::test]
    async fn test_resolve_all_keeps_load_order() {
        let dir = tempdir().unwrap();
        std::fs::write(mods_dir(&dir).join("b.jar"), "b").unwrap();
        let resolver = resolver(dir.path(), Side::Client, ModpackVersions::default());
        let pool = TaskPool::new(4, std::time::Duration::from_secs(5));

        let descriptors: Vec<_> = ["a.jar", "b.jar", "c.jar", "d.jar"]
            .iter()
            .map(|name| Arc::new(url_descriptor(name)))
            .collect();
        let buckets = resolver.resolve_all(&pool, &descriptors).await;

        let fresh: Vec<_> = buckets.fresh.iter().map(|m| m.info.file_name.as_str()).collect();
        assert_eq!(fresh, ["a.jar", "c.jar", "d.jar"]);
        assert_eq!(buckets.excluded.len(), 1);
        assert!(buckets.reinstall.is_empty());
    }
}
