//! Install phase: fetch, verify and record every selected mod

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::fs;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::paths::disabled_path;
use super::{InstallableMod, InstalledLedger, InstalledMod, PipelineContext, failure_severity};
use crate::descriptor::{HashOutcome, check_hashes};
use crate::error::{DirectorError, FileOperation};
use crate::pool::TaskPool;
use crate::progress::TaskProgress;
use crate::sink::{ErrorRecord, Severity};

type InstallTask = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Clone)]
pub struct Installer {
    context: PipelineContext,
    ledger: Arc<InstalledLedger>,
}

impl Installer {
    pub fn new(context: PipelineContext, ledger: Arc<InstalledLedger>) -> Self {
        Self { context, ledger }
    }

    pub fn ledger(&self) -> &InstalledLedger {
        &self.ledger
    }

    /// Install every mod concurrently, plus one task writing disabled markers
    pub async fn install_all(&self, pool: &TaskPool, mods: Vec<InstallableMod>, disable: Vec<InstallableMod>) {
        let mut tasks: Vec<InstallTask> = Vec::with_capacity(mods.len() + 1);

        for installable in mods {
            let installer = self.clone();
            let span = info_span!("install", file = %installable.info.file_name);
            tasks.push(Box::pin(
                async move { installer.install(&installable).await }.instrument(span),
            ));
        }

        let installer = self.clone();
        tasks.push(Box::pin(async move { installer.mark_disabled(&disable).await }));

        pool.run_all(tasks, &self.context.sink).await;
    }

    /// Install one mod; progress is always completed
    pub async fn install(&self, installable: &InstallableMod) {
        let progress = TaskProgress::start(
            self.context.progress.clone(),
            installable.info.file_name.clone(),
            "Installing",
        );
        self.handle(installable, &progress).await;
        progress.done();
    }

    async fn handle(&self, installable: &InstallableMod, progress: &TaskProgress) {
        let descriptor = &installable.descriptor;
        let target = &installable.target;
        let sink = &self.context.sink;
        debug!("Now handling {} from backend {}", descriptor.offline_name(), descriptor.remote_type());

        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                sink.record_and_log(
                    ErrorRecord::new(Severity::Severe, format!("Failed to create directory {}", parent.display()))
                        .with_cause(DirectorError::io(parent, FileOperation::CreateDir, e)),
                );
                return;
            }
        }

        if let Err(e) = descriptor
            .fetch(&self.context.remote, &installable.info, target, progress)
            .await
        {
            sink.record_and_log(
                ErrorRecord::new(
                    failure_severity(&descriptor.policy, &e),
                    format!("Failed to install mod {}", descriptor.offline_name()),
                )
                .with_cause(e),
            );
            return;
        }

        // A deleted archive leaves nothing to verify; the ledger points at what it expanded into
        let archive_deleted = descriptor.policy.extract && descriptor.policy.delete_after_extract;
        let verifiable = descriptor.metadata.as_ref().filter(|m| m.has_hashes() && !archive_deleted);
        if let Some(metadata) = verifiable {
            if check_hashes(target, metadata).await == HashOutcome::Unmatched {
                error!("Mod {} did not match hash after download, aborting!", descriptor.offline_name());
                sink.record(ErrorRecord::new(
                    Severity::Severe,
                    format!("Mod {} did not match hash after download", descriptor.offline_name()),
                ));
                return;
            }
        }

        if descriptor.policy.extract {
            info!("Extracted mod file {}", target.display());
        } else {
            info!("Installed mod file {}", target.display());
        }

        let path = match target.parent() {
            Some(directory) if archive_deleted => directory.to_path_buf(),
            _ => target.clone(),
        };
        self.ledger.add(InstalledMod {
            path,
            options: descriptor.options.clone(),
            inject: descriptor.inject,
        });
    }

    /// Leave an empty marker so declined mods are not offered again
    pub async fn mark_disabled(&self, mods: &[InstallableMod]) {
        for installable in mods {
            let marker = disabled_path(&installable.target);
            if let Err(e) = create_marker(&marker).await {
                warn!("Failed to create disabled file, the mod might be offered again: {}", e);
                self.context.sink.record(
                    ErrorRecord::new(Severity::Warning, "Failed to create disabled file").with_cause(e),
                );
            } else {
                debug!("Marked {} as disabled", installable.target.display());
            }
        }
    }
}

async fn create_marker(marker: &std::path::Path) -> crate::error::Result<()> {
    if let Some(parent) = marker.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DirectorError::io(parent, FileOperation::CreateDir, e))?;
    }
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(marker)
        .await
        .map_err(|e| DirectorError::io(marker, FileOperation::Create, e))?;
    Ok(())
}
