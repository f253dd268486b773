//! Pipeline driver: load, resolve, select, install, then the modpack checks

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::blocklist::RepostBlocklist;
use crate::config::DirectorConfig;
use crate::configuration::{ConfigurationLoader, ModpackConfiguration};
use crate::descriptor::RemoteContext;
use crate::error::Result;
use crate::http::WebClient;
use crate::manage::{
    InstallSelector, InstalledLedger, InstalledMod, Installer, KeepDefaults, ModpackVersions, PipelineContext,
    Resolver, SelectionHandler,
};
use crate::platform::Platform;
use crate::pool::TaskPool;
use crate::progress::{IntoProgressCallback, NullProgressReporter, ProgressCallback};
use crate::sink::{ErrorRecord, ErrorSink, Severity};

/// What a run produced; the caller decides what to do with the process
#[derive(Debug, Clone)]
pub struct DirectorOutcome {
    /// No SEVERE record, and launching is not refused
    pub success: bool,
    pub pack_name: String,
    pub installed: Vec<InstalledMod>,
    pub errors: Vec<ErrorRecord>,
    pub outdated: bool,
    pub refuse_launch: bool,
    pub restart_required: bool,
}

pub struct ModpackDirector {
    platform: Arc<dyn Platform>,
    config: DirectorConfig,
    client: WebClient,
    progress: ProgressCallback,
    selection: Arc<dyn SelectionHandler>,
}

impl ModpackDirector {
    pub fn new(platform: Arc<dyn Platform>, config: DirectorConfig) -> Result<Self> {
        let client = WebClient::new(&config)?;
        Ok(Self {
            platform,
            config,
            client,
            progress: NullProgressReporter.into_callback(),
            selection: Arc::new(KeepDefaults),
        })
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_selection<H: SelectionHandler + 'static>(mut self, handler: H) -> Self {
        self.selection = Arc::new(handler);
        self
    }

    /// Run every phase, stopping after the first one that leaves a SEVERE record.
    ///
    /// Each run starts with an empty error sink.
    pub async fn run(&self) -> DirectorOutcome {
        let sink = Arc::new(ErrorSink::new());
        info!("Running on platform {} as side {}", self.platform.name(), self.platform.side());
        let blocklist = RepostBlocklist::load(&self.client, self.config.blocklist_url.as_deref()).await;
        let ledger = Arc::new(InstalledLedger::new());

        let loaded = ConfigurationLoader::new(
            self.platform.configuration_directory(),
            self.platform.installation_root(),
            &self.client,
            &sink,
        )
        .load()
        .await;

        let modpack = match loaded.modpack {
            Some(modpack) => modpack,
            None => {
                warn!("This modpack does not contain a modpack.json, if you are the author, consider adding one!");
                ModpackConfiguration::default()
            }
        };

        let remote_version = match modpack.fetch_remote_version(&self.client).await {
            Ok(version) => version,
            Err(e) => {
                sink.record_and_log(
                    ErrorRecord::new(Severity::Severe, "Failed to fetch the remote modpack version").with_cause(e),
                );
                None
            }
        };
        if sink.has_fatal() {
            return failed(&sink, &modpack, &ledger);
        }

        let context = PipelineContext {
            platform: self.platform.clone(),
            remote: RemoteContext::new(self.client.clone(), blocklist, &self.config),
            sink: sink.clone(),
            progress: self.progress.clone(),
        };
        let pool = TaskPool::new(self.config.worker_threads, self.config.shutdown_grace);
        let versions = ModpackVersions {
            local: modpack.local_version.clone(),
            remote: remote_version.clone(),
        };

        let descriptors: Vec<_> = loaded.descriptors.into_iter().map(Arc::new).collect();
        info!("Checking {} mods with {} workers", descriptors.len(), pool.size());
        let buckets = Resolver::new(context.clone(), versions)
            .resolve_all(&pool, &descriptors)
            .await;
        info!(
            "{} mods excluded, {} fresh installs, {} reinstalls",
            buckets.excluded.len(),
            buckets.fresh.len(),
            buckets.reinstall.len()
        );

        let selector = InstallSelector::new(&buckets);
        if sink.has_fatal() {
            return failed(&sink, &modpack, &ledger);
        }
        if selector.has_options() {
            self.selection.select(&selector).await;
        }

        let selection = selector.compute();
        Installer::new(context, ledger.clone())
            .install_all(&pool, selection.to_install, selection.to_disable)
            .await;
        if sink.has_fatal() {
            return failed(&sink, &modpack, &ledger);
        }
        pool.shutdown().await;

        let outdated = modpack.is_outdated(remote_version.as_deref());
        let refuse_launch = outdated && modpack.refuse_launch;
        if outdated {
            error!("Modpack version mismatch!");
            if refuse_launch {
                error!("Please update before continuing!");
            }
        }

        let restart_required = modpack.requires_restart && selector.fresh_count() > 0;
        if restart_required {
            info!("Installation complete, a restart is required to complete initialization.");
        }

        DirectorOutcome {
            success: !refuse_launch && !sink.has_fatal(),
            pack_name: modpack.pack_name.clone(),
            installed: ledger.snapshot(),
            errors: sink.snapshot(),
            outdated,
            refuse_launch,
            restart_required,
        }
    }
}

fn failed(sink: &ErrorSink, modpack: &ModpackConfiguration, ledger: &InstalledLedger) -> DirectorOutcome {
    sink.log_summary();
    DirectorOutcome {
        success: false,
        pack_name: modpack.pack_name.clone(),
        installed: ledger.snapshot(),
        errors: sink.snapshot(),
        outdated: false,
        refuse_launch: false,
        restart_required: false,
    }
}
