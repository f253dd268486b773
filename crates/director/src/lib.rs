//! Mod Director Library
//!
//! Turns a directory of declarative remote mod descriptors into a verified,
//! installed file set. Descriptors are resolved concurrently, split into
//! excluded, fresh and reinstall buckets, filtered through optional
//! discretionary choices and finally fetched and verified.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mod_director::{
//!     ConsoleProgressReporter, DirectorConfig, IntoProgressCallback, ModpackDirector,
//!     Side, StandalonePlatform,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> mod_director::Result<()> {
//! let platform = StandalonePlatform::new("/srv/pack").with_side(Side::Server);
//! let director = ModpackDirector::new(Arc::new(platform), DirectorConfig::default())?
//!     .with_progress(ConsoleProgressReporter::new(false).into_callback());
//!
//! let outcome = director.run().await;
//! if outcome.success {
//!     for installed in &outcome.installed {
//!         println!("{} (inject: {})", installed.path.display(), installed.inject);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod blocklist;
pub mod config;
pub mod configuration;
pub mod descriptor;
pub mod director;
pub mod error;
pub mod http;
pub mod manage;
pub mod platform;
pub mod pool;
pub mod progress;
pub mod sink;

pub use blocklist::{BlocklistEntry, RepostBlocklist};
pub use config::{DirectorConfig, DirectorConfigBuilder};
pub use configuration::{ConfigurationLoader, LoadedConfiguration, ModifyInstruction, ModpackConfiguration};
pub use descriptor::{
    CurseMod, HashOutcome, InstallationPolicy, ModrinthMod, RemoteContext, RemoteDescriptor, RemoteMetadata,
    RemoteSource, ResolvedInfo, UrlMod, check_hashes, side_matches,
};
pub use director::{DirectorOutcome, ModpackDirector};
pub use error::{DirectorError, FileOperation, Result};
pub use http::{WebClient, WebResponse};
pub use manage::{
    InstallSelector, InstallableMod, InstalledLedger, InstalledMod, KeepDefaults, PresetSelection,
    SelectableOption, SelectionHandler,
};
pub use platform::{Platform, Side, StandalonePlatform};
pub use pool::TaskPool;
pub use progress::{
    ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressEvent,
    ProgressReporter, TaskProgress,
};
pub use sink::{ErrorRecord, ErrorSink, Severity};
