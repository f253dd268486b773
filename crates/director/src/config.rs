//! Configuration types for the director pipeline

use std::time::Duration;

pub const DEFAULT_CURSE_API_URL: &str = "https://api.curse.tools/v1/cf";
pub const DEFAULT_MODRINTH_API_URL: &str = "https://api.modrinth.com/v2";
pub const DEFAULT_BLOCKLIST_URL: &str = "https://api.stopmodreposts.org/sites.json";

/// Configuration for a director run
#[derive(Debug, Clone)]
pub struct DirectorConfig {
    pub user_agent: String,
    /// Timeout applied to every single HTTP request
    pub timeout: Duration,
    /// Number of tasks allowed to run at the same time
    pub worker_threads: usize,
    /// How long to wait for in-flight tasks once the last phase is over
    pub shutdown_grace: Duration,
    pub curse_api_url: String,
    pub modrinth_api_url: String,
    /// Source of the repost blocklist; `None` disables the check
    pub blocklist_url: Option<String>,
}

impl DirectorConfig {
    /// Pool size derived from the available parallelism, kept between 4 and 8
    pub fn default_worker_threads() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .clamp(4, 8)
    }

    pub fn builder() -> DirectorConfigBuilder {
        DirectorConfigBuilder::new()
    }
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("mod-director/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(60),
            worker_threads: Self::default_worker_threads(),
            shutdown_grace: Duration::from_secs(24 * 60 * 60),
            curse_api_url: DEFAULT_CURSE_API_URL.to_string(),
            modrinth_api_url: DEFAULT_MODRINTH_API_URL.to_string(),
            blocklist_url: Some(DEFAULT_BLOCKLIST_URL.to_string()),
        }
    }
}

/// Fluent builder for [`DirectorConfig`]
#[derive(Debug, Clone, Default)]
pub struct DirectorConfigBuilder {
    config: DirectorConfig,
}

impl DirectorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Override the pool size; zero is bumped to one
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads.max(1);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    pub fn curse_api_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.curse_api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn modrinth_api_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.modrinth_api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn blocklist_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.blocklist_url = Some(url.into());
        self
    }

    pub fn without_blocklist(mut self) -> Self {
        self.config.blocklist_url = None;
        self
    }

    pub fn build(self) -> DirectorConfig {
        self.config
    }
}
