//! Repost blocklist: domains known to mirror mods without permission

use serde::Deserialize;
use tracing::{debug, error, info};
use url::Url;

use crate::error::{DirectorError, Result};
use crate::http::{WebClient, parse_url};

/// One flagged domain
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlocklistEntry {
    pub domain: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct RepostBlocklist {
    entries: Vec<BlocklistEntry>,
}

impl RepostBlocklist {
    pub fn new(entries: Vec<BlocklistEntry>) -> Self {
        Self { entries }
    }

    /// Fetch the list once; a failure leaves the list empty
    pub async fn load(client: &WebClient, source: Option<&str>) -> Self {
        let Some(source) = source else {
            debug!("Repost blocklist disabled");
            return Self::default();
        };

        match Self::fetch(client, source).await {
            Ok(entries) => {
                info!("Loaded {} repost blocklist entries", entries.len());
                Self::new(entries)
            }
            Err(e) => {
                error!("Failed to retrieve repost blocklist from {}: {}", source, e);
                Self::default()
            }
        }
    }

    async fn fetch(client: &WebClient, source: &str) -> Result<Vec<BlocklistEntry>> {
        let url = parse_url(source)?;
        client.get_json(&url).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Refuse any URL whose string form contains a flagged domain
    pub fn check(&self, url: &Url) -> Result<()> {
        debug!("Checking {} against the repost blocklist", url);
        let external = url.as_str();

        match self.entries.iter().find(|e| !e.domain.is_empty() && external.contains(&e.domain)) {
            Some(entry) => {
                error!("STOP! Download URL {} is flagged in the repost blocklist, ABORTING!", external);
                error!("Domain {} is flagged", entry.domain);
                error!("Reason: {}", entry.reason);
                if !entry.notes.is_empty() {
                    error!("Notes: {}", entry.notes);
                }
                Err(DirectorError::Blocklisted {
                    url: external.to_string(),
                    domain: entry.domain.clone(),
                    reason: entry.reason.clone(),
                })
            }
            None => Ok(()),
        }
    }
}
