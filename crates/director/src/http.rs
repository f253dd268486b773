//! HTTP transport used by every descriptor backend

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::config::DirectorConfig;
use crate::error::{DirectorError, FileOperation, Result};
use crate::progress::TaskProgress;

/// Thin wrapper over a shared reqwest client
#[derive(Debug, Clone)]
pub struct WebClient {
    client: Client,
}

impl WebClient {
    pub fn new(config: &DirectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DirectorError::http("<client>", e))?;

        Ok(Self { client })
    }

    /// Issue a GET and fail on any non-success status
    pub async fn get(&self, url: &Url) -> Result<WebResponse> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DirectorError::http(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectorError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(WebResponse {
            url: url.to_string(),
            response,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let bytes = self.get(url).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DirectorError::json(format!("from {}", url), e))
    }

    pub async fn get_text(&self, url: &Url) -> Result<String> {
        let bytes = self.get(url).await?.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// An open response body; dropping it closes the connection
#[derive(Debug)]
pub struct WebResponse {
    url: String,
    response: reqwest::Response,
}

impl WebResponse {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn declared_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Read the whole body without progress reporting
    pub async fn bytes(self) -> Result<Vec<u8>> {
        let url = self.url;
        self.response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| DirectorError::http(url, e))
    }

    /// Read the whole body into memory, reporting byte progress
    pub async fn read_bytes(self, progress: &TaskProgress) -> Result<Vec<u8>> {
        let total = self.declared_length();
        let mut data = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        let mut stream = self.response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DirectorError::http(self.url.as_str(), e))?;
            data.extend_from_slice(&chunk);
            progress.bytes(data.len() as u64, total);
        }

        Ok(data)
    }

    /// Stream the body to `dest`, going through a `.part` sibling first
    pub async fn copy_to_file(self, dest: &Path, progress: &TaskProgress) -> Result<u64> {
        let part = part_path(dest);
        match self.write_part(&part, progress).await {
            Ok(size) => {
                fs::rename(&part, dest)
                    .await
                    .map_err(|e| DirectorError::io(dest, FileOperation::Move, e))?;
                debug!("Download completed: {} bytes to {}", size, dest.display());
                Ok(size)
            }
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn write_part(self, part: &Path, progress: &TaskProgress) -> Result<u64> {
        let total = self.declared_length();
        let mut file = fs::File::create(part)
            .await
            .map_err(|e| DirectorError::io(part, FileOperation::Create, e))?;

        let mut stream = self.response.bytes_stream();
        let mut downloaded = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DirectorError::http(self.url.as_str(), e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DirectorError::io(part, FileOperation::Write, e))?;
            downloaded += chunk.len() as u64;
            progress.bytes(downloaded, total);
        }

        file.flush()
            .await
            .map_err(|e| DirectorError::io(part, FileOperation::Write, e))?;
        file.sync_all()
            .await
            .map_err(|e| DirectorError::io(part, FileOperation::Write, e))?;

        Ok(downloaded)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| DirectorError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}
