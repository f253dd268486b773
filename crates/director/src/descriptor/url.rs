use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info};
use url::Url;

use super::{RemoteContext, ResolvedInfo};
use crate::error::{DirectorError, FileOperation, Result};
use crate::manage::paths::disabled_path;
use crate::progress::{MessageSender, TaskProgress};

/// Direct download, optionally reached by following links in HTML pages
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlMod {
    pub url: Url,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Marker strings, one per page, that sit right after the link to follow
    #[serde(default)]
    pub follows: Vec<String>,
}

impl UrlMod {
    pub fn remote_type(&self) -> String {
        self.url.host_str().unwrap_or_default().to_string()
    }

    pub fn offline_name(&self) -> String {
        let mut name = self.url.path().to_string();
        if let Some(query) = self.url.query() {
            name.push('?');
            name.push_str(query);
        }
        if name.is_empty() || name == "/" {
            "<no name>".to_string()
        } else {
            name
        }
    }

    /// No network involved: the name comes from the override or the URL
    pub fn query_information(&self) -> Result<ResolvedInfo> {
        if let Some(name) = &self.file_name {
            return Ok(ResolvedInfo::new(name.clone(), name.clone()));
        }

        let name = self
            .url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .ok_or_else(|| DirectorError::QueryFailed {
                remote: self.remote_type(),
                reason: format!("no file name in {}", self.url),
            })?;

        Ok(ResolvedInfo::new(name.to_string(), name.to_string()))
    }

    pub async fn fetch(
        &self,
        context: &RemoteContext,
        extract: bool,
        delete_after_extract: bool,
        target: &Path,
        progress: &TaskProgress,
    ) -> Result<()> {
        let data = self.follow_chain(context, progress).await?;

        fs::write(target, &data)
            .await
            .map_err(|e| DirectorError::io(target, FileOperation::Write, e))?;

        if extract {
            let destination = target.parent().map(Path::to_path_buf).unwrap_or_default();
            let archive = target.to_path_buf();
            let messages = progress.sender();
            tokio::task::spawn_blocking(move || extract_archive(&archive, data, &destination, &messages))
                .await
                .map_err(|e| DirectorError::TaskFailed { reason: e.to_string() })??;

            if delete_after_extract {
                fs::remove_file(target)
                    .await
                    .map_err(|e| DirectorError::io(target, FileOperation::Delete, e))?;
            }
        }

        Ok(())
    }

    /// Fetch the root URL, then one page per follow marker; returns the final payload
    async fn follow_chain(&self, context: &RemoteContext, progress: &TaskProgress) -> Result<Vec<u8>> {
        let total = self.follows.len();
        progress.set_steps(total + 1);

        let mut current = self.url.clone();
        let mut data = Vec::new();
        for step in 0..=total {
            if step > 0 {
                let follow = &self.follows[step - 1];
                current = find_follow_url(&data, follow, &current)?;
                debug!("Following '{}' to {}", follow, current);
            }

            if step == total {
                progress.message("Downloading final file");
            } else {
                progress.message(format!("Following redirect {} out of {}", step + 1, total));
            }

            context.check_url(&current)?;
            data = context.client().get(&current).await?.read_bytes(progress).await?;
            progress.step();
        }

        Ok(data)
    }
}

/// Locate `follow` in an HTML page and return the link of the nearest `href=` before it
pub(crate) fn find_follow_url(page: &[u8], follow: &str, base: &Url) -> Result<Url> {
    let html = String::from_utf8_lossy(page);
    let not_found = || DirectorError::FollowNotFound {
        follow: follow.to_string(),
        url: base.to_string(),
    };

    let marker = html.find(follow).ok_or_else(not_found)?;
    let href = html[..marker].rfind("href=").ok_or_else(not_found)? + "href=".len();

    let rest = &html[href..];
    let quote = rest.chars().next().ok_or_else(not_found)?;
    let body = &rest[quote.len_utf8()..];
    let end = body.find(quote).ok_or_else(not_found)?;
    let link = &body[..end];

    if link.is_empty() {
        return Err(DirectorError::EmptyFollowUrl {
            follow: follow.to_string(),
            url: base.to_string(),
        });
    }

    let invalid = |source| DirectorError::InvalidUrl {
        url: link.to_string(),
        source,
    };
    if link.starts_with("http://") || link.starts_with("https://") {
        return Url::parse(link).map_err(invalid);
    }

    // `//x` stays on the page's host rather than becoming protocol-relative
    let path = if link.starts_with('/') {
        link.to_string()
    } else {
        format!("/{}", link)
    };
    Url::parse(&format!("{}{}", base.origin().ascii_serialization(), path)).map_err(invalid)
}

/// Expand `data` into `destination`, disabling files that would be overwritten
fn extract_archive(
    archive_path: &Path,
    data: Vec<u8>,
    destination: &Path,
    messages: &MessageSender,
) -> Result<()> {
    let archive_error = |source| DirectorError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(archive_error)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_error)?;
        let relative: PathBuf = entry.enclosed_name().ok_or_else(|| DirectorError::InvalidArchiveEntry {
            name: entry.name().to_string(),
        })?;
        let out = destination.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out).map_err(|e| DirectorError::io(&out, FileOperation::CreateDir, e))?;
            continue;
        }

        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DirectorError::io(parent, FileOperation::CreateDir, e))?;
        }

        if out.exists() {
            let disabled = disabled_path(&out);
            if disabled.exists() {
                std::fs::remove_file(&disabled).map_err(|e| DirectorError::io(&disabled, FileOperation::Delete, e))?;
            }
            info!("Disabling {} before extracting over it", out.display());
            std::fs::rename(&out, &disabled).map_err(|e| DirectorError::io(&out, FileOperation::Move, e))?;
        }

        let shown = out.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        messages.message(format!("Unzipping {}", shown));

        let mut file = std::fs::File::create(&out).map_err(|e| DirectorError::io(&out, FileOperation::Create, e))?;
        std::io::copy(&mut entry, &mut file).map_err(|e| DirectorError::io(&out, FileOperation::Write, e))?;
    }

    Ok(())
}
