//! HTTP collaborator
//!
//! Freshness checks and downloads of the release archive, plus the GET that
//! kicks off ownCloud's web installer.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Largest archive accepted (ownCloud releases are well under this)
const MAX_DOWNLOAD_SIZE: u64 = 512 * 1024 * 1024;

const USER_AGENT: &str = concat!("cumulus/", env!("CARGO_PKG_VERSION"));

/// Result of a conditional HEAD request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The remote resource is newer than the local copy (or there is none)
    Modified,
    /// The server answered 304 Not Modified
    NotModified,
}

pub trait HttpClient {
    /// HEAD `url`, sending `If-Modified-Since` when a local copy exists
    fn head(&self, url: &str, if_modified_since: Option<SystemTime>) -> Result<Freshness>;

    /// Download `url` to `dest` via a temp file and rename; returns the size
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;

    /// GET `url`, returning the status code
    fn get(&self, url: &str) -> Result<u16>;
}

/// Format a timestamp as an HTTP date (RFC 7231 IMF-fixdate)
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Client backed by ureq
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn head(&self, url: &str, if_modified_since: Option<SystemTime>) -> Result<Freshness> {
        let mut request = self.agent.head(url).header("User-Agent", USER_AGENT);
        if let Some(time) = if_modified_since {
            request = request.header("If-Modified-Since", &http_date(time));
        }

        match request.call() {
            Ok(response) if response.status().as_u16() == 304 => Ok(Freshness::NotModified),
            Ok(_) => Ok(Freshness::Modified),
            Err(ureq::Error::StatusCode(304)) => Ok(Freshness::NotModified),
            Err(e) => Err(e).with_context(|| format!("HEAD {url} failed")),
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let dir = dest.parent().context("Download destination has no parent")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .with_context(|| format!("Failed to download {url}"))?;

        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .context("Download destination has no file name")?;
        let tmp_path = dir.join(format!(".{file_name}.part"));

        let result = (|| -> Result<u64> {
            let mut reader = response
                .body_mut()
                .with_config()
                .limit(MAX_DOWNLOAD_SIZE)
                .reader();
            let mut file = fs::File::create(&tmp_path)?;
            let size = io::copy(&mut reader, &mut file).context("Failed to read response body")?;
            file.sync_all()?;
            fs::rename(&tmp_path, dest)?;
            Ok(size)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        let size = result.with_context(|| format!("Failed to save {}", dest.display()))?;
        log::info!("Downloaded {url} ({size} bytes)");
        Ok(size)
    }

    fn get(&self, url: &str) -> Result<u16> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .with_context(|| format!("GET {url} failed"))?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_http_date() {
        let time = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
    }
}
