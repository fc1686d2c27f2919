//! Release download chain
//!
//! A HEAD request with `If-Modified-Since` set to the cached archive's mtime
//! decides whether anything happens at all. A fresh archive notifies the
//! download, which in turn notifies extraction; both only run when notified.

use anyhow::{Context, Result};
use declarative::{ApplyContext, Outcome, Probe, Resource};
use std::path::PathBuf;
use std::rc::Rc;

use crate::system::{Extractor, Freshness, HttpClient};

/// Freshness check of the remote archive
pub struct HeadCheck {
    pub name: String,
    pub url: String,
    /// Local copy whose mtime is sent as `If-Modified-Since`
    pub local: PathBuf,
    http: Rc<dyn HttpClient>,
}

impl HeadCheck {
    pub fn new(name: &str, url: &str, local: PathBuf, http: &Rc<dyn HttpClient>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            local,
            http: Rc::clone(http),
        }
    }
}

impl std::fmt::Debug for HeadCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadCheck")
            .field("url", &self.url)
            .field("local", &self.local)
            .finish()
    }
}

impl Resource for HeadCheck {
    fn id(&self) -> String {
        format!("http_request:HEAD {}", self.name)
    }

    fn description(&self) -> String {
        format!("Check {} for a newer release", self.url)
    }

    fn resource_type(&self) -> &'static str {
        "http_request"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["head"]
    }

    // Freshness is only known by asking the server
    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        false
    }

    fn apply(&self, _action: &str, ctx: &mut ApplyContext) -> Result<Outcome> {
        let since = ctx.probe.modified(&self.local);
        match self.http.head(&self.url, since)? {
            Freshness::Modified => {
                log::info!("{} has changed upstream", self.url);
                Ok(Outcome::Changed)
            }
            Freshness::NotModified => Ok(Outcome::Unchanged),
        }
    }
}

/// Download of the archive into the cache
pub struct RemoteFile {
    pub name: String,
    pub url: String,
    pub path: PathBuf,
    http: Rc<dyn HttpClient>,
}

impl RemoteFile {
    pub fn new(name: &str, url: &str, path: PathBuf, http: &Rc<dyn HttpClient>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            path,
            http: Rc::clone(http),
        }
    }
}

impl std::fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile")
            .field("url", &self.url)
            .field("path", &self.path)
            .finish()
    }
}

impl Resource for RemoteFile {
    fn id(&self) -> String {
        format!("remote_file:download {}", self.name)
    }

    fn description(&self) -> String {
        format!("Download {} to {}", self.url, self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "remote_file"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["create"]
    }

    // Only runs when the freshness check says so
    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        false
    }

    fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        self.http.download(&self.url, &self.path)?;
        Ok(Outcome::Changed)
    }
}

/// Extraction of the cached archive into the web root
pub struct Extract {
    pub name: String,
    pub archive: PathBuf,
    pub dest: PathBuf,
    extractor: Rc<dyn Extractor>,
}

impl Extract {
    pub fn new(name: &str, archive: PathBuf, dest: PathBuf, extractor: &Rc<dyn Extractor>) -> Self {
        Self {
            name: name.to_string(),
            archive,
            dest,
            extractor: Rc::clone(extractor),
        }
    }
}

impl std::fmt::Debug for Extract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extract")
            .field("archive", &self.archive)
            .field("dest", &self.dest)
            .finish()
    }
}

impl Resource for Extract {
    fn id(&self) -> String {
        format!("execute:extract {}", self.name)
    }

    fn description(&self) -> String {
        format!(
            "Extract {} into {}",
            self.archive.display(),
            self.dest.display()
        )
    }

    fn resource_type(&self) -> &'static str {
        "execute"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["run"]
    }

    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        false
    }

    fn apply(&self, _action: &str, ctx: &mut ApplyContext) -> Result<Outcome> {
        if !ctx.probe.exists(&self.archive) {
            anyhow::bail!("Archive {} is missing", self.archive.display());
        }
        self.extractor
            .extract(&self.archive, &self.dest)
            .with_context(|| format!("Failed to extract into {}", self.dest.display()))?;
        Ok(Outcome::Changed)
    }
}
