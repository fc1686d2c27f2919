//! File resource - managed content, mode and owner
//!
//! Content is either fixed text or half of a TLS certificate pair. The pair is
//! issued lazily, at most once per run, so the key and certificate written by
//! two different resources always match.

use anyhow::{Context, Result};
use declarative::{ApplyContext, Outcome, Probe, Resource};
use std::cell::OnceCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::platform::ProfileSlot;
use crate::system::{CertificateIssuer, CertificatePair, Ownership};

/// A self-signed certificate issued on first use
pub struct LazyCertificate {
    server_name: String,
    issuer: Rc<dyn CertificateIssuer>,
    pair: OnceCell<CertificatePair>,
}

impl LazyCertificate {
    pub fn new(server_name: &str, issuer: &Rc<dyn CertificateIssuer>) -> Rc<Self> {
        Rc::new(Self {
            server_name: server_name.to_string(),
            issuer: Rc::clone(issuer),
            pair: OnceCell::new(),
        })
    }

    fn get(&self) -> Result<&CertificatePair> {
        if let Some(pair) = self.pair.get() {
            return Ok(pair);
        }
        let pair = self.issuer.issue(&self.server_name)?;
        Ok(self.pair.get_or_init(|| pair))
    }

    /// The pair, if already issued this run
    fn peek(&self) -> Option<&CertificatePair> {
        self.pair.get()
    }
}

pub enum Content {
    Text(String),
    CertificateKey(Rc<LazyCertificate>),
    Certificate(Rc<LazyCertificate>),
}

impl Content {
    /// Content if it is known without side effects
    fn peek(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::CertificateKey(cert) => cert.peek().map(|p| p.key.as_str()),
            Self::Certificate(cert) => cert.peek().map(|p| p.cert.as_str()),
        }
    }

    fn render(&self) -> Result<&str> {
        match self {
            Self::Text(text) => Ok(text),
            Self::CertificateKey(cert) => Ok(&cert.get()?.key),
            Self::Certificate(cert) => Ok(&cert.get()?.cert),
        }
    }
}

/// Where a managed file lives
pub enum Location {
    Path(PathBuf),
    /// The TLS key in the platform's key directory
    SslKey(ProfileSlot),
    /// The TLS certificate in the platform's certificate directory
    SslCert(ProfileSlot),
}

impl Location {
    fn resolve(&self) -> PathBuf {
        match self {
            Self::Path(path) => path.clone(),
            Self::SslKey(slot) => slot.borrow().ssl_key_path(),
            Self::SslCert(slot) => slot.borrow().ssl_cert_path(),
        }
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&PathBuf> for Location {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

pub struct ManagedFile {
    pub name: String,
    location: Location,
    content: Content,
    pub mode: u32,
    pub owner: Option<(String, String)>,
    /// Leave an existing file alone whatever its content
    pub create_if_missing: bool,
    /// Skip entirely while this path exists
    pub unless_exists: Option<PathBuf>,
    ownership: Rc<dyn Ownership>,
}

impl ManagedFile {
    pub fn new(
        name: &str,
        location: impl Into<Location>,
        content: Content,
        mode: u32,
        ownership: &Rc<dyn Ownership>,
    ) -> Self {
        Self {
            name: name.to_string(),
            location: location.into(),
            content,
            mode,
            owner: None,
            create_if_missing: false,
            unless_exists: None,
            ownership: Rc::clone(ownership),
        }
    }

    pub fn owned_by(mut self, user: &str, group: &str) -> Self {
        self.owner = Some((user.to_string(), group.to_string()));
        self
    }

    pub fn create_if_missing(mut self) -> Self {
        self.create_if_missing = true;
        self
    }

    pub fn unless_exists(mut self, path: impl AsRef<Path>) -> Self {
        self.unless_exists = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn path(&self) -> PathBuf {
        self.location.resolve()
    }

    fn owner_matches(&self, path: &Path) -> bool {
        match &self.owner {
            Some(wanted) => self.ownership.owner(path).as_ref() == Some(wanted),
            None => true,
        }
    }

    fn up_to_date(&self, probe: &dyn Probe) -> bool {
        let Some(wanted) = self.content.peek() else {
            return false;
        };
        let path = self.path();
        probe.read_to_string(&path).as_deref() == Some(wanted)
            && probe.mode(&path).is_none_or(|mode| mode == self.mode)
            && self.owner_matches(&path)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.mode);
        }
        let mut file = options
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        // The open mode only applies to new files
        self.set_mode(path)
    }

    fn set_mode(&self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(self.mode))
                .with_context(|| format!("Failed to set mode on {}", path.display()))?;
        }
        #[cfg(not(unix))]
        let _ = path;
        Ok(())
    }
}

impl std::fmt::Debug for ManagedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedFile")
            .field("name", &self.name)
            .field("path", &self.path())
            .field("mode", &format_args!("{:o}", self.mode))
            .finish_non_exhaustive()
    }
}

impl Resource for ManagedFile {
    fn id(&self) -> String {
        format!("file:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Write {}", self.path().display())
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["create"]
    }

    fn is_satisfied(&self, probe: &dyn Probe) -> bool {
        if let Some(marker) = &self.unless_exists
            && probe.exists(marker)
        {
            return true;
        }
        if self.create_if_missing {
            return probe.exists(&self.path());
        }
        self.up_to_date(probe)
    }

    fn apply(&self, _action: &str, ctx: &mut ApplyContext) -> Result<Outcome> {
        let path = self.path();
        let content = self.content.render()?;
        if ctx.probe.read_to_string(&path).as_deref() == Some(content) {
            self.set_mode(&path)?;
        } else {
            self.write(&path, content)?;
            log::info!("Wrote {}", path.display());
        }

        if let Some((user, group)) = &self.owner
            && !self.owner_matches(&path)
        {
            self.ownership.chown(&path, user, group)?;
        }
        Ok(Outcome::Changed)
    }
}
