//! In-memory collaborators for tests
//!
//! Every fake appends to a shared call log so tests can assert on ordering
//! across collaborators.

use super::*;
use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type CallLog = Rc<RefCell<Vec<String>>>;

fn record(log: &CallLog, call: String) {
    log.borrow_mut().push(call);
}

#[derive(Default)]
pub struct FakePackages {
    pub installed: RefCell<BTreeSet<String>>,
    log: CallLog,
}

impl PackageManager for FakePackages {
    fn is_installed(&self, name: &str) -> bool {
        self.installed.borrow().contains(name)
    }

    fn install(&self, name: &str) -> Result<()> {
        record(&self.log, format!("install {name}"));
        self.installed.borrow_mut().insert(name.to_string());
        Ok(())
    }
}

/// Serves one release archive and simulates the web installer
pub struct FakeHttp {
    /// Last-Modified of the remote archive
    pub remote_modified: Cell<SystemTime>,
    pub unreachable: Cell<bool>,
    /// File the installer writes on the first GET, with its content
    pub installer_output: RefCell<Option<(PathBuf, String)>>,
    log: CallLog,
}

impl HttpClient for FakeHttp {
    fn head(&self, url: &str, if_modified_since: Option<SystemTime>) -> Result<Freshness> {
        record(&self.log, format!("head {url}"));
        if self.unreachable.get() {
            anyhow::bail!("connection refused: {url}");
        }
        match if_modified_since {
            Some(local) if local >= self.remote_modified.get() => Ok(Freshness::NotModified),
            _ => Ok(Freshness::Modified),
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        record(&self.log, format!("download {url}"));
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(dest, b"archive")?;
        Ok(7)
    }

    fn get(&self, url: &str) -> Result<u16> {
        record(&self.log, format!("get {url}"));
        if let Some((path, content)) = self.installer_output.borrow_mut().take() {
            fs::write(path, content)?;
        }
        Ok(200)
    }
}

pub struct FakeExtractor {
    log: CallLog,
}

impl Extractor for FakeExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        record(&self.log, format!("extract {}", archive.display()));
        let app = dest.join("owncloud");
        fs::create_dir_all(app.join("config"))?;
        fs::write(app.join("index.php"), "<?php")?;
        Ok(())
    }
}

pub struct FakeWeb {
    dir: PathBuf,
    pub enabled: RefCell<BTreeSet<String>>,
    log: CallLog,
}

impl WebServer for FakeWeb {
    fn site_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.conf"))
    }

    fn site_enabled(&self, name: &str) -> bool {
        self.enabled.borrow().contains(name)
    }

    fn enable_site(&self, name: &str) -> Result<()> {
        record(&self.log, format!("enable {name}"));
        self.enabled.borrow_mut().insert(name.to_string());
        Ok(())
    }

    fn disable_site(&self, name: &str) -> Result<()> {
        record(&self.log, format!("disable {name}"));
        self.enabled.borrow_mut().remove(name);
        Ok(())
    }

    fn restart(&self) -> Result<()> {
        record(&self.log, "restart web".to_string());
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        record(&self.log, "reload web".to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDatabase {
    pub databases: RefCell<BTreeSet<String>>,
    /// (database, user@host) -> password
    pub grants: RefCell<BTreeMap<(String, String), String>>,
    log: CallLog,
}

impl Database for FakeDatabase {
    fn database_exists(&self, name: &str) -> Result<bool> {
        Ok(self.databases.borrow().contains(name))
    }

    fn create_database(&self, name: &str) -> Result<()> {
        record(&self.log, format!("create database {name}"));
        self.databases.borrow_mut().insert(name.to_string());
        Ok(())
    }

    fn user_exists(&self, user: &str, host: &str) -> Result<bool> {
        let account = format!("{user}@{host}");
        Ok(self.grants.borrow().keys().any(|(_, a)| *a == account))
    }

    fn has_all_privileges(&self, database: &str, user: &str, host: &str) -> Result<bool> {
        let key = (database.to_string(), format!("{user}@{host}"));
        Ok(self.grants.borrow().contains_key(&key))
    }

    fn grant_all(&self, database: &str, user: &str, host: &str, password: &str) -> Result<()> {
        record(&self.log, format!("grant {database} {user}@{host}"));
        self.grants.borrow_mut().insert(
            (database.to_string(), format!("{user}@{host}")),
            password.to_string(),
        );
        Ok(())
    }
}

pub struct FakeCerts {
    log: CallLog,
}

impl CertificateIssuer for FakeCerts {
    fn issue(&self, server_name: &str) -> Result<CertificatePair> {
        record(&self.log, format!("issue {server_name}"));
        Ok(CertificatePair {
            key: format!("KEY {server_name}\n"),
            cert: format!("CERT {server_name}\n"),
        })
    }
}

#[derive(Default)]
pub struct FakeOwnership {
    pub owners: RefCell<BTreeMap<PathBuf, (String, String)>>,
    log: CallLog,
}

impl Ownership for FakeOwnership {
    fn owner(&self, path: &Path) -> Option<(String, String)> {
        if !path.exists() {
            return None;
        }
        Some(
            self.owners
                .borrow()
                .get(path)
                .cloned()
                .unwrap_or_else(|| ("root".to_string(), "root".to_string())),
        )
    }

    fn chown(&self, path: &Path, user: &str, group: &str) -> Result<()> {
        record(&self.log, format!("chown {user}:{group} {}", path.display()));
        self.owners
            .borrow_mut()
            .insert(path.to_path_buf(), (user.to_string(), group.to_string()));
        Ok(())
    }
}

/// A full set of fakes sharing one call log
pub struct FakeHost {
    pub log: CallLog,
    pub packages: Rc<FakePackages>,
    pub http: Rc<FakeHttp>,
    pub web: Rc<FakeWeb>,
    pub database: Rc<FakeDatabase>,
    pub ownership: Rc<FakeOwnership>,
    extractor: Rc<FakeExtractor>,
    certs: Rc<FakeCerts>,
}

impl FakeHost {
    /// Fakes whose web server keeps its sites under `sites_dir`
    pub fn new(sites_dir: &Path) -> Self {
        let log = CallLog::default();
        Self {
            packages: Rc::new(FakePackages {
                log: Rc::clone(&log),
                ..FakePackages::default()
            }),
            http: Rc::new(FakeHttp {
                remote_modified: Cell::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
                unreachable: Cell::new(false),
                installer_output: RefCell::new(None),
                log: Rc::clone(&log),
            }),
            web: Rc::new(FakeWeb {
                dir: sites_dir.to_path_buf(),
                enabled: RefCell::new(BTreeSet::from(["default".to_string()])),
                log: Rc::clone(&log),
            }),
            database: Rc::new(FakeDatabase {
                log: Rc::clone(&log),
                ..FakeDatabase::default()
            }),
            ownership: Rc::new(FakeOwnership {
                log: Rc::clone(&log),
                ..FakeOwnership::default()
            }),
            extractor: Rc::new(FakeExtractor {
                log: Rc::clone(&log),
            }),
            certs: Rc::new(FakeCerts {
                log: Rc::clone(&log),
            }),
            log,
        }
    }

    pub fn host(&self) -> Host {
        Host {
            packages: self.packages.clone(),
            http: self.http.clone(),
            extractor: self.extractor.clone(),
            web: self.web.clone(),
            database: self.database.clone(),
            certs: self.certs.clone(),
            ownership: self.ownership.clone(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Position of the first call starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.log.borrow().iter().position(|c| c.starts_with(prefix))
    }
}
