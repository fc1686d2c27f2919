//! Apache web server: virtual host rendering and site management

use crate::platform::ProfileSlot;
use crate::runner;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub trait WebServer {
    /// Where the definition of site `name` lives
    fn site_path(&self, name: &str) -> PathBuf;
    fn site_enabled(&self, name: &str) -> bool;
    fn enable_site(&self, name: &str) -> Result<()>;
    fn disable_site(&self, name: &str) -> Result<()>;
    fn restart(&self) -> Result<()>;
    fn reload(&self) -> Result<()>;
}

/// A virtual host to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vhost {
    pub name: String,
    pub server_name: String,
    pub docroot: PathBuf,
    pub port: u16,
    /// Key and certificate paths, when served over TLS
    pub ssl: Option<(PathBuf, PathBuf)>,
}

/// Render a virtual host in Apache syntax
pub fn render_vhost(vhost: &Vhost) -> String {
    let docroot = vhost.docroot.display();
    let mut out = String::new();

    out.push_str("# Managed by cumulus; local changes are overwritten\n");
    out.push_str(&format!("<VirtualHost *:{}>\n", vhost.port));
    out.push_str(&format!("  ServerName {}\n", vhost.server_name));
    out.push_str(&format!("  DocumentRoot {docroot}\n"));
    out.push('\n');
    out.push_str(&format!("  <Directory {docroot}>\n"));
    out.push_str("    Options FollowSymLinks MultiViews\n");
    out.push_str("    AllowOverride All\n");
    out.push_str("    Require all granted\n");
    out.push_str("  </Directory>\n");

    if let Some((key, cert)) = &vhost.ssl {
        out.push('\n');
        out.push_str("  SSLEngine on\n");
        out.push_str(&format!("  SSLCertificateFile {}\n", cert.display()));
        out.push_str(&format!("  SSLCertificateKeyFile {}\n", key.display()));
    }

    out.push('\n');
    out.push_str(&format!("  ErrorLog ${{APACHE_LOG_DIR}}/{}-error.log\n", vhost.name));
    out.push_str(&format!(
        "  CustomLog ${{APACHE_LOG_DIR}}/{}-access.log combined\n",
        vhost.name
    ));
    out.push_str("</VirtualHost>\n");
    out
}

/// Sites under `<dir>/sites-available`, enabled by symlink from `sites-enabled`
pub struct Apache {
    dir: PathBuf,
    profile: ProfileSlot,
}

impl Apache {
    pub fn new(dir: impl Into<PathBuf>, profile: ProfileSlot) -> Self {
        Self {
            dir: dir.into(),
            profile,
        }
    }

    fn enabled_dir(&self) -> PathBuf {
        self.dir.join("sites-enabled")
    }

    /// File names a site may be enabled under
    fn enabled_names(name: &str) -> Vec<String> {
        let mut names = vec![name.to_string(), format!("{name}.conf")];
        // Debian ships its default site as 000-default
        if name == "default" {
            names.push("000-default".to_string());
            names.push("000-default.conf".to_string());
        }
        names
    }

    fn service(&self, action: &str) -> Result<()> {
        let service = self.profile.borrow().web_service();
        runner::run("service", &[service, action])
            .with_context(|| format!("Failed to {action} {service}"))
    }
}

impl WebServer for Apache {
    fn site_path(&self, name: &str) -> PathBuf {
        self.dir.join("sites-available").join(format!("{name}.conf"))
    }

    fn site_enabled(&self, name: &str) -> bool {
        let dir = self.enabled_dir();
        Self::enabled_names(name)
            .iter()
            .any(|n| dir.join(n).symlink_metadata().is_ok())
    }

    fn enable_site(&self, name: &str) -> Result<()> {
        let dir = self.enabled_dir();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let link = dir.join(format!("{name}.conf"));
        if link.symlink_metadata().is_ok() {
            return Ok(());
        }
        symlink(&self.site_path(name), &link)
            .with_context(|| format!("Failed to enable site {name}"))
    }

    fn disable_site(&self, name: &str) -> Result<()> {
        let dir = self.enabled_dir();
        for candidate in Self::enabled_names(name) {
            let path = dir.join(&candidate);
            if path.symlink_metadata().is_ok() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to disable site {}", path.display()))?;
            }
        }
        Ok(())
    }

    fn restart(&self) -> Result<()> {
        self.service("restart")
    }

    fn reload(&self) -> Result<()> {
        self.service("reload")
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::copy(target, link).map(|_| ())
}
