//! Desired-state settings loaded from `cumulus.toml`
//!
//! Every attribute has a default, so an empty (or missing) settings file
//! describes a stock install: MySQL database, Apache on port 80 and 443,
//! ownCloud under `/var/www/owncloud`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file used when neither `--settings` nor `CUMULUS_SETTINGS` is given
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/cumulus/cumulus.toml";

/// Release tarball fetched when no download URL is configured
pub const DEFAULT_DOWNLOAD_URL: &str =
    "http://download.owncloud.org/community/owncloud-latest.tar.bz2";

/// Keys of `[owncloud.config]` filled in when the settings file leaves them out
const CONFIG_DEFAULTS: &[(&str, &str)] = &[
    ("dbtype", "mysql"),
    ("dbname", "owncloud"),
    ("dbuser", "owncloud"),
    ("dbhost", "localhost"),
    ("dbtableprefix", ""),
    ("mail_smtpmode", "sendmail"),
];

// ============================================================================
// Settings Structures
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub owncloud: OwncloudSettings,
    pub apache: ApacheSettings,
    pub mysql: MysqlSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OwncloudSettings {
    /// Release archive to install from
    pub download_url: String,
    /// Web root the archive is extracted into
    pub www_dir: String,
    /// Application directory (the archive's top-level `owncloud/`)
    pub dir: String,
    /// User data directory
    pub data_dir: String,
    /// Virtual host name, also the certificate subject
    pub server_name: String,
    /// Serve over HTTPS with a self-signed certificate as well
    pub ssl: bool,
    /// Strict mode: secrets must be supplied, nothing is generated or stored
    pub solo: bool,
    pub admin: AdminSettings,
    /// Desired `config.php` values, merged on every run
    pub config: toml::Table,
}

impl Default for OwncloudSettings {
    fn default() -> Self {
        Self {
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            www_dir: "/var/www".to_string(),
            dir: "/var/www/owncloud".to_string(),
            data_dir: "/var/www/owncloud/data".to_string(),
            server_name: "localhost".to_string(),
            ssl: true,
            solo: false,
            admin: AdminSettings::default(),
            config: toml::Table::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    pub user: String,
    /// Generated and recorded in node state when absent (outside solo mode)
    pub pass: Option<String>,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            user: "admin".to_string(),
            pass: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApacheSettings {
    pub user: String,
    pub group: String,
    /// Directory holding `sites-available` and `sites-enabled`
    pub dir: String,
}

impl Default for ApacheSettings {
    fn default() -> Self {
        Self {
            user: "www-data".to_string(),
            group: "www-data".to_string(),
            dir: "/etc/apache2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MysqlSettings {
    pub server_root_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Where downloaded archives are kept between runs
    pub file_cache_path: String,
    /// Durable node state (generated credentials, install identifiers)
    pub state_file: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            file_cache_path: "/var/cache/cumulus".to_string(),
            state_file: "~/.local/state/cumulus/node.toml".to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Settings {
    /// Load settings, falling back to defaults when the default file is absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (expand(&p.to_string_lossy()), true),
            None => (PathBuf::from(DEFAULT_SETTINGS_PATH), false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Settings file not found: {}", path.display());
            }
            log::info!(
                "No settings at {}, using defaults",
                path.display()
            );
            return Ok(Self::default().with_config_defaults());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings = Self::from_toml(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings.with_config_defaults())
    }

    fn with_config_defaults(mut self) -> Self {
        for (key, value) in CONFIG_DEFAULTS {
            self.owncloud
                .config
                .entry(*key)
                .or_insert_with(|| toml::Value::String((*value).to_string()));
        }
        self
    }

    // ------------------------------------------------------------------------
    // Derived paths
    // ------------------------------------------------------------------------

    pub fn www_dir(&self) -> PathBuf {
        expand(&self.owncloud.www_dir)
    }

    pub fn app_dir(&self) -> PathBuf {
        expand(&self.owncloud.dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        expand(&self.owncloud.data_dir)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.app_dir().join("config")
    }

    /// ownCloud's own config document
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.php")
    }

    /// Seed read by the installer on first request
    pub fn autoconfig_file(&self) -> PathBuf {
        self.config_dir().join("autoconfig.php")
    }

    pub fn cache_dir(&self) -> PathBuf {
        expand(&self.paths.file_cache_path)
    }

    /// Local copy of the release archive
    pub fn archive_file(&self) -> PathBuf {
        let name = self
            .owncloud
            .download_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or("owncloud.tar.bz2");
        self.cache_dir().join(name)
    }

    pub fn state_file(&self) -> PathBuf {
        expand(&self.paths.state_file)
    }

    pub fn apache_dir(&self) -> PathBuf {
        expand(&self.apache.dir)
    }

    // ------------------------------------------------------------------------
    // Desired config values
    // ------------------------------------------------------------------------

    /// A `[owncloud.config]` value as a string, empty when unset
    pub fn config_str(&self, key: &str) -> String {
        match self.owncloud.config.get(key) {
            Some(toml::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Operator-supplied database password, if any
    pub fn supplied_dbpassword(&self) -> Option<String> {
        match self.owncloud.config.get("dbpassword") {
            Some(toml::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Operator-supplied admin password, if any
    pub fn supplied_admin_pass(&self) -> Option<String> {
        self.owncloud.admin.pass.clone().filter(|p| !p.is_empty())
    }

    /// The desired `config.php` map, minus secrets resolved at run time
    pub fn desired_config(&self) -> phpconf::Array {
        self.owncloud
            .config
            .iter()
            .filter(|(key, _)| key.as_str() != "dbpassword")
            .map(|(key, value)| (key.as_str(), to_php(value)))
            .collect()
    }
}

/// Expand `~` in a configured path
fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Convert a TOML value to its config document counterpart
pub fn to_php(value: &toml::Value) -> phpconf::Value {
    match value {
        toml::Value::String(s) => phpconf::Value::String(s.clone()),
        toml::Value::Integer(i) => phpconf::Value::Int(*i),
        toml::Value::Float(f) => phpconf::Value::Float(*f),
        toml::Value::Boolean(b) => phpconf::Value::Bool(*b),
        toml::Value::Datetime(d) => phpconf::Value::String(d.to_string()),
        toml::Value::Array(items) => {
            let mut array = phpconf::Array::new();
            for item in items {
                array.push(to_php(item));
            }
            phpconf::Value::Array(array)
        }
        toml::Value::Table(table) => phpconf::Value::Array(
            table
                .iter()
                .map(|(k, v)| (k.as_str(), to_php(v)))
                .collect(),
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use phpconf::{Key, Value};

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();

        assert_eq!(settings.owncloud.download_url, DEFAULT_DOWNLOAD_URL);
        assert_eq!(settings.app_dir(), PathBuf::from("/var/www/owncloud"));
        assert_eq!(
            settings.config_file(),
            PathBuf::from("/var/www/owncloud/config/config.php")
        );
        assert_eq!(
            settings.archive_file(),
            PathBuf::from("/var/cache/cumulus/owncloud-latest.tar.bz2")
        );
        assert_eq!(settings.config_str("dbtype"), "mysql");
        assert_eq!(settings.config_str("mail_smtpmode"), "sendmail");
        assert!(settings.owncloud.ssl);
        assert!(!settings.owncloud.solo);
        assert!(settings.supplied_dbpassword().is_none());
    }

    #[test]
    fn test_desired_config_keeps_order_and_types() {
        let settings = Settings::from_toml(
            r#"
[owncloud]
server_name = "cloud.example.com"

[owncloud.config]
dbtype = "pgsql"
dbpassword = "hunter2"
trusted_domains = ["cloud.example.com", "10.0.0.5"]
loglevel = 2
"#,
        )
        .unwrap();

        assert_eq!(settings.supplied_dbpassword().as_deref(), Some("hunter2"));

        let desired = settings.desired_config();
        let keys: Vec<String> = desired.keys().map(ToString::to_string).collect();
        assert_eq!(keys[..3], ["dbtype", "trusted_domains", "loglevel"]);
        assert!(desired.get("dbpassword").is_none());
        assert_eq!(desired.get("loglevel"), Some(&Value::Int(2)));

        let domains = desired.get("trusted_domains").and_then(Value::as_array).unwrap();
        assert_eq!(domains.get_key(&Key::Int(1)), Some(&Value::from("10.0.0.5")));
    }

    #[test]
    fn test_numeric_table_keys_become_int_keys() {
        let settings = Settings::from_toml(
            r#"
[owncloud.config.trusted_domains]
0 = "localhost"
1 = "cloud.example.com"
"#,
        )
        .unwrap();

        let desired = settings.desired_config();
        let domains = desired.get("trusted_domains").and_then(Value::as_array).unwrap();
        let installed = phpconf::parse(
            "<?php $CONFIG = array('trusted_domains' => array(0 => 'localhost', 1 => 'cloud.example.com'));",
        )
        .unwrap();

        assert_eq!(domains.get_key(&Key::Int(0)), Some(&Value::from("localhost")));
        assert_eq!(installed.get("trusted_domains"), Some(&Value::Array(domains.clone())));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("cumulus.toml");
        assert!(Settings::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cumulus.toml");
        fs::write(&path, "[owncloud]\nsolo = true\nssl = false\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert!(settings.owncloud.solo);
        assert!(!settings.owncloud.ssl);
    }
}
