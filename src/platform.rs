//! Platform lookup table
//!
//! Maps the host distribution to the package names and certificate
//! directories a deployment needs.
//!
//! | Platform                    | PHP packages                      | SSL dirs          |
//! |-----------------------------|-----------------------------------|-------------------|
//! | debian, ubuntu              | php5-gd, php5-mysql               | /etc/ssl/*        |
//! | redhat, centos (< 6)        | php53-gd, -mbstring, -xml, -mysql | /etc/pki/tls/*    |
//! | redhat, centos (>= 6)       | php-gd, -mbstring, -xml, -mysql   | /etc/pki/tls/*    |
//! | fedora, scientific, amazon  | php-gd, -mbstring, -xml, -mysql   | /etc/pki/tls/*    |
//!
//! Anything else gets a guessed profile with the SSL files kept in the web root.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("unsupported platform: {name} {version}")]
    Unsupported { name: String, version: String },
}

/// Package tooling family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Debian,
    RedHat,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debian => write!(f, "debian"),
            Self::RedHat => write!(f, "rhel"),
        }
    }
}

/// Distribution name and version as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub name: String,
    pub version: String,
    /// Package family, used for the guessed profile of an unknown platform
    pub family: Family,
}

impl HostPlatform {
    pub fn new(name: &str, version: &str) -> Self {
        let family = match name.to_lowercase().as_str() {
            "debian" | "ubuntu" | "mint" | "raspbian" => Family::Debian,
            _ => Family::RedHat,
        };
        Self::with_family(name, version, family)
    }

    pub fn with_family(name: &str, version: &str, family: Family) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            family,
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Everything that differs between supported platforms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub platform: String,
    pub family: Family,
    pub php_packages: Vec<String>,
    pub php_mysql_package: String,
    pub ssl_key_dir: PathBuf,
    pub ssl_cert_dir: PathBuf,
    /// No table entry matched; values are a best guess
    pub guessed: bool,
}

impl Profile {
    /// Init script name of the web server
    pub fn web_service(&self) -> &'static str {
        match self.family {
            Family::Debian => "apache2",
            Family::RedHat => "httpd",
        }
    }

    pub fn ssl_key_path(&self) -> PathBuf {
        self.ssl_key_dir.join("owncloud.key")
    }

    pub fn ssl_cert_path(&self) -> PathBuf {
        self.ssl_cert_dir.join("owncloud.pem")
    }
}

fn packages(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn debian(platform: &str) -> Profile {
    Profile {
        platform: platform.to_string(),
        family: Family::Debian,
        php_packages: packages(&["php5-gd"]),
        php_mysql_package: "php5-mysql".to_string(),
        ssl_key_dir: PathBuf::from("/etc/ssl/private"),
        ssl_cert_dir: PathBuf::from("/etc/ssl/certs"),
        guessed: false,
    }
}

fn redhat(platform: &str, php_prefix: &str) -> Profile {
    Profile {
        platform: platform.to_string(),
        family: Family::RedHat,
        php_packages: ["gd", "mbstring", "xml"]
            .iter()
            .map(|ext| format!("{php_prefix}-{ext}"))
            .collect(),
        php_mysql_package: format!("{php_prefix}-mysql"),
        ssl_key_dir: PathBuf::from("/etc/pki/tls/private"),
        ssl_cert_dir: PathBuf::from("/etc/pki/tls/certs"),
        guessed: false,
    }
}

/// Look up the profile of a known platform
pub fn lookup(platform: &HostPlatform) -> Result<Profile, PlatformError> {
    let name = platform.name.to_lowercase();
    match name.as_str() {
        "debian" | "ubuntu" => Ok(debian(&name)),
        "redhat" | "centos" => {
            if major_version(&platform.version).is_some_and(|v| v < 6) {
                Ok(redhat(&name, "php53"))
            } else {
                Ok(redhat(&name, "php"))
            }
        }
        "fedora" | "scientific" | "amazon" => Ok(redhat(&name, "php")),
        _ => Err(PlatformError::Unsupported {
            name: platform.name.clone(),
            version: platform.version.clone(),
        }),
    }
}

/// Profile used when the platform is unknown
pub fn guess(www_dir: &Path, family: Family) -> Profile {
    Profile {
        platform: "unknown".to_string(),
        family,
        php_packages: packages(&["php-gd", "php-mbstring", "php-xml"]),
        php_mysql_package: "php-mysql".to_string(),
        ssl_key_dir: www_dir.to_path_buf(),
        ssl_cert_dir: www_dir.to_path_buf(),
        guessed: true,
    }
}

/// Leading integer of a version string, `"6.5"` -> 6
fn major_version(version: &str) -> Option<u32> {
    version
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|major| major.parse().ok())
}

/// Detect the host distribution
pub fn detect() -> HostPlatform {
    let os = os_info::get();

    let name = match os.os_type() {
        os_info::Type::Ubuntu => "ubuntu".to_string(),
        os_info::Type::Debian => "debian".to_string(),
        os_info::Type::Fedora => "fedora".to_string(),
        os_info::Type::CentOS => "centos".to_string(),
        os_info::Type::Redhat | os_info::Type::RedHatEnterprise => "redhat".to_string(),
        os_info::Type::Amazon => "amazon".to_string(),
        other => other.to_string().to_lowercase(),
    };

    let family = match os.os_type() {
        os_info::Type::Debian
        | os_info::Type::Ubuntu
        | os_info::Type::Mint
        | os_info::Type::Pop
        | os_info::Type::Raspbian => Family::Debian,
        _ if Path::new("/etc/debian_version").exists() => Family::Debian,
        _ => Family::RedHat,
    };

    HostPlatform::with_family(&name, &os.version().to_string(), family)
}

/// The profile resources read at apply time.
///
/// Starts as the guessed profile and is replaced once detection runs.
pub type ProfileSlot = Rc<RefCell<Profile>>;

pub fn slot(www_dir: &Path, family: Family) -> ProfileSlot {
    Rc::new(RefCell::new(guess(www_dir, family)))
}

// ============================================================================
// Tests
// ============================================================================
