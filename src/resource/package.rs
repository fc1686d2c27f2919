//! Package resource - OS packages resolved against the platform profile

use anyhow::Result;
use declarative::{ApplyContext, Outcome, Probe, Resource};
use std::rc::Rc;

use crate::platform::{Family, Profile, ProfileSlot};
use crate::system::PackageManager;

/// Which packages a resource installs
///
/// Names that depend on the platform are resolved when the resource runs, so
/// platform detection earlier in the same run is taken into account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSet {
    /// PHP extensions ownCloud needs (gd, mbstring, xml)
    PhpExtensions,
    /// The PHP MySQL driver
    PhpMysql,
    /// Apache with mod_php
    WebServer,
    /// The MySQL server
    DatabaseServer,
    Named(Vec<String>),
}

impl PackageSet {
    pub fn label(&self) -> String {
        match self {
            Self::PhpExtensions => "php extensions".to_string(),
            Self::PhpMysql => "php mysql driver".to_string(),
            Self::WebServer => "web server".to_string(),
            Self::DatabaseServer => "database server".to_string(),
            Self::Named(names) => names.join(" "),
        }
    }

    pub fn resolve(&self, profile: &Profile) -> Vec<String> {
        let names: &[&str] = match (self, profile.family) {
            (Self::PhpExtensions, _) => return profile.php_packages.clone(),
            (Self::PhpMysql, _) => return vec![profile.php_mysql_package.clone()],
            (Self::Named(names), _) => return names.clone(),
            (Self::WebServer, Family::Debian) => &["apache2", "libapache2-mod-php5"],
            (Self::WebServer, Family::RedHat) => &["httpd", "php", "mod_ssl"],
            (Self::DatabaseServer, _) => &["mysql-server"],
        };
        names.iter().map(ToString::to_string).collect()
    }
}

pub struct Package {
    set: PackageSet,
    profile: ProfileSlot,
    manager: Rc<dyn PackageManager>,
}

impl Package {
    pub fn new(set: PackageSet, profile: &ProfileSlot, manager: &Rc<dyn PackageManager>) -> Self {
        Self {
            set,
            profile: Rc::clone(profile),
            manager: Rc::clone(manager),
        }
    }

    fn names(&self) -> Vec<String> {
        self.set.resolve(&self.profile.borrow())
    }

    fn missing(&self) -> Vec<String> {
        self.names()
            .into_iter()
            .filter(|name| !self.manager.is_installed(name))
            .collect()
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package").field("set", &self.set).finish()
    }
}

impl Resource for Package {
    fn id(&self) -> String {
        format!("package:{}", self.set.label())
    }

    fn description(&self) -> String {
        format!("Install {}", self.names().join(", "))
    }

    fn resource_type(&self) -> &'static str {
        "package"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["install"]
    }

    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        self.missing().is_empty()
    }

    fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        let missing = self.missing();
        for name in &missing {
            self.manager.install(name)?;
        }
        Ok(if missing.is_empty() {
            Outcome::Unchanged
        } else {
            Outcome::Changed
        })
    }
}
