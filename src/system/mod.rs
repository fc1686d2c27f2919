//! External collaborators
//!
//! Every side effect outside the config document and node state goes through
//! one of these traits. [`Host::system`] wires the real implementations;
//! tests swap in the fakes from `fake`.

pub mod archive;
pub mod certs;
pub mod database;
#[cfg(test)]
pub mod fake;
pub mod http;
pub mod ownership;
pub mod packages;
pub mod web;

pub use archive::{Extractor, HostExtractor};
pub use certs::{CertificateIssuer, CertificatePair, OpensslIssuer};
pub use database::{Database, MysqlCli};
pub use http::{Freshness, HttpClient, UreqClient};
pub use ownership::{HostOwnership, Ownership};
pub use packages::{PackageManager, SystemPackages};
pub use web::{Apache, Vhost, WebServer, render_vhost};

use crate::platform::ProfileSlot;
use crate::settings::Settings;
use std::rc::Rc;

/// The collaborators a run talks to
#[derive(Clone)]
pub struct Host {
    pub packages: Rc<dyn PackageManager>,
    pub http: Rc<dyn HttpClient>,
    pub extractor: Rc<dyn Extractor>,
    pub web: Rc<dyn WebServer>,
    pub database: Rc<dyn Database>,
    pub certs: Rc<dyn CertificateIssuer>,
    pub ownership: Rc<dyn Ownership>,
}

impl Host {
    /// Collaborators acting on this machine
    pub fn system(settings: &Settings, profile: &ProfileSlot) -> Self {
        Self {
            packages: Rc::new(SystemPackages::new(Rc::clone(profile))),
            http: Rc::new(UreqClient::new()),
            extractor: Rc::new(HostExtractor),
            web: Rc::new(Apache::new(settings.apache_dir(), Rc::clone(profile))),
            database: Rc::new(MysqlCli::new(&settings.mysql.server_root_password)),
            certs: Rc::new(OpensslIssuer::new()),
            ownership: Rc::new(HostOwnership),
        }
    }
}
