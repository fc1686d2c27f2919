//! Resources of an ownCloud deployment
//!
//! Each resource owns one piece of host state and knows how to check it
//! (the guard) and converge it (the action). The host is reached only
//! through the adapters in [`crate::system`], so every resource runs against
//! fakes in tests.

mod config;
mod database;
mod directory;
mod download;
mod file;
mod http;
mod package;
mod platform;
mod service;
mod site;

pub use config::ApplyConfig;
pub use database::{MysqlDatabase, MysqlGrant};
pub use directory::Directory;
pub use download::{Extract, HeadCheck, RemoteFile};
pub use file::{Content, LazyCertificate, Location, ManagedFile};
pub use http::HttpTrigger;
pub use package::{Package, PackageSet};
pub use platform::DetectPlatform;
pub use service::WebService;
pub use site::{DisabledSite, Site};
