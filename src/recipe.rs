//! The ownCloud deployment
//!
//! Declares every resource of a deployment in the order they are walked and
//! wires the notifications between them:
//!
//! ```text
//! http_request:HEAD owncloud --immediately--> remote_file:download owncloud
//!                            --immediately--> execute:extract owncloud
//! file:owncloud.key          --immediately--> file:owncloud.pem
//! apache_site / web_app / certificate --delayed--> service:apache2
//! file:autoconfig.php        --immediately--> service:apache2 (restart)
//!                            --immediately--> http_request:run setup
//! ```
//!
//! The walk ends with the config merge, which needs the `config.php` the
//! installer writes on its first request.

use declarative::{Notification, RunPlan};
use phpconf::{ConfigDocument, ConfigStore};
use std::cell::RefCell;
use std::rc::Rc;

use crate::credentials::{
    ADMIN_PASSWORD, Credential, CredentialError, CredentialManager, DB_PASSWORD, Origin, Policy,
};
use crate::platform::{HostPlatform, ProfileSlot};
use crate::resource::{
    ApplyConfig, Content, DetectPlatform, Directory, DisabledSite, Extract, HeadCheck,
    HttpTrigger, LazyCertificate, Location, ManagedFile, MysqlDatabase, MysqlGrant, Package,
    PackageSet, RemoteFile, Site, WebService,
};
use crate::settings::Settings;
use crate::state::NodeStore;
use crate::system::{Host, Vhost};

/// Name shared by the download chain resources
const RELEASE: &str = "owncloud";

const HEAD: &str = "http_request:HEAD owncloud";
const DOWNLOAD: &str = "remote_file:download owncloud";
const EXTRACT: &str = "execute:extract owncloud";
const WEB_SERVICE: &str = "service:apache2";
const RUN_SETUP: &str = "http_request:run setup";
const SSL_KEY: &str = "file:owncloud.key";
const SSL_CERT: &str = "file:owncloud.pem";
const AUTOCONFIG: &str = "file:autoconfig.php";
const DEFAULT_SITE: &str = "apache_site:default";

/// URL that starts the installer once autoconfig is in place
pub const SETUP_URL: &str = "http://localhost/";

/// Passwords the deployment writes into the database and autoconfig
#[derive(Debug, Clone)]
pub struct Secrets {
    pub dbpassword: Credential,
    pub admin_pass: Credential,
}

/// Everything a run is built from
pub struct Deployment {
    pub settings: Settings,
    pub host: Host,
    pub profile: ProfileSlot,
    pub platform: HostPlatform,
    pub node: Rc<RefCell<dyn NodeStore>>,
}

impl Deployment {
    /// Credentials with the operator-supplied values from settings
    pub fn credentials(&self) -> CredentialManager {
        CredentialManager::new(Rc::clone(&self.node))
            .supply(DB_PASSWORD, self.settings.supplied_dbpassword())
            .supply(ADMIN_PASSWORD, self.settings.supplied_admin_pass())
    }

    /// Resolve the passwords before anything on the host is touched.
    ///
    /// In solo mode both must be supplied; otherwise missing ones are
    /// generated once and recorded.
    pub fn secrets(&self) -> Result<Secrets, CredentialError> {
        let policy = if self.settings.owncloud.solo {
            Policy::RequireSupplied
        } else {
            Policy::GenerateIfMissing
        };
        let credentials = self.credentials();
        Ok(Secrets {
            dbpassword: credentials.ensure(DB_PASSWORD, policy)?,
            admin_pass: credentials.ensure(ADMIN_PASSWORD, policy)?,
        })
    }

    /// Passwords as they stand, generating nothing.
    ///
    /// Read-only commands use this; an unresolved secret is empty.
    pub fn recorded_secrets(&self) -> Secrets {
        let credentials = self.credentials();
        let resolve = |name: &str| {
            credentials.peek(name).unwrap_or_else(|| Credential {
                name: name.to_string(),
                value: String::new(),
                origin: Origin::Generated,
            })
        };
        Secrets {
            dbpassword: resolve(DB_PASSWORD),
            admin_pass: resolve(ADMIN_PASSWORD),
        }
    }

    /// The desired `config.php` values, secrets included
    pub fn desired_config(&self, secrets: &Secrets) -> phpconf::Array {
        let mut desired = self.settings.desired_config();
        desired.insert("dbpassword", secrets.dbpassword.value.as_str());
        desired
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.settings.config_file())
    }

    /// Build the plan for one run
    pub fn plan(&self, secrets: &Secrets) -> RunPlan {
        let settings = &self.settings;
        let host = &self.host;
        let apache = (&settings.apache.user, &settings.apache.group);
        let mut plan = RunPlan::new();

        plan.add_best_effort(Box::new(DetectPlatform::new(
            self.platform.clone(),
            &self.profile,
        )));

        // PHP
        plan.add(Box::new(Package::new(
            PackageSet::PhpExtensions,
            &self.profile,
            &host.packages,
        )));

        // Database
        if settings.config_str("dbtype") == "mysql" {
            let dbname = settings.config_str("dbname");
            let dbuser = settings.config_str("dbuser");
            for set in [PackageSet::DatabaseServer, PackageSet::PhpMysql] {
                plan.add(Box::new(Package::new(set, &self.profile, &host.packages)));
            }
            plan.add(Box::new(MysqlDatabase::new(&dbname, &host.database)));
            plan.add(Box::new(MysqlGrant::new(
                &dbname,
                &dbuser,
                &secrets.dbpassword.value,
                &host.database,
            )));
        }

        // Mail transfer agent
        if settings.config_str("mail_smtpmode") == "sendmail" {
            plan.add(Box::new(Package::new(
                PackageSet::Named(vec!["postfix".to_string()]),
                &self.profile,
                &host.packages,
            )));
        }

        // Download and extract
        plan.add(Box::new(Directory::new(settings.www_dir(), &host.ownership)));

        let archive = settings.archive_file();
        let url = &settings.owncloud.download_url;
        plan.add(Box::new(HeadCheck::new(RELEASE, url, archive.clone(), &host.http)));
        plan.add_on_notify(Box::new(RemoteFile::new(
            RELEASE,
            url,
            archive.clone(),
            &host.http,
        )));
        plan.add_on_notify(Box::new(Extract::new(
            RELEASE,
            archive,
            settings.www_dir(),
            &host.extractor,
        )));
        plan.notify(Notification::immediately(HEAD, DOWNLOAD, "create"));
        plan.notify(Notification::immediately(DOWNLOAD, EXTRACT, "run"));

        for dir in [
            settings.app_dir().join("apps"),
            settings.config_dir(),
            settings.data_dir(),
        ] {
            plan.add(Box::new(
                Directory::new(dir, &host.ownership)
                    .owned_by(apache.0, apache.1)
                    .with_mode(0o750),
            ));
        }

        // Web server
        plan.add(Box::new(Package::new(
            PackageSet::WebServer,
            &self.profile,
            &host.packages,
        )));

        plan.add(Box::new(DisabledSite::new("default", &host.web)));
        plan.notify(Notification::delayed(DEFAULT_SITE, WEB_SERVICE, "reload"));

        let vhost = Vhost {
            name: "owncloud".to_string(),
            server_name: settings.owncloud.server_name.clone(),
            docroot: settings.app_dir(),
            port: 80,
            ssl: None,
        };
        plan.notify(Notification::delayed("web_app:owncloud", WEB_SERVICE, "restart"));
        plan.add(Box::new(Site::new(vhost.clone(), &host.web)));

        if settings.owncloud.ssl {
            let cert = LazyCertificate::new(&settings.owncloud.server_name, &host.certs);
            plan.add(Box::new(
                ManagedFile::new(
                    "owncloud.key",
                    Location::SslKey(Rc::clone(&self.profile)),
                    Content::CertificateKey(Rc::clone(&cert)),
                    0o600,
                    &host.ownership,
                )
                .create_if_missing(),
            ));
            plan.add_on_notify(Box::new(ManagedFile::new(
                "owncloud.pem",
                Location::SslCert(Rc::clone(&self.profile)),
                Content::Certificate(cert),
                0o644,
                &host.ownership,
            )));
            plan.notify(Notification::immediately(SSL_KEY, SSL_CERT, "create"));
            plan.notify(Notification::delayed(SSL_CERT, WEB_SERVICE, "restart"));

            plan.add(Box::new(
                Site::new(
                    Vhost {
                        name: "owncloud-ssl".to_string(),
                        port: 443,
                        ..vhost
                    },
                    &host.web,
                )
                .with_tls(&self.profile),
            ));
            plan.notify(Notification::delayed(
                "web_app:owncloud-ssl",
                WEB_SERVICE,
                "restart",
            ));
        }

        // First install
        plan.add(Box::new(
            ManagedFile::new(
                "autoconfig.php",
                settings.autoconfig_file(),
                Content::Text(render_autoconfig(settings, secrets)),
                0o640,
                &host.ownership,
            )
            .owned_by(apache.0, apache.1)
            .unless_exists(settings.config_file()),
        ));
        plan.notify(Notification::immediately(AUTOCONFIG, WEB_SERVICE, "restart"));
        plan.notify(Notification::immediately(AUTOCONFIG, RUN_SETUP, "get"));

        plan.add_on_notify(Box::new(WebService::new("apache2", &host.web)));
        plan.add_on_notify(Box::new(HttpTrigger::new("run setup", SETUP_URL, &host.http)));

        // Converge config.php
        let mut apply = ApplyConfig::new(
            self.config_store(),
            self.desired_config(secrets),
            &self.node,
            &host.ownership,
        )
        .owned_by(apache.0, apache.1);
        if settings.owncloud.solo {
            apply = apply.without_recording();
        }
        plan.add(Box::new(apply));

        plan
    }
}

/// Render `autoconfig.php`, read by the installer on its first request
pub fn render_autoconfig(settings: &Settings, secrets: &Secrets) -> String {
    let mut doc = ConfigDocument::new("AUTOCONFIG");
    let config = |key: &str| settings.config_str(key);

    doc.set("dbtype", config("dbtype"));
    doc.set("dbname", config("dbname"));
    doc.set("dbuser", config("dbuser"));
    doc.set("dbpass", secrets.dbpassword.value.as_str());
    doc.set("dbhost", config("dbhost"));
    doc.set("dbtableprefix", config("dbtableprefix"));
    doc.set("adminlogin", settings.owncloud.admin.user.as_str());
    doc.set("adminpass", secrets.admin_pass.value.as_str());
    doc.set("directory", settings.data_dir().to_string_lossy().into_owned());
    phpconf::serialize(&doc)
}
