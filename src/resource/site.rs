//! Web site resources - virtual host definitions and enabled sites

use anyhow::{Context, Result};
use declarative::{ApplyContext, Outcome, Probe, Resource};
use std::fs;
use std::rc::Rc;

use crate::platform::ProfileSlot;
use crate::system::{Vhost, WebServer, render_vhost};

/// A rendered virtual host, enabled
pub struct Site {
    pub vhost: Vhost,
    /// Serve TLS with the key and certificate of the platform profile
    tls: Option<ProfileSlot>,
    web: Rc<dyn WebServer>,
}

impl Site {
    pub fn new(vhost: Vhost, web: &Rc<dyn WebServer>) -> Self {
        Self {
            vhost,
            tls: None,
            web: Rc::clone(web),
        }
    }

    pub fn with_tls(mut self, profile: &ProfileSlot) -> Self {
        self.tls = Some(Rc::clone(profile));
        self
    }

    fn render(&self) -> String {
        match &self.tls {
            Some(slot) => {
                let profile = slot.borrow();
                render_vhost(&Vhost {
                    ssl: Some((profile.ssl_key_path(), profile.ssl_cert_path())),
                    ..self.vhost.clone()
                })
            }
            None => render_vhost(&self.vhost),
        }
    }
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site").field("vhost", &self.vhost).finish()
    }
}

impl Resource for Site {
    fn id(&self) -> String {
        format!("web_app:{}", self.vhost.name)
    }

    fn description(&self) -> String {
        format!(
            "Virtual host {} on port {}",
            self.vhost.server_name, self.vhost.port
        )
    }

    fn resource_type(&self) -> &'static str {
        "web_app"
    }

    fn is_satisfied(&self, probe: &dyn Probe) -> bool {
        let path = self.web.site_path(&self.vhost.name);
        probe.read_to_string(&path).as_deref() == Some(self.render().as_str())
            && self.web.site_enabled(&self.vhost.name)
    }

    fn apply(&self, _action: &str, ctx: &mut ApplyContext) -> Result<Outcome> {
        let path = self.web.site_path(&self.vhost.name);
        let rendered = self.render();

        if ctx.probe.read_to_string(&path).as_deref() != Some(rendered.as_str()) {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
            fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote virtual host {}", path.display());
        }

        if !self.web.site_enabled(&self.vhost.name) {
            self.web.enable_site(&self.vhost.name)?;
        }
        Ok(Outcome::Changed)
    }
}

/// A site that must not be enabled
pub struct DisabledSite {
    pub name: String,
    web: Rc<dyn WebServer>,
}

impl DisabledSite {
    pub fn new(name: &str, web: &Rc<dyn WebServer>) -> Self {
        Self {
            name: name.to_string(),
            web: Rc::clone(web),
        }
    }
}

impl std::fmt::Debug for DisabledSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisabledSite")
            .field("name", &self.name)
            .finish()
    }
}

impl Resource for DisabledSite {
    fn id(&self) -> String {
        format!("apache_site:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Disable site {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "apache_site"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["disable"]
    }

    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        !self.web.site_enabled(&self.name)
    }

    fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        self.web.disable_site(&self.name)?;
        Ok(Outcome::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{self, Family, HostPlatform};
    use crate::system::fake::FakeHost;
    use declarative::{FsProbe, execute_resource};
    use std::path::PathBuf;

    #[test]
    fn test_site_written_and_enabled_once() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = FakeHost::new(dir.path());
        let site = Site::new(
            Vhost {
                name: "owncloud".into(),
                server_name: "cloud.example.com".into(),
                docroot: PathBuf::from("/var/www/owncloud"),
                port: 80,
                ssl: None,
            },
            &fakes.host().web,
        );
        let mut ctx = ApplyContext::new(false, &FsProbe);

        assert_eq!(execute_resource(&site, "apply", &mut ctx), Outcome::Changed);
        assert!(
            fs::read_to_string(dir.path().join("owncloud.conf"))
                .unwrap()
                .contains("ServerName cloud.example.com")
        );
        assert_eq!(execute_resource(&site, "apply", &mut ctx), Outcome::Unchanged);
        assert_eq!(fakes.calls(), vec!["enable owncloud"]);
    }

    #[test]
    fn test_tls_paths_follow_detected_platform() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = FakeHost::new(dir.path());
        let slot = platform::slot(dir.path(), Family::Debian);
        let site = Site::new(
            Vhost {
                name: "owncloud-ssl".into(),
                server_name: "cloud.example.com".into(),
                docroot: PathBuf::from("/var/www/owncloud"),
                port: 443,
                ssl: None,
            },
            &fakes.host().web,
        )
        .with_tls(&slot);

        *slot.borrow_mut() = platform::lookup(&HostPlatform::new("fedora", "39")).unwrap();
        let mut ctx = ApplyContext::new(false, &FsProbe);
        execute_resource(&site, "apply", &mut ctx);

        let written = fs::read_to_string(dir.path().join("owncloud-ssl.conf")).unwrap();
        assert!(written.contains("SSLCertificateKeyFile /etc/pki/tls/private/owncloud.key"));
    }

    #[test]
    fn test_disable_default_site() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = FakeHost::new(dir.path());
        let default = DisabledSite::new("default", &fakes.host().web);
        let mut ctx = ApplyContext::new(false, &FsProbe);

        assert_eq!(execute_resource(&default, "disable", &mut ctx), Outcome::Changed);
        assert_eq!(execute_resource(&default, "disable", &mut ctx), Outcome::Unchanged);
        assert_eq!(fakes.calls(), vec!["disable default"]);
    }
}
