//! Service resource - web server restarts and reloads

use anyhow::Result;
use declarative::{ApplyContext, Outcome, Probe, Resource};
use std::rc::Rc;

use crate::system::WebServer;

/// The web server daemon, only ever run through notifications
pub struct WebService {
    pub name: String,
    web: Rc<dyn WebServer>,
}

impl WebService {
    pub fn new(name: &str, web: &Rc<dyn WebServer>) -> Self {
        Self {
            name: name.to_string(),
            web: Rc::clone(web),
        }
    }
}

impl std::fmt::Debug for WebService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebService").field("name", &self.name).finish()
    }
}

impl Resource for WebService {
    fn id(&self) -> String {
        format!("service:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Restart {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "service"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["restart", "reload"]
    }

    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        false
    }

    fn apply(&self, action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        match action {
            "reload" => self.web.reload()?,
            "restart" => self.web.restart()?,
            other => anyhow::bail!("service {} has no action {other}", self.name),
        }
        Ok(Outcome::Changed)
    }
}
