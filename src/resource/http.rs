//! HTTP trigger - kicks off the application's own web installer

use anyhow::Result;
use declarative::{ApplyContext, Outcome, Probe, Resource};
use std::rc::Rc;

use crate::system::HttpClient;

pub struct HttpTrigger {
    pub name: String,
    pub url: String,
    http: Rc<dyn HttpClient>,
}

impl HttpTrigger {
    pub fn new(name: &str, url: &str, http: &Rc<dyn HttpClient>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            http: Rc::clone(http),
        }
    }
}

impl std::fmt::Debug for HttpTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTrigger")
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}

impl Resource for HttpTrigger {
    fn id(&self) -> String {
        format!("http_request:{}", self.name)
    }

    fn description(&self) -> String {
        format!("GET {}", self.url)
    }

    fn resource_type(&self) -> &'static str {
        "http_request"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["get"]
    }

    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        false
    }

    // Any response counts; the installer reports problems in its page
    fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        let status = self.http.get(&self.url)?;
        log::info!("GET {} returned {status}", self.url);
        Ok(Outcome::Changed)
    }
}
