//! Directory resource - a directory with optional owner and mode

use anyhow::{Context, Result};
use declarative::{ApplyContext, Outcome, Probe, Resource};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::system::Ownership;

pub struct Directory {
    pub path: PathBuf,
    /// User and group, left alone when `None`
    pub owner: Option<(String, String)>,
    pub mode: Option<u32>,
    ownership: Rc<dyn Ownership>,
}

impl Directory {
    pub fn new(path: impl AsRef<Path>, ownership: &Rc<dyn Ownership>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            owner: None,
            mode: None,
            ownership: Rc::clone(ownership),
        }
    }

    pub fn owned_by(mut self, user: &str, group: &str) -> Self {
        self.owner = Some((user.to_string(), group.to_string()));
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    fn owner_matches(&self) -> bool {
        match &self.owner {
            Some(wanted) => self.ownership.owner(&self.path).as_ref() == Some(wanted),
            None => true,
        }
    }

    fn mode_matches(&self, probe: &dyn Probe) -> bool {
        match (self.mode, probe.mode(&self.path)) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("path", &self.path)
            .field("owner", &self.owner)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Resource for Directory {
    fn id(&self) -> String {
        format!("directory:{}", self.path.display())
    }

    fn description(&self) -> String {
        match &self.owner {
            Some((user, group)) => format!("Directory {} ({user}:{group})", self.path.display()),
            None => format!("Directory {}", self.path.display()),
        }
    }

    fn resource_type(&self) -> &'static str {
        "directory"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["create"]
    }

    fn is_satisfied(&self, probe: &dyn Probe) -> bool {
        probe.is_dir(&self.path) && self.mode_matches(probe) && self.owner_matches()
    }

    fn apply(&self, _action: &str, ctx: &mut ApplyContext) -> Result<Outcome> {
        if !ctx.probe.is_dir(&self.path) {
            fs::create_dir_all(&self.path)
                .with_context(|| format!("Failed to create {}", self.path.display()))?;
            log::info!("Created {}", self.path.display());
        }

        #[cfg(unix)]
        if let Some(mode) = self.mode {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))
                .with_context(|| format!("Failed to set mode on {}", self.path.display()))?;
        }

        if let Some((user, group)) = &self.owner
            && !self.owner_matches()
        {
            self.ownership.chown(&self.path, user, group)?;
        }

        Ok(Outcome::Changed)
    }
}
