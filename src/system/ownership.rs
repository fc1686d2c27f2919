use crate::runner;
use anyhow::{Context, Result};
use std::path::Path;

pub trait Ownership {
    /// Owning user and group names, if the path exists
    fn owner(&self, path: &Path) -> Option<(String, String)>;
    fn chown(&self, path: &Path, user: &str, group: &str) -> Result<()>;
}

/// Uses `stat` and `chown` from coreutils
pub struct HostOwnership;

impl Ownership for HostOwnership {
    fn owner(&self, path: &Path) -> Option<(String, String)> {
        let path = path.to_string_lossy();
        let out = runner::run_capture("stat", &["-c", "%U:%G", &path]).ok()?;
        parse_owner(&out)
    }

    fn chown(&self, path: &Path, user: &str, group: &str) -> Result<()> {
        let spec = format!("{user}:{group}");
        let display = path.to_string_lossy();
        runner::run_capture("chown", &[&spec, &display])
            .with_context(|| format!("Failed to chown {display} to {spec}"))?;
        Ok(())
    }
}

fn parse_owner(out: &str) -> Option<(String, String)> {
    let (user, group) = out.trim().split_once(':')?;
    Some((user.to_string(), group.to_string()))
}
