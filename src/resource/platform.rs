//! Platform detection - selects the package and certificate profile

use anyhow::Result;
use declarative::{ApplyContext, Outcome, Probe, Resource};

use crate::platform::{self, HostPlatform, ProfileSlot};

/// Looks the host up in the platform table and fills the shared profile.
///
/// Declared best-effort: on an unknown platform the lookup fails, the run
/// logs a warning and keeps the guessed profile the slot started with.
pub struct DetectPlatform {
    host: HostPlatform,
    slot: ProfileSlot,
}

impl DetectPlatform {
    pub fn new(host: HostPlatform, slot: &ProfileSlot) -> Self {
        Self {
            host,
            slot: std::rc::Rc::clone(slot),
        }
    }
}

impl std::fmt::Debug for DetectPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectPlatform")
            .field("host", &self.host)
            .finish()
    }
}

impl Resource for DetectPlatform {
    fn id(&self) -> String {
        "platform:detect".to_string()
    }

    fn description(&self) -> String {
        format!("Detect packages for {}", self.host)
    }

    fn resource_type(&self) -> &'static str {
        "platform"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["detect"]
    }

    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        let profile = self.slot.borrow();
        !profile.guessed && profile.platform == self.host.name.to_lowercase()
    }

    fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        let profile = platform::lookup(&self.host)?;
        log::debug!("Using {} profile", profile.platform);
        *self.slot.borrow_mut() = profile;
        // Nothing on the host changed
        Ok(Outcome::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Family;
    use declarative::{FsProbe, RunPlan, converge_simple};
    use std::path::Path;

    #[test]
    fn test_known_platform_fills_slot() {
        let slot = platform::slot(Path::new("/var/www"), Family::Debian);
        let mut plan = RunPlan::new();
        plan.add_best_effort(Box::new(DetectPlatform::new(
            HostPlatform::new("centos", "7.9"),
            &slot,
        )));

        let summary = converge_simple(&plan, &FsProbe).unwrap();
        assert_eq!(summary.degraded, 0);
        assert_eq!(slot.borrow().family, Family::RedHat);
        assert!(!slot.borrow().guessed);
    }

    #[test]
    fn test_unknown_platform_degrades_to_guess() {
        let slot = platform::slot(Path::new("/srv/www"), Family::Debian);
        let mut plan = RunPlan::new();
        plan.add_best_effort(Box::new(DetectPlatform::new(
            HostPlatform::new("plan9", "4"),
            &slot,
        )));

        let summary = converge_simple(&plan, &FsProbe).unwrap();
        assert_eq!(summary.degraded, 1);
        assert!(slot.borrow().guessed);
        assert_eq!(slot.borrow().ssl_key_dir, Path::new("/srv/www"));
    }
}
