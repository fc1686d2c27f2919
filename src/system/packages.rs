//! OS package installation

use crate::platform::{Family, ProfileSlot};
use crate::runner;
use anyhow::Result;

pub trait PackageManager {
    fn is_installed(&self, name: &str) -> bool;
    fn install(&self, name: &str) -> Result<()>;
}

/// apt-get on the Debian family, dnf or yum on the Red Hat family
pub struct SystemPackages {
    profile: ProfileSlot,
}

impl SystemPackages {
    pub fn new(profile: ProfileSlot) -> Self {
        Self { profile }
    }

    fn family(&self) -> Family {
        self.profile.borrow().family
    }
}

impl PackageManager for SystemPackages {
    fn is_installed(&self, name: &str) -> bool {
        match self.family() {
            Family::Debian => runner::run_capture("dpkg-query", &["-W", "-f=${Status}", name])
                .is_ok_and(|status| status.ends_with("install ok installed")),
            Family::RedHat => runner::run_quiet("rpm", &["-q", name]),
        }
    }

    fn install(&self, name: &str) -> Result<()> {
        log::info!("Installing package {name}");
        match self.family() {
            Family::Debian => runner::run("apt-get", &["install", "-y", "-q", name]),
            Family::RedHat => {
                let tool = if runner::command_exists("dnf") { "dnf" } else { "yum" };
                runner::run(tool, &["install", "-y", name])
            }
        }
    }
}
