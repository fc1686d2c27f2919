pub mod apply;
pub mod config;
pub mod credentials;
pub mod status;

use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;

use crate::Context;
use crate::platform;
use crate::recipe::Deployment;
use crate::settings::Settings;
use crate::state::FileNodeStore;
use crate::system::Host;

/// Load settings and node state and wire the real host collaborators
pub fn load_deployment(ctx: &Context) -> Result<Deployment> {
    let mut settings = Settings::load(ctx.settings.as_deref())?;
    if ctx.solo {
        settings.owncloud.solo = true;
    }

    let node = FileNodeStore::load(settings.state_file())?;
    let detected = platform::detect();
    let profile = platform::slot(&settings.www_dir(), detected.family);
    let host = Host::system(&settings, &profile);

    Ok(Deployment {
        host,
        profile,
        platform: detected,
        node: Rc::new(RefCell::new(node)),
        settings,
    })
}
