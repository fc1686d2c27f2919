use anyhow::Result;
use colored::Colorize;
use declarative::{Activation, DiffSummary, FsProbe, compute_diffs, group_by_type};

use crate::Context;
use crate::platform;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let deployment = super::load_deployment(ctx)?;

    // Guards read profile-dependent paths, so resolve the platform up front
    match platform::lookup(&deployment.platform) {
        Ok(profile) => *deployment.profile.borrow_mut() = profile,
        Err(e) => ui::warn(&format!("{e}; showing guessed paths")),
    }

    let plan = deployment.plan(&deployment.recorded_secrets());
    let diffs = compute_diffs(&plan, &FsProbe);
    let summary = DiffSummary::from_diffs(&diffs);

    ui::header("ownCloud Status");
    ui::kv("Platform", &deployment.platform.to_string());
    ui::kv("Install", &deployment.settings.app_dir().display().to_string());
    ui::kv(
        "Config",
        if deployment.settings.config_file().exists() {
            "installed"
        } else {
            "not installed"
        },
    );

    for (resource_type, group) in group_by_type(&diffs) {
        ui::section(resource_type);
        for diff in group {
            let icon = match (diff.activation, diff.satisfied) {
                (Activation::OnNotify, _) => "·".dimmed(),
                (Activation::Walk, true) => "✓".green(),
                (Activation::Walk, false) => "✗".yellow(),
            };
            println!("  {} {}", icon, diff.resource_id);
            if ctx.verbose > 0 {
                ui::dim(&format!("    {}", diff.description));
            }
        }
    }

    println!();
    if summary.is_converged() {
        ui::success("Converged");
    } else {
        ui::info(&format!(
            "{} pending, {} satisfied, {} run only when notified",
            summary.pending.to_string().yellow(),
            summary.satisfied,
            summary.on_notify
        ));
    }
    Ok(())
}
