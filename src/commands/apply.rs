use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{FsProbe, RunOptions, RunSummary, converge};

use crate::Context;
use crate::progress::RunProgress;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let deployment = super::load_deployment(ctx)?;

    // Missing secrets stop the run before anything on the host is touched
    let secrets = deployment
        .secrets()
        .context("Cannot start the run; supply the secret in the settings file")?;

    if !ctx.quiet {
        ui::header(&format!("Converging ownCloud on {}", deployment.platform));
    }

    let plan = deployment.plan(&secrets);
    let opts = RunOptions {
        verbose: ctx.verbose > 0,
        ..RunOptions::default()
    };
    let mut progress = RunProgress::new(ctx.quiet, ctx.verbose > 0);

    let summary = match converge(&plan, &opts, &FsProbe, &mut progress) {
        Ok(summary) => summary,
        Err(e) => {
            progress.abandon();
            let id = e.resource_id().to_string();
            return Err(e).with_context(|| format!("Run halted at {id}"));
        }
    };

    if !ctx.quiet {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.is_converged() {
        ui::success("Host already converged, nothing to do");
    } else {
        ui::success(&format!(
            "{} {} changed",
            summary.total_changes().to_string().bold(),
            if summary.total_changes() == 1 {
                "resource"
            } else {
                "resources"
            }
        ));
    }

    ui::kv("Executed", &summary.total().to_string());
    ui::kv("Unchanged", &summary.unchanged.to_string());
    if summary.notified > 0 {
        ui::kv("Notified", &summary.notified.to_string());
    }
    if summary.degraded > 0 {
        ui::warn(&format!(
            "{} best-effort {} failed; see the log with -v",
            summary.degraded,
            if summary.degraded == 1 { "step" } else { "steps" }
        ));
    }
}
