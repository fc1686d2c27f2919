use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use phpconf::{ConfigDocument, GENERATED_KEYS, MergePolicy, Value};
use similar::{ChangeTag, TextDiff};

use crate::Context;
use crate::resource::ApplyConfig;
use crate::ui;

/// Keys whose values are never printed in full
fn is_secret(key: &str) -> bool {
    key == "dbpassword" || GENERATED_KEYS.contains(&key)
}

/// Copy of `doc` with secret values masked
fn masked(doc: &ConfigDocument) -> ConfigDocument {
    let mut out = doc.clone();
    for (key, value) in doc.entries.iter() {
        if let (Some(name), Some(secret)) = (key.as_str(), value.as_str())
            && is_secret(name)
        {
            out.set(key.clone(), ui::mask(secret));
        }
    }
    out
}

pub fn show(ctx: &Context, json: bool) -> Result<()> {
    let deployment = super::load_deployment(ctx)?;
    let store = deployment.config_store();

    let Some(doc) = store.load_optional()? else {
        ui::warn(&format!(
            "{} does not exist yet; run `cumulus apply` first",
            store.path().display()
        ));
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&doc.entries)?);
    } else {
        ui::header(&store.path().display().to_string());
        print!("{}", phpconf::serialize(&masked(&doc)));
    }
    Ok(())
}

pub fn diff(ctx: &Context) -> Result<()> {
    let deployment = super::load_deployment(ctx)?;
    let store = deployment.config_store();

    let Some(doc) = store.load_optional()? else {
        ui::info("No config.php yet; the installer writes it on the first apply");
        return Ok(());
    };

    let apply = ApplyConfig::new(
        store.clone(),
        deployment.desired_config(&deployment.recorded_secrets()),
        &deployment.node,
        &deployment.host.ownership,
    );
    let (merged, report) =
        phpconf::merge(&doc, &apply.desired_for(&doc), &MergePolicy::default());

    if report.is_noop() {
        ui::success("config.php matches the settings");
        return Ok(());
    }

    let before = phpconf::serialize(&masked(&doc));
    let after = phpconf::serialize(&masked(&merged));
    ui::header(&format!("{} (pending)", store.path().display()));
    for change in TextDiff::from_lines(&before, &after).iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => print!("{}", format!("- {change}").red()),
            ChangeTag::Insert => print!("{}", format!("+ {change}").green()),
            ChangeTag::Equal if ctx.verbose > 0 => print!("  {}", change.to_string().dimmed()),
            ChangeTag::Equal => {}
        }
    }

    println!();
    ui::kv("Set", &report.set.len().to_string());
    ui::kv("Added", &report.added.len().to_string());
    if !report.kept_generated.is_empty() {
        ui::kv("Kept generated", &report.kept_generated.join(", "));
    }
    Ok(())
}
