use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::credentials::{ADMIN_PASSWORD, DB_PASSWORD, INSTANCE_ID, PASSWORD_SALT};
use crate::ui;

pub fn run(ctx: &Context, reveal: bool) -> Result<()> {
    let deployment = super::load_deployment(ctx)?;
    let credentials = deployment.credentials();
    let show = |value: &str| {
        if reveal {
            value.to_string()
        } else {
            ui::mask(value)
        }
    };

    ui::header("Credentials");
    for name in [DB_PASSWORD, ADMIN_PASSWORD] {
        match credentials.peek(name) {
            Some(credential) => println!(
                "  {} {} {}",
                name.bold(),
                show(&credential.value),
                format!("({})", credential.origin).dimmed()
            ),
            None => println!("  {} {}", name.bold(), "not yet generated".yellow()),
        }
    }

    ui::section("Install identifiers");
    let node = deployment.node.borrow();
    for name in [PASSWORD_SALT, INSTANCE_ID] {
        match node.get(name) {
            Some(value) => println!("  {} {}", name.bold(), show(&value)),
            None => println!("  {} {}", name.bold(), "not yet recorded".dimmed()),
        }
    }

    if deployment.settings.owncloud.solo {
        println!();
        ui::info("Solo mode: nothing is generated or recorded");
    }
    Ok(())
}
