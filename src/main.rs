mod cli;
mod commands;
mod credentials;
mod platform;
mod progress;
mod recipe;
mod resource;
mod runner;
mod settings;
mod state;
mod system;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ConfigCommand};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub settings: Option<PathBuf>,
    pub solo: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        settings: cli.settings,
        solo: cli.solo,
    };

    match cli.command {
        Command::Apply => commands::apply::run(&ctx),
        Command::Status => commands::status::run(&ctx),
        Command::Config(ConfigCommand::Show { json }) => commands::config::show(&ctx, json),
        Command::Config(ConfigCommand::Diff) => commands::config::diff(&ctx),
        Command::Credentials { reveal } => commands::credentials::run(&ctx, reveal),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "cumulus", &mut io::stdout());
            Ok(())
        }
    }
}
