use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cumulus")]
#[command(version)]
#[command(about = "Convergent ownCloud deployment for a single host", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: /etc/cumulus/cumulus.toml)
    #[arg(long, global = true, env = "CUMULUS_SETTINGS", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Require every secret to be supplied; generate and record nothing
    #[arg(long, global = true)]
    pub solo: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the host: install, configure and run the installer
    Apply,

    /// Show which resources the next apply would touch
    Status,

    /// Inspect the ownCloud config document
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show recorded credentials and install identifiers
    Credentials {
        /// Print secret values instead of masking them
        #[arg(long)]
        reveal: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the current config.php values
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preview the changes the next merge would write
    Diff,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cumulus",
            "apply",
            "--solo",
            "-vv",
            "--settings",
            "/tmp/cumulus.toml",
        ])
        .unwrap();
        assert!(cli.solo);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/cumulus.toml")));
        assert!(matches!(cli.command, Command::Apply));
    }

    #[test]
    fn test_config_show_json() {
        let cli = Cli::try_parse_from(["cumulus", "config", "show", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Show { json: true })
        ));
    }
}
