//! Clap derive structures for the `gatewatch` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gatewatch_core::SubTrigger;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// gatewatch -- supervise a backup gateway and raise power-flow triggers
#[derive(Debug, Parser)]
#[command(
    name = "gatewatch",
    version,
    about = "Watch a backup gateway's local API and raise power-flow triggers",
    long_about = "Connects to a Powerwall-style backup gateway over its local HTTPS API,\n\
        polls site telemetry every two seconds, and fires subscriptions when the\n\
        battery, solar or grid power flow changes direction.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file to use instead of the default location
    #[arg(long, env = "GATEWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Gateway address (overrides the config file)
    #[arg(long, short = 'a', global = true)]
    pub address: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "GATEWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Supervise the gateway until interrupted
    Run(RunArgs),

    /// Query the gateway once and print what it reports
    Status,

    /// List the power-flow sub-triggers and configured subscriptions
    #[command(alias = "tr")]
    Triggers,

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Print every telemetry snapshot, not only band changes
    #[arg(long)]
    pub watch: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (password redacted)
    Show,

    /// Print the config file location
    Path,

    /// Set a gateway setting
    Set {
        key: ConfigKey,
        value: String,
    },

    /// Store the gateway password in the system keyring
    SetPassword {
        /// Write the password into the config file instead
        #[arg(long)]
        plaintext: bool,
    },

    /// Subscribe a named event to a sub-trigger
    Subscribe {
        trigger: SubTrigger,
        name: String,
    },

    /// Remove every subscription with this name
    Unsubscribe { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    Address,
    Port,
    Email,
    PasswordEnv,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subscribe_parses_kebab_case_triggers() {
        let cli = Cli::try_parse_from([
            "gatewatch",
            "config",
            "subscribe",
            "grid-exporting",
            "Pool pump on",
        ])
        .expect("valid arguments");
        match cli.command {
            Command::Config(ConfigArgs {
                command: ConfigCommand::Subscribe { trigger, name },
            }) => {
                assert_eq!(trigger, SubTrigger::GridExporting);
                assert_eq!(name, "Pool pump on");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
