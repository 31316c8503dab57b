use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::runner::RunMode;

#[derive(Parser, Debug)]
#[command(
    name = "coldmail",
    version,
    about = "Paced, resumable batch sender for AI-personalized outreach email"
)]
pub struct Cli {
    /// Path to the config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "COLDMAIL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send to every contact not yet in the sent log
    Run {
        /// Send a single sample email to the configured test address
        #[arg(long, conflicts_with = "resume")]
        test: bool,

        /// Show how many contacts remain before prompting
        #[arg(long)]
        resume: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        auto: bool,
    },
    /// Store the SMTP app password and AI API key
    Setup,
    /// Validate the config, report credential storage and test the SMTP login
    Check,
}

/// Mode selected by the `run` flags; `--test` and `--resume` are exclusive
pub fn run_mode(test: bool, resume: bool) -> RunMode {
    if test {
        RunMode::Test
    } else if resume {
        RunMode::Resume
    } else {
        RunMode::Default
    }
}
