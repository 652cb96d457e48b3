use clap::{Parser, Subcommand};

use crate::models::Role;

/// TB care coordinator CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "tb-care-coordinator",
    version,
    about = "TB patient-care coordination backend with treatment-lapse monitoring"
)]
pub struct Cli {
    /// SQLite database URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Address to bind the HTTP server to
    #[arg(long, global = true)]
    pub bind: Option<String>,

    /// Lapse sweep interval in seconds
    #[arg(long, global = true)]
    pub sweep_interval: Option<u64>,

    /// Hours without a reported intake before the treatment clock restarts
    #[arg(long, global = true)]
    pub grace_hours: Option<i64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP API and the periodic lapse sweep (default)
    Serve,
    /// Run one lapse sweep and exit (0 on success, 1 on failure)
    Sweep,
    /// Create an account, e.g. the first admin of a fresh database
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Read from TB_CARE_PASSWORD when omitted
        #[arg(long, env = "TB_CARE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "admin")]
        role: Role,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
