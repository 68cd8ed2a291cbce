pub mod commands;

use clap::{Parser, Subcommand};

use crate::error::Result;

#[derive(Parser)]
#[command(name = "keytrace")]
#[command(version)]
#[command(about = "Identify which authorized SSH key authenticated a session")]
#[command(
    long_about = "Correlates the authorized_keys registry with auth-log and environment\nevidence to name the key behind an incoming SSH session. Built for\nforced-command wrappers and session hooks, which see the connection but\nnot the key."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the authorized_keys registry
    #[arg(
        long,
        global = true,
        env = "KEYTRACE_AUTHORIZED_KEYS",
        default_value = "~/.ssh/authorized_keys"
    )]
    pub authorized_keys: String,

    /// Path to the sshd auth log
    #[arg(
        long,
        global = true,
        env = "KEYTRACE_AUTH_LOG",
        default_value = "/var/log/auth.log"
    )]
    pub auth_log: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the current SSH connection info as JSON
    Info,

    /// Look up a registry entry by MD5-colon fingerprint
    FindKey {
        /// Fingerprint to look up (e.g. aa:bb:cc:...)
        fingerprint: String,
    },

    /// Extract connection evidence for an (IP, user) pair from the auth log
    ParseAuthLog {
        /// Source IP address of the session
        ip: String,

        /// Target username of the session
        username: String,

        /// Log lines to examine, counted from the end
        #[arg(short = 'n', long, default_value = "1000")]
        lines: usize,
    },

    /// Run the full correlation chain and print the matched key entry
    Resolve {
        /// Source IP address of the session
        ip: String,

        /// Target username of the session
        username: String,
    },
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let registry_path = shellexpand::tilde(&self.authorized_keys).into_owned();
        let log_path = shellexpand::tilde(&self.auth_log).into_owned();

        match self.command {
            Commands::Info => commands::info::execute(),
            Commands::FindKey { fingerprint } => {
                commands::find_key::execute(&registry_path, &fingerprint)
            }
            Commands::ParseAuthLog {
                ip,
                username,
                lines,
            } => commands::parse_auth_log::execute(&log_path, &ip, &username, lines),
            Commands::Resolve { ip, username } => {
                commands::resolve::execute(&registry_path, &log_path, &ip, &username)
            }
        }
    }
}
