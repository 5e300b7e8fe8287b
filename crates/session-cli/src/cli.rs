use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "session-cli", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding saved session records (overrides the config file)
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a simulated media item, resuming from its saved position.
    /// Ctrl-C backgrounds the session so the next run resumes where it stopped.
    Play {
        /// Session id
        id: String,

        /// Select the track with this name once tracks are reported
        #[arg(long)]
        select: Option<String>,

        /// Background the session after this many seconds instead of playing to the end
        #[arg(long)]
        stop_after_secs: Option<u64>,

        /// Status line interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        status_ms: u64,
    },

    /// Show saved state for one session, or list every saved session
    Inspect {
        /// Session id
        id: Option<String>,
    },

    /// Close a session and forget its saved state
    Release {
        /// Session id
        id: String,
    },
}
