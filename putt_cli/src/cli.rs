//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "putt", version, about = "Robotic putting course controller")]
pub struct Cli {
    /// Path to config TOML (missing file means defaults)
    #[arg(long, value_name = "FILE", default_value = "etc/putt_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Which request body `decode` should parse.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PayloadKind {
    /// Mode byte followed by 45 positions
    Course,
    /// One byte, balls to dispense
    Dispense,
    /// One byte, auto-dispense on/off
    Settings,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the simulated course
    Run {
        /// Stop after this many milliseconds (default: until Ctrl-C)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Send a course state with every actuator at POS
        #[arg(long, value_name = "POS")]
        fill: Option<u8>,
        /// Start a clear sweep
        #[arg(long, action = ArgAction::SetTrue)]
        clear: bool,
        /// Turn on auto-dispense
        #[arg(long, action = ArgAction::SetTrue)]
        auto_dispense: bool,
        /// Simulate this many putts (alternating holed and missed)
        #[arg(long, value_name = "N", default_value_t = 0)]
        putts: u32,
        /// Print task tick and overrun counters
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Validate config, build the rollout plan and bring up the simulated chips
    SelfCheck,
    /// Decode a request body given as hex
    Decode {
        /// Payload bytes, e.g. "00 5a 5a ..." or "005a5a..."
        #[arg(long, value_name = "BYTES")]
        hex: String,
        #[arg(long, value_enum, default_value = "course")]
        kind: PayloadKind,
    },
}
