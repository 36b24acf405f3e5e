use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for twicon
#[derive(Parser, Debug)]
#[command(
    name = "twicon",
    version = env!("CARGO_PKG_VERSION"),
    about = "TWI (I2C) bootloader operator console",
    long_about = "Interactive operator console for a single I2C-attached microcontroller \
                  running a Timonel-style bootloader or a user application: discover the \
                  device, decode its status, upload or erase firmware, and drive the \
                  running application."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format for non-interactive commands
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Use the built-in simulated device instead of hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Scans the simulated device ignores before it appears on the bus
    #[arg(long, default_value = "0", global = true)]
    pub sim_boot_scans: u32,

    /// Command to execute (defaults to the interactive console)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive operator console
    Console(ConsoleArgs),
    /// Scan the bus once and report the responding device
    Scan,
    /// Fetch and decode the device status once
    Status,
    /// Display version information
    Version,
}

/// Interactive console arguments
#[derive(ClapArgs, Debug, Default)]
pub struct ConsoleArgs {
    /// Firmware payload file for the write-flash command (raw binary,
    /// or hex text when the extension is .hex)
    #[arg(short, long)]
    pub payload: Option<String>,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Text
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
