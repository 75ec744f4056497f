use std::path::PathBuf;

use clap::Parser;

use crate::output::OutputFormat;

/// Load a RISC-V application image into an rvpk machine and run it.
#[derive(Parser, Debug)]
#[command(name = "rvpk-run", version, about)]
pub struct Cli {
    /// Path to the statically linked ELF64 application.
    pub app: PathBuf,

    /// Arguments handed to the application after its name.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub app_args: Vec<String>,

    /// Minimum level of kernel log lines written to stderr.
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Shorthand for `--log-level debug`.
    #[arg(short, long)]
    pub verbose: bool,

    /// Resolve an address (hex with `0x`, or decimal) through the loaded symbol table.
    #[arg(long = "resolve", value_name = "ADDR", value_parser = parse_addr)]
    pub resolve: Vec<u64>,

    /// Load and report the image without scheduling it.
    #[arg(long)]
    pub no_run: bool,

    /// Output format for the run summary.
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,
}

impl Cli {
    /// Effective log filter after `-v` is applied.
    pub fn level_filter(&self) -> log::LevelFilter {
        if self.verbose {
            self.log_level.to_filter().max(log::LevelFilter::Debug)
        } else {
            self.log_level.to_filter()
        }
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Parse `0x`-prefixed hex or plain decimal.
pub fn parse_addr(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}
