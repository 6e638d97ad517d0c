//! I2C Trace CLI Application
//!
//! Command-line front end for the i2c-trace-decoder library. It adds:
//! - Argument and TOML configuration handling
//! - Concurrent decoding of several trace files
//! - Text and JSON-lines output
//! - Diagnostics for malformed traces

use anyhow::Result;
use clap::Parser;
use i2c_trace_decoder::RepeatedStartPolicy;
use std::path::PathBuf;

mod config;
mod output;
mod run;

use config::{OutputFormat, Overrides};
use output::TransactionWriter;

/// I2C Trace - Reconstruct I2C transactions from logic analyzer exports
#[derive(Parser, Debug)]
#[command(name = "i2c-trace")]
#[command(about = "Decode I2C transactions for one device from CSV bus-event exports", long_about = None)]
#[command(version)]
struct Args {
    /// CSV trace export(s) to decode
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Device address to show (hex with 0x prefix, or decimal)
    #[arg(short, long, value_name = "ADDR", value_parser = parse_address_arg)]
    address: Option<u32>,

    /// Ignore transactions starting after this time (seconds)
    #[arg(short, long, value_name = "SECONDS")]
    timeout: Option<f64>,

    /// What a repeated start does to the transaction it opens
    #[arg(long, value_enum, value_name = "MODE")]
    repeated_start: Option<RepeatedStartArg>,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file for decoded transactions (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Report a failing file and continue with the next one
    #[arg(long)]
    keep_going: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RepeatedStartArg {
    /// Emit the closed transaction only
    EmitOnly,
    /// Emit the closed transaction and timestamp the next one
    Restamp,
}

impl From<RepeatedStartArg> for RepeatedStartPolicy {
    fn from(arg: RepeatedStartArg) -> Self {
        match arg {
            RepeatedStartArg::EmitOnly => RepeatedStartPolicy::EmitOnly,
            RepeatedStartArg::Restamp => RepeatedStartPolicy::EmitAndRestamp,
        }
    }
}

fn parse_address_arg(text: &str) -> std::result::Result<u32, String> {
    i2c_trace_decoder::parse_address(text).map_err(|e| format!("invalid address {:?}: {}", text, e))
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("I2C Trace CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using decoder library v{}", i2c_trace_decoder::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };

    let settings = app_config.resolve(Overrides {
        files: args.files,
        address: args.address,
        timeout: args.timeout,
        repeated_start: args.repeated_start.map(Into::into),
        format: args.format,
        output: args.output,
        keep_going: args.keep_going,
    })?;
    log::debug!("Resolved settings: {:?}", settings);

    let mut writer = TransactionWriter::create(settings.output.as_deref(), settings.format)?;
    let result = run::run(&settings, &mut writer);
    writer.finish()?;
    result
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
