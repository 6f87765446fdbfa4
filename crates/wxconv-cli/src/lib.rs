//! Command-line front end for wxconv-core
//!
//! Parsing and execution live here so the binary stays a thin shell and the
//! commands can be tested without spawning a process.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, instrument};
use wxconv_config::AppConfig;
use wxconv_core::{
    convert, Category, ConstantOffset, OffsetProvider, SystemLocal, TimeCodec, Timestamp, Unit,
};

#[derive(Debug, Parser)]
#[command(name = "wxconv")]
#[command(about = "Weather unit conversion and timestamp formatting", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a value between two units of the same category
    Convert {
        /// Source unit symbol (e.g. km/h)
        from: String,

        /// Target unit symbol (e.g. Bft)
        to: String,

        #[arg(allow_negative_numbers = true)]
        value: f64,

        /// Print a JSON object instead of the bare value
        #[arg(long)]
        json: bool,
    },

    /// Format epoch seconds as a date string
    Format {
        #[arg(allow_negative_numbers = true)]
        timestamp: Timestamp,

        /// Separate date and time with `T`
        #[arg(long)]
        iso: bool,

        /// Format in UTC and append `Z`
        #[arg(long)]
        utc: bool,
    },

    /// Parse a date string into epoch seconds
    Parse {
        #[arg(allow_hyphen_values = true)]
        text: String,

        /// Read the fields as UTC even without a trailing `Z`
        #[arg(long)]
        utc: bool,
    },

    /// List supported units, optionally for one category
    Units { category: Option<String> },
}

#[derive(Debug, Serialize)]
struct Conversion {
    from: Unit,
    to: Unit,
    value: f64,
    result: f64,
}

/// Codec honoring the configured fixed offset, or the system zone
pub fn codec(cfg: &AppConfig) -> TimeCodec<Box<dyn OffsetProvider>> {
    let provider: Box<dyn OffsetProvider> = match cfg.utc_offset() {
        Some(seconds) => Box::new(ConstantOffset::east(seconds)),
        None => Box::new(SystemLocal),
    };
    TimeCodec::new(provider)
}

/// Execute a parsed command, returning what should be printed
///
/// Flags only switch behavior on; config supplies the defaults.
#[instrument(skip(cfg))]
pub fn run(cli: &Cli, cfg: &AppConfig) -> Result<String> {
    match &cli.command {
        Command::Convert {
            from,
            to,
            value,
            json,
        } => {
            let result = convert(from, to, *value)?;
            debug!(from = %from, to = %to, value, result, "converted");
            if *json {
                let record = Conversion {
                    from: from.parse()?,
                    to: to.parse()?,
                    value: *value,
                    result,
                };
                serde_json::to_string(&record).context("failed to encode conversion")
            } else {
                Ok(format_value(result, cfg.precision()))
            }
        }
        Command::Format {
            timestamp,
            iso,
            utc,
        } => Ok(codec(cfg).timestamp_to_string(
            *timestamp,
            *iso || cfg.iso_separator(),
            *utc || cfg.utc(),
        )),
        Command::Parse { text, utc } => {
            let ts = codec(cfg).string_to_timestamp(text, *utc || cfg.utc())?;
            Ok(ts.to_string())
        }
        Command::Units { category } => {
            let categories = match category {
                Some(name) => vec![parse_category(name)?],
                None => Category::ALL.to_vec(),
            };
            Ok(categories
                .into_iter()
                .map(describe_category)
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }
}

fn parse_category(name: &str) -> Result<Category> {
    match Category::ALL.into_iter().find(|c| c.name() == name) {
        Some(category) => Ok(category),
        None => {
            let known: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
            bail!("Unknown category '{name}', expected one of: {}", known.join(", "))
        }
    }
}

fn format_value(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(places) => format!("{value:.places$}"),
        None => value.to_string(),
    }
}

fn describe_category(category: Category) -> String {
    let symbols: Vec<&str> = category.units().iter().map(|u| u.symbol()).collect();
    format!(
        "{category} (base {}): {}",
        category.base_unit(),
        symbols.join(", ")
    )
}
