use std::path::PathBuf;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay the event log and report consumption and the projected bill.
    #[clap(name = "report")]
    Report(ReportArgs),

    /// Project a bill for a fixed unit count.
    #[clap(name = "bill")]
    Bill(BillArgs),

    /// Print the tariff schedule.
    #[clap(name = "tariff")]
    Tariff(TariffArgs),
}

#[derive(Parser)]
pub struct ReportArgs {
    #[clap(flatten)]
    pub data: DataArgs,

    /// Pin the evaluation instant instead of reading the clock (RFC 3339).
    #[clap(long, value_parser = parse_local_datetime)]
    pub at: Option<DateTime<Local>>,

    /// Emit one JSON document instead of tables.
    #[clap(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct BillArgs {
    /// Units (kWh) consumed in the billing cycle.
    #[clap(long)]
    pub units: f64,

    /// Tariff schedule file.
    #[clap(long, env = "WATTSON_TARIFF", default_value = "tariff.toml")]
    pub tariff: PathBuf,

    /// Emit one JSON document instead of tables.
    #[clap(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct TariffArgs {
    /// Tariff schedule file.
    #[clap(long, env = "WATTSON_TARIFF", default_value = "tariff.toml")]
    pub tariff: PathBuf,
}

#[derive(Parser)]
pub struct DataArgs {
    /// Household topology file.
    #[clap(long, env = "WATTSON_HOUSEHOLD", default_value = "household.toml")]
    pub household: PathBuf,

    /// Tariff schedule file.
    #[clap(long, env = "WATTSON_TARIFF", default_value = "tariff.toml")]
    pub tariff: PathBuf,

    /// On/off event log file.
    #[clap(long, env = "WATTSON_EVENTS", default_value = "events.toml")]
    pub events: PathBuf,
}

fn parse_local_datetime(value: &str) -> Result<DateTime<Local>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Local))
}
