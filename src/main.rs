#![doc = include_str!("../README.md")]

mod cli;
mod config;
mod core;
mod fmt;
mod prelude;
mod quantity;
mod store;
mod tables;

use chrono::Local;
use clap::Parser;
use serde_json::json;

use crate::{
    cli::{Args, BillArgs, Command, ReportArgs, TariffArgs},
    config::{EventLog, Household, TariffSchedule},
    core::{
        billing::compute_bill,
        consumption::{summarize, top_consumers},
    },
    prelude::*,
    quantity::energy::KilowattHours,
    store::SlabStore,
    tables::{build_bill_table, build_consumers_table, build_summary_table, build_tariff_table},
};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();

    match Args::parse().command {
        Command::Report(args) => report(args),
        Command::Bill(args) => bill(args),
        Command::Tariff(args) => tariff(args),
    }
}

fn report(args: ReportArgs) -> Result {
    let household = Household::from_path(&args.data.household)?;
    let schedule = TariffSchedule::from_path(&args.data.tariff)?;
    let events = EventLog::from_path(&args.data.events)?;
    let home_id = household.home.id.clone();
    info!(home = %household.home.name, n_events = events.events.len(), "replaying the event log");

    let mut store = household.into_store(schedule.slabs);
    for event in &events.events {
        store.toggle(&event.device_id, event.on, event.at)?;
    }

    // One clock read pinned through the whole aggregation pass.
    let now = args.at.unwrap_or_else(Local::now);
    // Anchor the replayed cycle at the first recorded event.
    let cycle_anchor = events.events.first().map_or(now, |event| event.at);
    let cycle = store.ensure_active_cycle(cycle_anchor);

    let summary = summarize(&store, &home_id, now)?;
    let consumers = top_consumers(&store, &home_id, cycle.start, now)?;
    let projection = compute_bill(summary.cycle, &store.list_active_slabs()?);

    if args.json {
        let document = json!({
            "summary": summary,
            "top_consumers": consumers,
            "bill": projection,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    println!("{}", build_summary_table(&summary));
    println!("{}", build_consumers_table(&consumers));
    println!("{}", build_bill_table(&projection));
    if let Some(warning) = &projection.warning {
        warn!(
            units_to_next_slab = %warning.units_to_next_slab,
            next_slab_rate = %warning.next_slab_rate,
            current_rate = %warning.current_rate,
            "approaching the next slab",
        );
    }
    Ok(())
}

fn bill(args: BillArgs) -> Result {
    let schedule = TariffSchedule::from_path(&args.tariff)?;
    let projection = compute_bill(KilowattHours(args.units), &schedule.slabs);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&projection)?);
        return Ok(());
    }

    println!("{}", build_bill_table(&projection));
    info!(slab = %projection.slab, total = %projection.total_bill, "projected");
    if let Some(diagnostic) = projection.diagnostic {
        warn!(?diagnostic, "the projection is degraded");
    }
    Ok(())
}

fn tariff(args: TariffArgs) -> Result {
    let schedule = TariffSchedule::from_path(&args.tariff)?;
    println!("{}", build_tariff_table(&schedule.slabs));
    Ok(())
}
