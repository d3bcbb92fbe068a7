use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        billing::{BillProjection, TariffSlab},
        consumption::{ConsumptionSummary, TopConsumer},
    },
    fmt::FormattedPercentage,
    quantity::time::Hours,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

#[must_use]
pub fn build_tariff_table(slabs: &[TariffSlab]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Slab", "Rate", "Fixed charge", "Subsidy", "Active"]);
    for slab in slabs {
        table.add_row(vec![
            Cell::new(slab.label()),
            Cell::new(slab.rate_per_unit).set_alignment(CellAlignment::Right),
            Cell::new(slab.fixed_charge).set_alignment(CellAlignment::Right),
            Cell::new(slab.subsidy_percentage).set_alignment(CellAlignment::Right),
            Cell::new(slab.active).fg(if slab.active { Color::Green } else { Color::Red }),
        ]);
    }
    table
}

#[must_use]
pub fn build_bill_table(projection: &BillProjection) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        Cell::from("Slab").add_attribute(Attribute::Bold),
        Cell::from("Units"),
        Cell::from("Rate"),
        Cell::from("Gross"),
        Cell::from("Subsidy"),
        Cell::from("Net"),
    ]);
    for entry in &projection.breakdown {
        table.add_row(vec![
            Cell::new(&entry.slab),
            Cell::new(entry.units.round_to_watt_hours()).set_alignment(CellAlignment::Right),
            Cell::new(entry.rate).set_alignment(CellAlignment::Right),
            Cell::new(entry.gross_cost.round_to_paise()).set_alignment(CellAlignment::Right),
            Cell::new(entry.subsidy.round_to_paise())
                .set_alignment(CellAlignment::Right)
                .fg(Color::Green),
            Cell::new(entry.net_cost.round_to_paise()).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(projection.total_units.round_to_watt_hours())
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(projection.total_subsidy).set_alignment(CellAlignment::Right).fg(Color::Green),
        Cell::new(projection.total_bill)
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
    ]);
    table
}

#[must_use]
pub fn build_summary_table(summary: &ConsumptionSummary) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        Cell::from("Live load").add_attribute(Attribute::Bold),
        Cell::from("On"),
        Cell::from("Today"),
        Cell::from("This cycle"),
        Cell::from("Estimated reading"),
        Cell::from("Days left"),
    ]);
    table.add_row(vec![
        Cell::new(summary.live_load).add_attribute(Attribute::Bold),
        Cell::new(summary.active_devices),
        Cell::new(summary.today.round_to_watt_hours()).set_alignment(CellAlignment::Right),
        Cell::new(summary.cycle.round_to_watt_hours()).set_alignment(CellAlignment::Right),
        Cell::new(summary.estimated_reading.round_to_watt_hours())
            .set_alignment(CellAlignment::Right),
        Cell::new(summary.days_remaining).set_alignment(CellAlignment::Right),
    ]);
    table
}

#[must_use]
pub fn build_consumers_table(consumers: &[TopConsumer]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Device", "Room", "On time", "Energy", "Cost", "Share"]);
    for consumer in consumers {
        table.add_row(vec![
            Cell::new(&consumer.name).fg(if consumer.is_on { Color::Green } else { Color::Reset }),
            Cell::new(&consumer.room),
            Cell::new(Hours::from(consumer.on_time)).set_alignment(CellAlignment::Right),
            Cell::new(consumer.energy.round_to_watt_hours()).set_alignment(CellAlignment::Right),
            Cell::new(consumer.estimated_cost).set_alignment(CellAlignment::Right),
            Cell::new(FormattedPercentage(consumer.share.0)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
