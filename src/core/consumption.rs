use std::cmp::Reverse;

use chrono::{DateTime, Local, TimeDelta};
use itertools::Itertools;
use serde::Serialize;
use serde_with::{DurationSeconds, serde_as};

use crate::{
    core::{
        usage::{DeviceId, IntervalState, accumulated_energy},
        window::Window,
    },
    prelude::*,
    quantity::{
        energy::KilowattHours,
        money::{Rupees, UnitRate},
        power::Watts,
        ratios::Percentage,
    },
    store::{CycleStore, IntervalStore, MeterReading, ReadingStore, TopologyStore},
};

/// Flat advisory rate for per-device cost attribution: the slab schedule
/// prices the home as a whole and cannot be apportioned to a single device.
const ADVISORY_RATE: UnitRate = UnitRate(5.0);

/// Total energy of the home within the window: `accumulated_energy` summed
/// over every device, all against the same pinned `window.end`.
pub fn home_energy<S>(store: &S, home_id: &str, window: Window) -> Result<KilowattHours>
where
    S: TopologyStore + IntervalStore,
{
    let mut total = KilowattHours::zero();
    for device in store.list_devices(home_id)? {
        let intervals = store.list_intervals(&device.id, window.start)?;
        total += accumulated_energy(device.wattage, &intervals, window);
    }
    Ok(total)
}

/// The dashboard numbers for one home, reconstructed at one instant.
#[derive(Clone, Debug, Serialize)]
#[must_use]
pub struct ConsumptionSummary {
    /// Aggregate wattage of the devices that are currently on.
    pub live_load: Watts,
    pub active_devices: usize,

    /// Since local midnight.
    pub today: KilowattHours,

    /// Since the active billing cycle started.
    pub cycle: KilowattHours,

    /// Since the most recent manual meter reading (cycle start if none).
    pub since_last_reading: KilowattHours,
    pub last_reading: Option<MeterReading>,

    /// What the meter should display now: the last submitted value plus the
    /// reconstructed usage since.
    pub estimated_reading: KilowattHours,

    pub cycle_start: DateTime<Local>,
    pub cycle_end: DateTime<Local>,
    pub days_remaining: i64,
}

/// Reconstruct the consumption summary for a home.
///
/// `now` is read once by the caller and pinned through every window here;
/// mixing clock reads across devices would skew the totals against each
/// other.
pub fn summarize<S>(store: &S, home_id: &str, now: DateTime<Local>) -> Result<ConsumptionSummary>
where
    S: TopologyStore + IntervalStore + ReadingStore + CycleStore,
{
    let devices = store.list_devices(home_id)?;
    let live_load = devices.iter().filter(|device| device.is_on).map(|device| device.wattage).sum();
    let active_devices = devices.iter().filter(|device| device.is_on).count();

    let (cycle_start, cycle_end) = match store.active_cycle(home_id)? {
        Some(cycle) => (cycle.start, cycle.end),
        None => (now, now + TimeDelta::days(60)),
    };
    let last_reading = store.last_reading(home_id)?;
    let reading_time = last_reading.as_ref().map_or(cycle_start, |reading| reading.recorded_at);

    let today = home_energy(store, home_id, Window::today(now))?;
    let cycle = home_energy(store, home_id, Window::new(cycle_start, now))?;
    let since_last_reading = home_energy(store, home_id, Window::new(reading_time, now))?;
    let estimated_reading =
        last_reading.as_ref().map_or_else(KilowattHours::zero, |reading| reading.value)
            + since_last_reading;

    info!(
        home_id,
        live_load = %live_load,
        today = %today,
        cycle = %cycle,
        "reconstructed consumption",
    );

    Ok(ConsumptionSummary {
        live_load,
        active_devices,
        today,
        cycle,
        since_last_reading,
        last_reading,
        estimated_reading,
        cycle_start,
        cycle_end,
        days_remaining: days_remaining(now, cycle_end),
    })
}

#[expect(clippy::cast_possible_truncation)]
fn days_remaining(now: DateTime<Local>, cycle_end: DateTime<Local>) -> i64 {
    ((cycle_end - now).as_seconds_f64() / 86_400.0).ceil() as i64
}

/// One row of the per-device consumption ranking.
#[serde_as]
#[derive(Clone, Debug, Serialize)]
pub struct TopConsumer {
    pub device_id: DeviceId,
    pub name: String,
    pub room: String,
    pub wattage: Watts,
    pub is_on: bool,

    /// Cycle energy: closed sessions plus the live share of an open one.
    pub energy: KilowattHours,

    #[serde_as(as = "DurationSeconds<i64>")]
    pub on_time: TimeDelta,

    /// At the flat advisory rate, not the slab schedule.
    pub estimated_cost: Rupees,

    /// Share of the ranked devices' total.
    pub share: Percentage,
}

/// Rank devices by their consumption within the cycle so far.
///
/// Devices that consumed nothing and are off are dropped; the ranking keeps
/// the top ten and attributes shares within that set.
pub fn top_consumers<S>(
    store: &S,
    home_id: &str,
    cycle_start: DateTime<Local>,
    now: DateTime<Local>,
) -> Result<Vec<TopConsumer>>
where
    S: TopologyStore + IntervalStore,
{
    let window = Window::new(cycle_start, now);
    let mut consumers = Vec::new();
    for device in store.list_devices(home_id)? {
        let intervals = store.list_intervals(&device.id, window.start)?;
        let energy = accumulated_energy(device.wattage, &intervals, window);
        let on_time = intervals.iter().fold(TimeDelta::zero(), |total, interval| {
            total
                + match interval.state {
                    IntervalState::Closed { duration, .. } => {
                        if window.contains(interval.started_at) { duration } else { TimeDelta::zero() }
                    }
                    IntervalState::Open => {
                        (window.end - interval.started_at.max(window.start)).max(TimeDelta::zero())
                    }
                }
        });
        consumers.push(TopConsumer {
            device_id: device.id,
            name: device.name,
            room: device.room,
            wattage: device.wattage,
            is_on: device.is_on,
            energy,
            on_time,
            estimated_cost: (energy * ADVISORY_RATE).round_to_paise(),
            share: Percentage::zero(),
        });
    }

    let mut ranked = consumers
        .into_iter()
        .filter(|consumer| consumer.energy > KilowattHours::zero() || consumer.is_on)
        .sorted_by_key(|consumer| Reverse(consumer.energy))
        .take(10)
        .collect_vec();

    let total: KilowattHours = ranked.iter().map(|consumer| consumer.energy).sum();
    if total > KilowattHours::zero() {
        for consumer in &mut ranked {
            consumer.share = Percentage(consumer.energy.0 / total.0 * 100.0);
        }
    }
    Ok(ranked)
}

/// Deviation of a manual meter reading from the reconstructed cycle usage.
pub fn reading_variance(reading: KilowattHours, cycle_usage: KilowattHours) -> Percentage {
    if cycle_usage > KilowattHours::zero() {
        Percentage((reading - cycle_usage).0 / cycle_usage.0 * 100.0)
    } else {
        Percentage::zero()
    }
}
