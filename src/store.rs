pub mod memory;

use bon::Builder;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{
    core::{
        billing::TariffSlab,
        usage::{DeviceId, UsageInterval},
    },
    prelude::*,
    quantity::{energy::KilowattHours, power::Watts, ratios::Percentage},
};

/// A household device as the topology store serves it.
#[derive(Builder, Clone, Debug)]
#[must_use]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub room: String,

    /// Rated power draw. Read at reconstruction time, not stored per session.
    pub wattage: Watts,

    #[builder(default)]
    pub is_on: bool,
}

/// A manual meter reading submitted by the household.
#[derive(Builder, Clone, Debug, Serialize)]
pub struct MeterReading {
    pub home_id: String,
    pub value: KilowattHours,
    pub recorded_at: DateTime<Local>,

    /// Deviation of the submitted value from the reconstructed cycle usage.
    pub variance: Option<Percentage>,
}

/// The billing period a projection is made for.
#[derive(Builder, Clone, Debug, Serialize)]
pub struct BillingCycle {
    pub home_id: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

/// Usage session log. Whoever implements this owns the at-most-one-open
/// invariant: a single-writer toggle per device, never two open sessions.
pub trait IntervalStore {
    /// Closed sessions started on/after `since`, plus the open session (if
    /// any) regardless of when it started — the reconstructor clips it.
    fn list_intervals(&self, device_id: &str, since: DateTime<Local>) -> Result<Vec<UsageInterval>>;
}

pub trait TopologyStore {
    fn list_devices(&self, home_id: &str) -> Result<Vec<Device>>;
}

pub trait SlabStore {
    /// Active slabs, ascending by `min_units`.
    fn list_active_slabs(&self) -> Result<Vec<TariffSlab>>;
}

pub trait ReadingStore {
    fn last_reading(&self, home_id: &str) -> Result<Option<MeterReading>>;
}

pub trait CycleStore {
    fn active_cycle(&self, home_id: &str) -> Result<Option<BillingCycle>>;
}
