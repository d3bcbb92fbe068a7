use std::collections::HashMap;

use chrono::{DateTime, Local, TimeDelta};
use itertools::Itertools;

use crate::{
    core::{
        billing::TariffSlab,
        consumption::reading_variance,
        usage::{DeviceId, UsageInterval},
    },
    prelude::*,
    quantity::energy::KilowattHours,
    store::{
        BillingCycle,
        CycleStore,
        Device,
        IntervalStore,
        MeterReading,
        ReadingStore,
        SlabStore,
        TopologyStore,
    },
};

/// Single-home, in-process store backing the CLI and the tests.
///
/// [`Self::toggle`] is the only writer of the usage log, which is what keeps
/// the at-most-one-open-session invariant.
#[must_use]
pub struct MemoryStore {
    home_id: String,
    devices: Vec<Device>,
    intervals: HashMap<DeviceId, Vec<UsageInterval>>,
    slabs: Vec<TariffSlab>,
    readings: Vec<MeterReading>,
    cycle: Option<BillingCycle>,
}

impl MemoryStore {
    pub fn new(home_id: impl Into<String>, devices: Vec<Device>, slabs: Vec<TariffSlab>) -> Self {
        Self {
            home_id: home_id.into(),
            devices,
            intervals: HashMap::new(),
            slabs,
            readings: Vec::new(),
            cycle: None,
        }
    }

    /// Flip a device on or off, opening or closing its usage session.
    ///
    /// Toggling an already-on device on (or an off device off) is a logged
    /// no-op, never a second open session.
    pub fn toggle(&mut self, device_id: &str, on: bool, at: DateTime<Local>) -> Result {
        if on {
            self.open_interval(device_id, at)
        } else {
            self.close_open_interval(device_id, at).map(drop)
        }
    }

    /// Open a usage session for the device, marking it on.
    ///
    /// Refuses to open a second session: this method is the owner of the
    /// at-most-one-open invariant.
    pub fn open_interval(&mut self, device_id: &str, at: DateTime<Local>) -> Result {
        let device = self
            .devices
            .iter_mut()
            .find(|device| device.id == device_id)
            .with_context(|| format!("unknown device {device_id:?}"))?;
        let log = self.intervals.entry(device_id.to_string()).or_default();

        if log.iter().any(UsageInterval::is_open) {
            warn!(device_id, "device is already on, ignoring the toggle");
            return Ok(());
        }
        log.push(UsageInterval::open(device_id.to_string(), at));
        device.is_on = true;
        debug!(device_id, at = %at, "session opened");
        Ok(())
    }

    /// Close the device's open usage session, marking it off.
    ///
    /// Returns the closed session, or `None` when the device was already off.
    pub fn close_open_interval(
        &mut self,
        device_id: &str,
        at: DateTime<Local>,
    ) -> Result<Option<UsageInterval>> {
        let device = self
            .devices
            .iter_mut()
            .find(|device| device.id == device_id)
            .with_context(|| format!("unknown device {device_id:?}"))?;
        let log = self.intervals.entry(device_id.to_string()).or_default();

        device.is_on = false;
        match log.iter_mut().find(|interval| interval.is_open()) {
            Some(open) => {
                open.close(at, device.wattage);
                debug!(device_id, at = %at, "session closed");
                Ok(Some(open.clone()))
            }
            None => {
                warn!(device_id, "device is already off, ignoring the toggle");
                Ok(None)
            }
        }
    }

    /// Record a manual meter reading, annotated with its variance against the
    /// reconstructed cycle usage.
    pub fn submit_reading(
        &mut self,
        value: KilowattHours,
        at: DateTime<Local>,
        cycle_usage: KilowattHours,
    ) -> MeterReading {
        let reading = MeterReading {
            home_id: self.home_id.clone(),
            value,
            recorded_at: at,
            variance: Some(reading_variance(value, cycle_usage)),
        };
        self.readings.push(reading.clone());
        reading
    }

    /// The active billing cycle, opening a default 60-day one when none
    /// exists. Cycle policy lives here, not in the core.
    pub fn ensure_active_cycle(&mut self, now: DateTime<Local>) -> BillingCycle {
        self.cycle
            .get_or_insert_with(|| {
                info!(home_id = %self.home_id, "opening a new billing cycle");
                BillingCycle {
                    home_id: self.home_id.clone(),
                    start: now,
                    // Bi-monthly billing, the way the utility reads meters.
                    end: now + TimeDelta::days(60),
                }
            })
            .clone()
    }
}

impl IntervalStore for MemoryStore {
    fn list_intervals(&self, device_id: &str, since: DateTime<Local>) -> Result<Vec<UsageInterval>> {
        Ok(self
            .intervals
            .get(device_id)
            .map(|log| {
                log.iter()
                    .filter(|interval| interval.is_open() || interval.started_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl TopologyStore for MemoryStore {
    fn list_devices(&self, home_id: &str) -> Result<Vec<Device>> {
        if home_id == self.home_id {
            Ok(self.devices.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

impl SlabStore for MemoryStore {
    fn list_active_slabs(&self) -> Result<Vec<TariffSlab>> {
        Ok(self
            .slabs
            .iter()
            .filter(|slab| slab.active)
            .sorted_by_key(|slab| slab.min_units)
            .cloned()
            .collect())
    }
}

impl ReadingStore for MemoryStore {
    fn last_reading(&self, home_id: &str) -> Result<Option<MeterReading>> {
        if home_id != self.home_id {
            return Ok(None);
        }
        Ok(self.readings.iter().max_by_key(|reading| reading.recorded_at).cloned())
    }
}

impl CycleStore for MemoryStore {
    fn active_cycle(&self, home_id: &str) -> Result<Option<BillingCycle>> {
        if home_id != self.home_id {
            return Ok(None);
        }
        Ok(self.cycle.clone())
    }
}
