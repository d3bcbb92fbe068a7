use std::path::Path;

use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::{
    core::billing::TariffSlab,
    prelude::*,
    quantity::power::Watts,
    store::{Device, memory::MemoryStore},
};

fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("failed to parse `{}`", path.display()))
}

/// Household topology: the home, its rooms, and their devices.
#[derive(Deserialize)]
pub struct Household {
    pub home: Home,

    #[serde(default, rename = "room")]
    pub rooms: Vec<Room>,
}

#[derive(Deserialize)]
pub struct Home {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct Room {
    pub name: String,

    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    pub wattage: Watts,
}

impl Household {
    pub fn from_path(path: &Path) -> Result<Self> {
        load(path)
    }

    /// Flatten the room tree into the store's device list.
    pub fn into_store(self, slabs: Vec<TariffSlab>) -> MemoryStore {
        let devices = self
            .rooms
            .into_iter()
            .flat_map(|Room { name: room_name, devices }| {
                devices.into_iter().map(move |device| {
                    Device::builder()
                        .id(device.id)
                        .name(device.name)
                        .room(room_name.clone())
                        .wattage(device.wattage)
                        .build()
                })
            })
            .collect();
        MemoryStore::new(self.home.id, devices, slabs)
    }
}

/// The unit-rate schedule, one `[[slab]]` per tier.
#[derive(Deserialize)]
pub struct TariffSchedule {
    #[serde(rename = "slab")]
    pub slabs: Vec<TariffSlab>,
}

impl TariffSchedule {
    pub fn from_path(path: &Path) -> Result<Self> {
        load(path)
    }
}

/// Recorded on/off transitions, ordered by timestamp.
#[derive(Deserialize)]
pub struct EventLog {
    #[serde(default, rename = "event")]
    pub events: Vec<ToggleEvent>,
}

#[derive(Deserialize)]
pub struct ToggleEvent {
    pub device_id: String,
    pub at: DateTime<Local>,
    pub on: bool,
}

impl EventLog {
    pub fn from_path(path: &Path) -> Result<Self> {
        load(path)
    }
}
