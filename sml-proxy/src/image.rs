//! Process image: the latest readings across all configured meters
//!
//! A single mutex guards the whole image. Writers replace one meter's
//! snapshot atomically; readers clone a consistent copy.

use crate::config::Config;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessImage {
    pub meters: BTreeMap<String, MeterState>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterState {
    pub connected: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub values: BTreeMap<String, MeterValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeterValue {
    pub value: serde_json::Value,
    pub unit: u8,
}

impl MeterState {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            last_update: None,
            values: BTreeMap::new(),
        }
    }
}

/// Shared store around the process image.
pub struct ProcessImageStore {
    image: Mutex<ProcessImage>,
}

impl ProcessImageStore {
    /// Seed one disconnected entry per configured meter so the HTTP surface
    /// lists every meter from the start.
    pub fn new(config: &Config) -> Self {
        let mut meters = BTreeMap::new();
        for meter in &config.meters {
            meters.insert(meter.id.clone(), MeterState::disconnected());
        }

        Self {
            image: Mutex::new(ProcessImage { meters }),
        }
    }

    /// Replace one meter's snapshot atomically.
    pub fn update(&self, meter_id: &str, state: MeterState) {
        let mut image = self.image.lock().expect("process image lock poisoned");
        image.meters.insert(meter_id.to_string(), state);
    }

    /// A consistent copy of the whole image.
    pub fn snapshot(&self) -> ProcessImage {
        self.image.lock().expect("process image lock poisoned").clone()
    }
}
