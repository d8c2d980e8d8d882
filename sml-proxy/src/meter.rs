//! Meter workers
//!
//! One task per configured meter dials the meter's TCP telegram output,
//! decodes SML files, and publishes the latest value list to the process
//! image. Connection loss clears the snapshot and triggers a delayed
//! reconnect, forever.

use crate::config::MeterConfig;
use crate::image::{MeterState, MeterValue, ProcessImageStore};
use anyhow::{bail, Context};
use chrono::Utc;
use sml_codec::{GetListRes, ListEntry, ListValue, MessageBody, SmlReader};
use sml_core::ObisCode;
use sml_transport::{ByteSource, TcpSource};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Spawns and supervises one worker per configured meter.
pub struct MeterManager {
    meters: Vec<MeterConfig>,
    store: Arc<ProcessImageStore>,
}

impl MeterManager {
    pub fn new(meters: Vec<MeterConfig>, store: Arc<ProcessImageStore>) -> Self {
        Self { meters, store }
    }

    /// Run every meter worker. Workers reconnect forever, so this only
    /// returns if a worker panics.
    pub async fn run(self) -> anyhow::Result<()> {
        if self.meters.is_empty() {
            log::warn!("no meters configured");
            std::future::pending::<()>().await;
        }

        let mut workers = JoinSet::new();
        for config in self.meters {
            let worker = MeterWorker::new(config, self.store.clone());
            workers.spawn(worker.run());
        }

        while let Some(joined) = workers.join_next().await {
            joined.context("meter worker terminated")?;
        }

        Ok(())
    }
}

struct MeterWorker {
    config: MeterConfig,
    store: Arc<ProcessImageStore>,
}

impl MeterWorker {
    fn new(config: MeterConfig, store: Arc<ProcessImageStore>) -> Self {
        Self { config, store }
    }

    async fn run(self) {
        let mut delay = false;

        loop {
            if delay {
                log::info!(
                    "{}: waiting {} seconds before reconnect...",
                    self.config.id,
                    self.config.reconnect_delay
                );
                tokio::time::sleep(Duration::from_secs(self.config.reconnect_delay)).await;
            }
            delay = true;

            let connect_timeout = match self.config.connect_timeout {
                0 => None,
                seconds => Some(Duration::from_secs(seconds)),
            };

            log::info!("{}: connecting to {}...", self.config.id, self.config.address);
            let source = match TcpSource::connect(&self.config.address, connect_timeout).await {
                Ok(source) => source,
                Err(e) => {
                    log::warn!("{}: dial failed: {}", self.config.id, e);
                    continue;
                }
            };

            log::info!("{}: connection established", self.config.id);

            if let Err(e) = self.handle_connection(source).await {
                log::warn!("{}: connection error: {:#}", self.config.id, e);
            }

            // Whatever happened, the readings are stale now.
            self.store
                .update(&self.config.id, MeterState::disconnected());
        }
    }

    async fn handle_connection(&self, mut source: TcpSource) -> anyhow::Result<()> {
        if self.config.read_timeout > 0 {
            source
                .set_timeout(Some(Duration::from_secs(self.config.read_timeout)))
                .await?;
        }

        let mut state = MeterState {
            connected: true,
            last_update: None,
            values: BTreeMap::new(),
        };
        self.store.update(&self.config.id, state.clone());

        let mut reader = SmlReader::new(source);

        loop {
            let file = reader.read_file().await?;

            if !self.config.disable_reception_log {
                if self.config.debug {
                    match serde_json::to_string(&file) {
                        Ok(json) => log::info!("{}: received SML file: {}", self.config.id, json),
                        Err(e) => log::warn!("{}: received SML file, but failed to serialize it: {}", self.config.id, e),
                    }
                } else {
                    log::info!("{}: received SML file", self.config.id);
                }
            }

            if file.messages.len() != 3 {
                bail!(
                    "can only understand SML files with 3 messages, got {}",
                    file.messages.len()
                );
            }

            let list = match &file.messages[1].body {
                MessageBody::GetListRes(list) => list,
                _ => bail!("SML_GetList.Res message required"),
            };

            state.values = collect_values(list).context("failed to map value list")?;
            state.last_update = Some(Utc::now());
            self.store.update(&self.config.id, state.clone());
        }
    }
}

/// Map a value list to `{obis → value, unit}`, applying the scaler.
fn collect_values(list: &GetListRes) -> anyhow::Result<BTreeMap<String, MeterValue>> {
    let mut values = BTreeMap::new();

    for entry in &list.val_list {
        let obis = ObisCode::try_from(entry.obj_name.as_slice())?;
        values.insert(
            obis.to_string(),
            MeterValue {
                value: entry_value(entry),
                unit: entry.unit.unwrap_or(0),
            },
        );
    }

    Ok(values)
}

/// Numeric values come out scaled by `10^scaler` as doubles; booleans pass
/// through, octet strings render as hex.
fn entry_value(entry: &ListEntry) -> serde_json::Value {
    let scaler = entry.scaler.unwrap_or(0);

    let numeric = match &entry.value {
        ListValue::Boolean(v) => return serde_json::json!(v),
        ListValue::Bytes(bytes) => {
            return serde_json::json!(sml_core::token::hex_string(bytes))
        }
        ListValue::I8(v) => *v as f64,
        ListValue::I16(v) => *v as f64,
        ListValue::I32(v) => *v as f64,
        ListValue::I64(v) => *v as f64,
        ListValue::U8(v) => *v as f64,
        ListValue::U16(v) => *v as f64,
        ListValue::U32(v) => *v as f64,
        ListValue::U64(v) => *v as f64,
    };

    serde_json::json!(scale(numeric, scaler))
}

fn scale(value: f64, scaler: i8) -> f64 {
    let mut scaled = value;
    let mut scaler = scaler;

    while scaler < 0 {
        scaled /= 10.0;
        scaler += 1;
    }
    while scaler > 0 {
        scaled *= 10.0;
        scaler -= 1;
    }

    scaled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: ListValue, scaler: Option<i8>, unit: Option<u8>) -> ListEntry {
        ListEntry {
            obj_name: vec![0x01, 0x00, 0x01, 0x08, 0x00, 0xff],
            status: None,
            val_time: None,
            unit,
            scaler,
            value,
            value_signature: None,
        }
    }

    fn list_of(entries: Vec<ListEntry>) -> GetListRes {
        GetListRes {
            client_id: None,
            server_id: vec![0x0a, 0x01],
            list_name: None,
            act_sensor_time: None,
            val_list: entries,
            list_signature: None,
            act_gateway_time: None,
        }
    }

    #[test]
    fn test_scaler_application() {
        let entry = entry(ListValue::U32(123456), Some(-2), Some(30));
        assert_eq!(entry_value(&entry), serde_json::json!(1234.56));
    }

    #[test]
    fn test_positive_scaler() {
        let entry = entry(ListValue::U8(5), Some(3), None);
        assert_eq!(entry_value(&entry), serde_json::json!(5000.0));
    }

    #[test]
    fn test_missing_scaler_leaves_value() {
        let entry = entry(ListValue::I16(-42), None, None);
        assert_eq!(entry_value(&entry), serde_json::json!(-42.0));
    }

    #[test]
    fn test_boolean_passes_through_unscaled() {
        let entry = entry(ListValue::Boolean(true), Some(-2), None);
        assert_eq!(entry_value(&entry), serde_json::json!(true));
    }

    #[test]
    fn test_bytes_render_as_hex() {
        let entry = entry(ListValue::Bytes(vec![0x0a, 0x01, 0x45]), None, None);
        assert_eq!(entry_value(&entry), serde_json::json!("0a0145"));
    }

    #[test]
    fn test_collect_values_keys_by_obis() {
        let list = list_of(vec![entry(ListValue::U32(123456), Some(-2), Some(30))]);
        let values = collect_values(&list).unwrap();

        let value = &values["1-0:1.8.0*255"];
        assert_eq!(value.value, serde_json::json!(1234.56));
        assert_eq!(value.unit, 30);
    }

    #[test]
    fn test_collect_values_rejects_bad_obis() {
        let mut bad = entry(ListValue::U8(1), None, None);
        bad.obj_name = vec![0x01, 0x00];
        let list = list_of(vec![bad]);
        assert!(collect_values(&list).is_err());
    }
}
