use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::types::{DeviceConfig, StatusSnapshot};

pub const TEMPERATURE_PLACEHOLDER: &str = "-- °C";
pub const HUMIDITY_PLACEHOLDER: &str = "-- %";
pub const VALUE_PLACEHOLDER: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readouts {
    pub temperature: String,
    pub humidity: String,
    pub fan_actual: String,
    pub last_update: String,
    pub fan_control_mode: String,
}

impl Default for Readouts {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE_PLACEHOLDER.to_string(),
            humidity: HUMIDITY_PLACEHOLDER.to_string(),
            fan_actual: VALUE_PLACEHOLDER.to_string(),
            last_update: VALUE_PLACEHOLDER.to_string(),
            fan_control_mode: fan_control_mode(None),
        }
    }
}

impl Readouts {
    /// Sensor fields show only while the device is online; missing values
    /// fall back to placeholders.
    pub fn from_snapshot(
        snapshot: &StatusSnapshot,
        config: Option<&DeviceConfig>,
        timezone: Tz,
    ) -> Self {
        let reading = snapshot
            .reading
            .as_ref()
            .filter(|_| snapshot.device.is_online());

        let temperature = reading
            .and_then(|reading| reading.temperature)
            .map(|value| format!("{value:.1} °C"))
            .unwrap_or_else(|| TEMPERATURE_PLACEHOLDER.to_string());
        let humidity = reading
            .and_then(|reading| reading.humidity)
            .map(|value| format!("{value:.1} %"))
            .unwrap_or_else(|| HUMIDITY_PLACEHOLDER.to_string());
        let fan_actual = reading
            .and_then(|reading| reading.fan_on)
            .map(|on| if on { "ON" } else { "OFF" }.to_string())
            .unwrap_or_else(|| VALUE_PLACEHOLDER.to_string());
        let last_update = reading
            .and_then(|reading| reading.timestamp_utc())
            .map(|timestamp| format_local(timestamp, timezone))
            .unwrap_or_else(|| VALUE_PLACEHOLDER.to_string());

        Self {
            temperature,
            humidity,
            fan_actual,
            last_update,
            fan_control_mode: fan_control_mode(config),
        }
    }

    /// Keeps the control-mode text; everything sensor-related goes blank.
    pub fn failed(previous: &Readouts) -> Self {
        Self {
            last_update: "Error".to_string(),
            fan_control_mode: previous.fan_control_mode.clone(),
            ..Self::default()
        }
    }
}

pub fn fan_control_mode(config: Option<&DeviceConfig>) -> String {
    match config {
        Some(config) if config.manual_control_active => {
            let target = if config.manual_fan_target_state == Some(true) {
                "ON"
            } else {
                "OFF"
            };
            format!("MANUAL ({target})")
        }
        _ => "AUTO".to_string(),
    }
}

pub fn format_local(timestamp: DateTime<Utc>, timezone: Tz) -> String {
    timestamp
        .with_timezone(&timezone)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
