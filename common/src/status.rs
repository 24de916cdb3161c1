use serde::{Serialize, Serializer};

use crate::types::{ComponentStatus, DeviceConfig, Reading};

/// Dead-band above the fan threshold before the dashboard flags high temperature.
pub const HYSTERESIS_MARGIN: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalStatus {
    WifiConnecting,
    WifiConnectedInit,
    FanOnAuto,
    FanOnManual,
    FanOff,
    Idle,
    TempHigh,
    SensorError,
    DeviceOffline,
    Communicating,
    Unrecognized(String),
}

impl LogicalStatus {
    /// Parses a device-supplied state tag. Firmware tags carry `S_` or
    /// `S_OPERATIONAL_` prefixes; both forms are accepted.
    pub fn from_tag(raw: &str) -> Self {
        let tag = raw.trim().to_ascii_uppercase();
        let bare = tag
            .strip_prefix("S_OPERATIONAL_")
            .or_else(|| tag.strip_prefix("S_"))
            .unwrap_or(&tag);

        match bare {
            "WIFI_CONNECTING" | "WIFI_CONNECTION_FAILED_RETRY" => Self::WifiConnecting,
            "WIFI_CONNECTED_INIT" | "WIFI_CONNECTED_INIT_ANIM" => Self::WifiConnectedInit,
            "FAN_ON_AUTO" => Self::FanOnAuto,
            "FAN_ON_MANUAL" => Self::FanOnManual,
            "FAN_OFF" => Self::FanOff,
            "IDLE" => Self::Idle,
            "TEMP_HIGH" => Self::TempHigh,
            "SENSOR_ERROR" => Self::SensorError,
            "DEVICE_OFFLINE"
            | "ESP_OFFLINE"
            | "ESP_OFFLINE_ERROR"
            | "WIFI_DISCONNECTED_OPERATIONAL"
            | "HTTP_REQUEST_FAILED" => Self::DeviceOffline,
            "COMMUNICATING" | "HTTP_ACTIVE" => Self::Communicating,
            _ => Self::Unrecognized(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::WifiConnecting => "WIFI_CONNECTING",
            Self::WifiConnectedInit => "WIFI_CONNECTED_INIT",
            Self::FanOnAuto => "FAN_ON_AUTO",
            Self::FanOnManual => "FAN_ON_MANUAL",
            Self::FanOff => "FAN_OFF",
            Self::Idle => "IDLE",
            Self::TempHigh => "TEMP_HIGH",
            Self::SensorError => "SENSOR_ERROR",
            Self::DeviceOffline => "DEVICE_OFFLINE",
            Self::Communicating => "COMMUNICATING",
            Self::Unrecognized(tag) => tag,
        }
    }
}

impl Serialize for LogicalStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn derive(
    device: ComponentStatus,
    reading: Option<&Reading>,
    config: Option<&DeviceConfig>,
) -> LogicalStatus {
    if !device.is_online() {
        return LogicalStatus::DeviceOffline;
    }

    if let Some(tag) = config.and_then(DeviceConfig::explicit_state) {
        return LogicalStatus::from_tag(tag);
    }

    let Some(reading) = reading.filter(|reading| reading.has_fan_signal()) else {
        return LogicalStatus::Idle;
    };

    let manual = config.is_some_and(|config| config.manual_control_active);

    if reading.fan_on == Some(true) {
        return if manual {
            LogicalStatus::FanOnManual
        } else {
            LogicalStatus::FanOnAuto
        };
    }

    let threshold = config.and_then(|config| config.fan_threshold_temp);
    if let (Some(temperature), Some(threshold)) = (reading.temperature, threshold) {
        if temperature > threshold + HYSTERESIS_MARGIN && !manual {
            return LogicalStatus::TempHigh;
        }
    }

    LogicalStatus::FanOff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature: Option<f32>, fan_on: Option<bool>) -> Reading {
        Reading {
            temperature,
            humidity: Some(60.0),
            fan_on,
            timestamp: Some("2026-03-01T10:00:00Z".to_string()),
        }
    }

    fn config(threshold: f32, manual: bool) -> DeviceConfig {
        DeviceConfig {
            fan_threshold_temp: Some(threshold),
            rgb_brightness: Some(100),
            manual_control_active: manual,
            manual_fan_target_state: None,
            explicit_device_state: None,
        }
    }

    #[test]
    fn offline_device_wins_over_everything() {
        let mut cfg = config(26.0, false);
        cfg.explicit_device_state = Some("S_OPERATIONAL_FAN_ON_AUTO".to_string());

        for device in [ComponentStatus::Offline, ComponentStatus::Degraded] {
            assert_eq!(
                derive(device, Some(&reading(Some(40.0), Some(true))), Some(&cfg)),
                LogicalStatus::DeviceOffline
            );
        }
    }

    #[test]
    fn explicit_state_is_passed_through() {
        let mut cfg = config(26.0, false);
        cfg.explicit_device_state = Some("S_SENSOR_ERROR".to_string());
        let status = derive(
            ComponentStatus::Online,
            Some(&reading(Some(40.0), Some(true))),
            Some(&cfg),
        );
        assert_eq!(status, LogicalStatus::SensorError);

        cfg.explicit_device_state = Some("S_CALIBRATING".to_string());
        let status = derive(ComponentStatus::Online, None, Some(&cfg));
        assert_eq!(status, LogicalStatus::Unrecognized("S_CALIBRATING".to_string()));
    }

    #[test]
    fn fan_on_follows_manual_flag() {
        let on = reading(Some(22.0), Some(true));
        assert_eq!(
            derive(ComponentStatus::Online, Some(&on), Some(&config(26.0, true))),
            LogicalStatus::FanOnManual
        );
        assert_eq!(
            derive(ComponentStatus::Online, Some(&on), Some(&config(26.0, false))),
            LogicalStatus::FanOnAuto
        );
    }

    #[test]
    fn temp_high_requires_strictly_exceeding_margin() {
        let cfg = config(26.0, false);

        let at_margin = reading(Some(28.0), Some(false));
        assert_eq!(
            derive(ComponentStatus::Online, Some(&at_margin), Some(&cfg)),
            LogicalStatus::FanOff
        );

        let above = reading(Some(28.1), Some(false));
        assert_eq!(
            derive(ComponentStatus::Online, Some(&above), Some(&cfg)),
            LogicalStatus::TempHigh
        );

        let below = reading(Some(25.0), Some(false));
        assert_eq!(
            derive(ComponentStatus::Online, Some(&below), Some(&cfg)),
            LogicalStatus::FanOff
        );
    }

    #[test]
    fn temp_high_boundary_holds_across_thresholds() {
        for threshold in [-10.0_f32, 0.0, 18.5, 26.0, 31.25, 45.0] {
            let cfg = config(threshold, false);
            let equal = reading(Some(threshold + HYSTERESIS_MARGIN), Some(false));
            assert_eq!(
                derive(ComponentStatus::Online, Some(&equal), Some(&cfg)),
                LogicalStatus::FanOff,
                "threshold {threshold}"
            );

            let hotter = reading(Some(threshold + HYSTERESIS_MARGIN + 0.5), Some(false));
            assert_eq!(
                derive(ComponentStatus::Online, Some(&hotter), Some(&cfg)),
                LogicalStatus::TempHigh,
                "threshold {threshold}"
            );
        }
    }

    #[test]
    fn manual_control_suppresses_temp_high() {
        let hot = reading(Some(35.0), Some(false));
        assert_eq!(
            derive(ComponentStatus::Online, Some(&hot), Some(&config(26.0, true))),
            LogicalStatus::FanOff
        );
    }

    #[test]
    fn unknown_threshold_never_flags_temp_high() {
        let hot = reading(Some(80.0), Some(false));
        let cfg = DeviceConfig::default();
        assert_eq!(
            derive(ComponentStatus::Online, Some(&hot), Some(&cfg)),
            LogicalStatus::FanOff
        );
        assert_eq!(
            derive(ComponentStatus::Online, Some(&hot), None),
            LogicalStatus::FanOff
        );
    }

    #[test]
    fn no_fan_signal_is_idle() {
        assert_eq!(derive(ComponentStatus::Online, None, None), LogicalStatus::Idle);
        assert_eq!(
            derive(
                ComponentStatus::Online,
                Some(&reading(None, None)),
                Some(&config(26.0, false))
            ),
            LogicalStatus::Idle
        );
    }

    #[test]
    fn tag_aliases_collapse() {
        assert_eq!(
            LogicalStatus::from_tag("S_WIFI_CONNECTION_FAILED_RETRY"),
            LogicalStatus::WifiConnecting
        );
        assert_eq!(
            LogicalStatus::from_tag("S_WIFI_CONNECTED_INIT_ANIM"),
            LogicalStatus::WifiConnectedInit
        );
        assert_eq!(
            LogicalStatus::from_tag("ESP_OFFLINE_ERROR"),
            LogicalStatus::DeviceOffline
        );
        assert_eq!(
            LogicalStatus::from_tag("S_HTTP_ACTIVE"),
            LogicalStatus::Communicating
        );
        assert_eq!(LogicalStatus::from_tag("temp_high"), LogicalStatus::TempHigh);
    }
}
