use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Online,
    Offline,
    Degraded,
}

impl ComponentStatus {
    /// Anything other than the two known strings is degraded, including a missing field.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("online") => Self::Online,
            Some("offline") => Self::Offline,
            _ => Self::Degraded,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Degraded => "degraded",
        }
    }

    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn scaled(self, factor: f64) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let channel = |value: u8| (f64::from(value) * factor).floor() as u8;
        Self::new(channel(self.r), channel(self.g), channel(self.b))
    }

    pub fn divided(self, divisor: u8) -> Self {
        let divisor = divisor.max(1);
        Self::new(self.r / divisor, self.g / divisor, self.b / divisor)
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.r.max(other.r),
            self.g.max(other.g),
            self.b.max(other.b),
        )
    }

    pub fn css(self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default, deserialize_with = "lenient_f32")]
    pub temperature: Option<f32>,
    #[serde(default, deserialize_with = "lenient_f32")]
    pub humidity: Option<f32>,
    #[serde(default)]
    pub fan_on: Option<bool>,
    #[serde(rename = "created_at", default)]
    pub timestamp: Option<String>,
}

impl Reading {
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    pub fn has_fan_signal(&self) -> bool {
        self.fan_on.is_some() || self.temperature.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default, deserialize_with = "lenient_f32")]
    pub fan_threshold_temp: Option<f32>,
    #[serde(default, deserialize_with = "lenient_brightness")]
    pub rgb_brightness: Option<u8>,
    #[serde(
        rename = "manual_fan_control_active",
        default,
        deserialize_with = "null_as_false"
    )]
    pub manual_control_active: bool,
    #[serde(default)]
    pub manual_fan_target_state: Option<bool>,
    #[serde(rename = "esp_internal_state", default)]
    pub explicit_device_state: Option<String>,
}

impl DeviceConfig {
    /// Manual target only counts while manual control is active.
    pub fn effective_manual_target(&self) -> Option<bool> {
        if self.manual_control_active {
            self.manual_fan_target_state
        } else {
            None
        }
    }

    pub fn explicit_state(&self) -> Option<&str> {
        self.explicit_device_state
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub latest_reading: Option<Reading>,
    #[serde(default)]
    pub current_config: Option<DeviceConfig>,
    #[serde(default)]
    pub esp_status: Option<String>,
    #[serde(default)]
    pub flask_status: Option<String>,
    #[serde(default)]
    pub supabase_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub reading: Option<Reading>,
    pub config: Option<DeviceConfig>,
    pub device: ComponentStatus,
    pub server: ComponentStatus,
    pub store: ComponentStatus,
    pub fetch_failed: bool,
}

impl StatusSnapshot {
    /// Canonical tuple shown whenever a status poll fails or returns garbage.
    pub fn degraded() -> Self {
        Self {
            reading: None,
            config: None,
            device: ComponentStatus::Offline,
            server: ComponentStatus::Offline,
            store: ComponentStatus::Degraded,
            fetch_failed: true,
        }
    }

    pub fn from_payload(payload: StatusPayload) -> Self {
        Self {
            reading: payload.latest_reading,
            config: payload.current_config,
            device: ComponentStatus::from_wire(payload.esp_status.as_deref()),
            server: ComponentStatus::from_wire(payload.flask_status.as_deref()),
            store: ComponentStatus::from_wire(payload.supabase_status.as_deref()),
            fetch_failed: false,
        }
    }

    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<StatusPayload>(body).map(Self::from_payload)
    }

    pub fn last_reading_timestamp(&self) -> Option<DateTime<Utc>> {
        if !self.device.is_online() {
            return None;
        }
        self.reading.as_ref().and_then(Reading::timestamp_utc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfigUpdateRequest {
    #[serde(rename = "fan_threshold_temp")]
    pub threshold: f32,
    #[serde(rename = "rgb_brightness")]
    pub brightness: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManualFanCommand {
    #[serde(rename = "manual_control_active")]
    pub active: bool,
    #[serde(rename = "manual_fan_state")]
    pub state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ManualFanResult {
    #[serde(
        rename = "manual_fan_control_active",
        default,
        deserialize_with = "null_as_false"
    )]
    pub active: bool,
    #[serde(rename = "manual_fan_target_state", default)]
    pub state: Option<bool>,
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    // Store rows sometimes come back without an offset; those are UTC.
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn number_from_value(value: Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

pub(crate) fn lenient_f32<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(value).map(|number| number as f32))
}

fn lenient_brightness<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(value).map(|number| number.round().clamp(0.0, 255.0) as u8))
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
