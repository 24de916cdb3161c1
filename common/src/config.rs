use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api base url must start with http:// or https:// (got {0:?})")]
    InvalidApiUrl(String),
    #[error("store url must start with http:// or https:// (got {0:?})")]
    InvalidStoreUrl(String),
    #[error("unknown display timezone {0:?}")]
    InvalidTimezone(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub anon_key: String,
    pub table: String,
    pub points: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            table: "sensor_readings".to_string(),
            points: 150,
        }
    }
}

impl StoreConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub status_interval_ms: u64,
    pub history_interval_ms: u64,
    pub history_initial_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: 3_000,
            history_interval_ms: 60_000,
            history_initial_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub tick_ms: u64,
    pub cells: usize,
    pub wipe_step_ticks: u32,
    pub blink_interval_ms: u64,
    pub blink_cycles: u32,
    pub pulse_speed: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 60,
            cells: 12,
            wipe_step_ticks: 2,
            blink_interval_ms: 300,
            blink_cycles: 3,
            pulse_speed: 0.05,
        }
    }
}

impl AnimationConfig {
    pub fn blink_phase_ticks(&self) -> u32 {
        let ticks = self.blink_interval_ms / self.tick_ms.max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
    }

    pub fn sanitize(&mut self) {
        self.tick_ms = self.tick_ms.clamp(10, 1_000);
        self.cells = self.cells.clamp(3, 256);
        self.wipe_step_ticks = self.wipe_step_ticks.max(1);
        self.blink_cycles = self.blink_cycles.max(1);
        if !self.pulse_speed.is_finite() || self.pulse_speed <= 0.0 {
            self.pulse_speed = 0.05;
        }
    }
}

pub const MAX_FRESHNESS_WINDOW_SECS: i64 = 86_400;
pub const MAX_NOTICE_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    pub freshness_window_secs: i64,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 120,
        }
    }
}

impl DiagramConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::seconds(
            self.freshness_window_secs
                .clamp(1, MAX_FRESHNESS_WINDOW_SECS),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub notice_ms: u64,
    pub history_refresh_debounce_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            notice_ms: 4_000,
            history_refresh_debounce_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub polling: PollingConfig,
    pub animation: AnimationConfig,
    pub diagram: DiagramConfig,
    pub ui: UiConfig,
    pub timezone: String,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            store: StoreConfig::default(),
            polling: PollingConfig::default(),
            animation: AnimationConfig::default(),
            diagram: DiagramConfig::default(),
            ui: UiConfig::default(),
            timezone: "UTC".to_string(),
            http_port: 8080,
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.api.base_url = self.api.base_url.trim().trim_end_matches('/').to_string();
        self.api.request_timeout_ms = self.api.request_timeout_ms.clamp(500, 60_000);
        self.store.url = self.store.url.trim().trim_end_matches('/').to_string();
        self.store.points = self.store.points.clamp(1, 1_000);

        self.polling.status_interval_ms = self.polling.status_interval_ms.max(500);
        self.polling.history_interval_ms = self.polling.history_interval_ms.max(5_000);

        self.animation.sanitize();
        self.diagram.freshness_window_secs = self
            .diagram
            .freshness_window_secs
            .clamp(1, MAX_FRESHNESS_WINDOW_SECS);
        self.ui.notice_ms = self.ui.notice_ms.min(MAX_NOTICE_MS);
        self.ui.history_refresh_debounce_ms = self.ui.history_refresh_debounce_ms.min(60_000);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_http_url(&self.api.base_url) {
            return Err(ConfigError::InvalidApiUrl(self.api.base_url.clone()));
        }
        if self.store.is_configured() && !is_http_url(&self.store.url) {
            return Err(ConfigError::InvalidStoreUrl(self.store.url.clone()));
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::InvalidTimezone(self.timezone.clone()));
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
