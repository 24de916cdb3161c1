use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DeviceConfig, ManualFanResult};

/// Editable inputs on the control panel. Focus on one of these suppresses
/// writes to that input only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlField {
    FanThreshold,
    RgbBrightness,
    ManualModeToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualButton {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ControlPanel {
    pub fan_threshold: String,
    pub rgb_brightness: String,
    pub manual_mode: bool,
    pub manual_buttons_visible: bool,
    pub active_button: Option<ManualButton>,
}

impl ControlPanel {
    fn show_manual_state(&mut self, active: bool, target: Option<bool>) {
        self.manual_buttons_visible = active;
        self.active_button = match (active, target) {
            (true, Some(true)) => Some(ManualButton::On),
            (true, Some(false)) => Some(ManualButton::Off),
            _ => None,
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Noop,
    Apply(DeviceConfig),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BaseGuard {
    applied_at: DateTime<Utc>,
    fan_threshold_temp: Option<f32>,
    rgb_brightness: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ManualGuard {
    applied_at: DateTime<Utc>,
    active: bool,
    target: Option<bool>,
}

/// Holds the last applied device configuration and the control panel it was
/// pushed into.
///
/// Optimistic patches from successful commands are guarded: a poll issued at
/// or before the command's applied time cannot roll the patched fields back.
/// The first poll issued strictly later clears the guard.
#[derive(Debug, Clone, Default)]
pub struct ConfigReconciler {
    last_known: Option<DeviceConfig>,
    panel: ControlPanel,
    base_guard: Option<BaseGuard>,
    manual_guard: Option<ManualGuard>,
    applies: u64,
    ui_writes: u64,
}

impl ConfigReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_known(&self) -> Option<&DeviceConfig> {
        self.last_known.as_ref()
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    pub fn applies(&self) -> u64 {
        self.applies
    }

    pub fn ui_writes(&self) -> u64 {
        self.ui_writes
    }

    pub fn has_pending_guard(&self) -> bool {
        self.base_guard.is_some() || self.manual_guard.is_some()
    }

    pub fn reconcile(
        &mut self,
        fetched: &DeviceConfig,
        focused: Option<ControlField>,
        issued_at: DateTime<Utc>,
    ) -> Reconciliation {
        let mut effective = fetched.clone();

        if let Some(guard) = self.base_guard {
            if issued_at > guard.applied_at {
                self.base_guard = None;
            } else {
                effective.fan_threshold_temp = guard.fan_threshold_temp;
                effective.rgb_brightness = guard.rgb_brightness;
            }
        }

        if let Some(guard) = self.manual_guard {
            if issued_at > guard.applied_at {
                self.manual_guard = None;
            } else {
                effective.manual_control_active = guard.active;
                effective.manual_fan_target_state = guard.target;
            }
        }

        if self.last_known.as_ref() == Some(&effective) {
            return Reconciliation::Noop;
        }

        self.push_to_panel(&effective, focused);
        self.last_known = Some(effective.clone());
        self.applies += 1;
        Reconciliation::Apply(effective)
    }

    /// Patches threshold and brightness from a successful config update response.
    pub fn apply_config_update(
        &mut self,
        applied: &DeviceConfig,
        focused: Option<ControlField>,
        applied_at: DateTime<Utc>,
    ) {
        let mut patched = self.last_known.clone().unwrap_or_default();
        if applied.fan_threshold_temp.is_some() {
            patched.fan_threshold_temp = applied.fan_threshold_temp;
        }
        if applied.rgb_brightness.is_some() {
            patched.rgb_brightness = applied.rgb_brightness;
        }

        self.base_guard = Some(BaseGuard {
            applied_at,
            fan_threshold_temp: patched.fan_threshold_temp,
            rgb_brightness: patched.rgb_brightness,
        });
        self.push_to_panel(&patched, focused);
        self.last_known = Some(patched);
    }

    /// Patches the manual override state from a successful manual fan command.
    pub fn apply_manual_result(&mut self, result: ManualFanResult, applied_at: DateTime<Utc>) {
        let mut patched = self.last_known.clone().unwrap_or_default();
        patched.manual_control_active = result.active;
        patched.manual_fan_target_state = result.state;

        self.manual_guard = Some(ManualGuard {
            applied_at,
            active: result.active,
            target: result.state,
        });
        if self.panel.manual_mode != result.active {
            self.panel.manual_mode = result.active;
            self.ui_writes += 1;
        }
        self.panel.show_manual_state(result.active, result.state);
        self.last_known = Some(patched);
    }

    fn push_to_panel(&mut self, config: &DeviceConfig, focused: Option<ControlField>) {
        if focused != Some(ControlField::FanThreshold) {
            if let Some(threshold) = config.fan_threshold_temp {
                self.write_text(ControlField::FanThreshold, format!("{threshold:.1}"));
            }
        }

        if focused != Some(ControlField::RgbBrightness) {
            if let Some(brightness) = config.rgb_brightness {
                self.write_text(ControlField::RgbBrightness, brightness.to_string());
            }
        }

        if focused != Some(ControlField::ManualModeToggle)
            && self.panel.manual_mode != config.manual_control_active
        {
            self.panel.manual_mode = config.manual_control_active;
            self.ui_writes += 1;
        }

        self.panel
            .show_manual_state(config.manual_control_active, config.manual_fan_target_state);
    }

    fn write_text(&mut self, field: ControlField, value: String) {
        let slot = match field {
            ControlField::FanThreshold => &mut self.panel.fan_threshold,
            ControlField::RgbBrightness => &mut self.panel.rgb_brightness,
            ControlField::ManualModeToggle => return,
        };
        *slot = value;
        self.ui_writes += 1;
    }
}
