pub mod animation;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod diagram;
pub mod history;
pub mod notice;
pub mod poll;
pub mod readout;
pub mod reconcile;
pub mod status;
pub mod types;

pub use animation::{AnimationEngine, AnimationMode, RingFrame};
pub use config::{ConfigError, RuntimeConfig};
pub use controller::{CommandFailure, DashboardController, DashboardView, HistoryOutcome};
pub use debounce::Debounce;
pub use diagram::DiagramState;
pub use history::{ChartSeries, HistoryPoint};
pub use poll::{PollKind, PollToken};
pub use reconcile::{ConfigReconciler, ControlField};
pub use status::LogicalStatus;
pub use types::{
    ComponentStatus, ConfigUpdateRequest, DeviceConfig, ManualFanCommand, ManualFanResult,
    StatusSnapshot,
};
