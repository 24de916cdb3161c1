use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::{
    animation::{AnimationEngine, RingFrame},
    config::RuntimeConfig,
    diagram::{self, DiagramState},
    history::{ChartSeries, HistoryPoint},
    notice::{NoticeKind, NoticeSlot, Notices, NoticesView},
    poll::{PollGate, PollKind, PollToken},
    readout::{self, Readouts},
    reconcile::{ConfigReconciler, ControlField, ControlPanel},
    status::{self, LogicalStatus},
    types::{DeviceConfig, ManualFanCommand, ManualFanResult, StatusSnapshot},
};

pub const STORE_UNAVAILABLE: &str = "Chart data unavailable (store not connected).";

/// Result of one history fetch as seen by the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    Points(Vec<HistoryPoint>),
    Unavailable,
    Failed(String),
}

/// Why a forwarded command did not take effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    Rejected(String),
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PollStats {
    pub status_polls: u64,
    pub failed_status_polls: u64,
    pub history_polls: u64,
    pub dropped_responses: u64,
    pub config_applies: u64,
    pub ui_writes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub readouts: Readouts,
    pub panel: ControlPanel,
    pub focused: Option<ControlField>,
    pub status: Option<LogicalStatus>,
    pub status_label: String,
    pub ring: Option<RingFrame>,
    pub diagram: DiagramState,
    pub chart: ChartSeries,
    pub chart_error: Option<String>,
    pub notices: NoticesView,
    pub stats: PollStats,
}

/// Single owner of everything the dashboard shows. Pollers, the ticker and
/// the command handlers all go through this one value.
#[derive(Debug, Clone)]
pub struct DashboardController {
    timezone: Tz,
    freshness_window: Duration,

    reconciler: ConfigReconciler,
    engine: AnimationEngine,
    focused: Option<ControlField>,

    snapshot: Option<StatusSnapshot>,
    status: Option<LogicalStatus>,
    readouts: Readouts,
    diagram: DiagramState,
    chart: ChartSeries,
    chart_error: Option<String>,
    last_frame: Option<RingFrame>,
    notices: Notices,

    status_gate: PollGate,
    history_gate: PollGate,
    stats: PollStats,
}

impl DashboardController {
    pub fn new(runtime: &RuntimeConfig) -> Self {
        let timezone = runtime.timezone.parse::<Tz>().unwrap_or(chrono_tz::UTC);

        Self {
            timezone,
            freshness_window: runtime.diagram.freshness_window(),
            reconciler: ConfigReconciler::new(),
            engine: AnimationEngine::new(runtime.animation.clone()),
            focused: None,
            snapshot: None,
            status: None,
            readouts: Readouts::default(),
            diagram: DiagramState::offline(),
            chart: ChartSeries::default(),
            chart_error: None,
            last_frame: None,
            notices: Notices::new(runtime.ui.notice_ms),
            status_gate: PollGate::new(),
            history_gate: PollGate::new(),
            stats: PollStats::default(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// None until the first status poll lands.
    pub fn status(&self) -> Option<&LogicalStatus> {
        self.status.as_ref()
    }

    pub fn readouts(&self) -> &Readouts {
        &self.readouts
    }

    pub fn diagram(&self) -> &DiagramState {
        &self.diagram
    }

    pub fn engine(&self) -> &AnimationEngine {
        &self.engine
    }

    pub fn reconciler(&self) -> &ConfigReconciler {
        &self.reconciler
    }

    pub fn chart(&self) -> &ChartSeries {
        &self.chart
    }

    pub fn chart_error(&self) -> Option<&str> {
        self.chart_error.as_deref()
    }

    pub fn last_frame(&self) -> Option<&RingFrame> {
        self.last_frame.as_ref()
    }

    pub fn stats(&self) -> PollStats {
        PollStats {
            dropped_responses: self.status_gate.dropped() + self.history_gate.dropped(),
            config_applies: self.reconciler.applies(),
            ui_writes: self.reconciler.ui_writes(),
            ..self.stats
        }
    }

    pub fn begin_poll(&mut self, kind: PollKind) -> PollToken {
        match kind {
            PollKind::Status => self.status_gate.begin(),
            PollKind::History => self.history_gate.begin(),
        }
    }

    /// Applies a status poll result. Returns false when a newer poll of the
    /// same kind was already applied and this one was dropped.
    pub fn apply_status(
        &mut self,
        token: PollToken,
        issued_at: DateTime<Utc>,
        snapshot: StatusSnapshot,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.status_gate.accept(token) {
            return false;
        }

        self.stats.status_polls += 1;
        if snapshot.fetch_failed {
            self.stats.failed_status_polls += 1;
        }

        let config = match snapshot.config.as_ref() {
            Some(fetched) if !snapshot.fetch_failed => {
                self.reconciler.reconcile(fetched, self.focused, issued_at);
                self.reconciler.last_known().cloned()
            }
            _ => None,
        };

        self.readouts = if snapshot.fetch_failed {
            Readouts::failed(&self.readouts)
        } else {
            Readouts::from_snapshot(&snapshot, config.as_ref(), self.timezone)
        };

        self.diagram = diagram::project(
            snapshot.device,
            snapshot.server,
            snapshot.store,
            snapshot.last_reading_timestamp(),
            now,
            self.freshness_window,
        );

        let derived = status::derive(snapshot.device, snapshot.reading.as_ref(), config.as_ref());
        self.engine.set_target(&derived);
        self.status = Some(derived);

        self.snapshot = Some(snapshot);
        true
    }

    pub fn apply_history(&mut self, token: PollToken, outcome: HistoryOutcome) -> bool {
        if !self.history_gate.accept(token) {
            return false;
        }
        self.stats.history_polls += 1;

        match outcome {
            HistoryOutcome::Points(points) => {
                self.chart = ChartSeries::from_points(&points, self.timezone);
                self.chart_error = None;
            }
            HistoryOutcome::Unavailable => {
                self.chart = ChartSeries::default();
                self.chart_error = Some(STORE_UNAVAILABLE.to_string());
            }
            HistoryOutcome::Failed(message) => {
                self.chart = ChartSeries::default();
                self.chart_error = Some(format!("Error loading chart data: {message}"));
            }
        }
        true
    }

    pub fn tick(&mut self) -> &RingFrame {
        self.last_frame.insert(self.engine.tick())
    }

    pub fn set_focus(&mut self, field: Option<ControlField>) {
        self.focused = field;
    }

    pub fn focused(&self) -> Option<ControlField> {
        self.focused
    }

    pub fn begin_config_update(&mut self, now: DateTime<Utc>) {
        self.notices
            .post(NoticeSlot::BaseConfig, "Updating...", NoticeKind::Success, now);
    }

    pub fn finish_config_update(
        &mut self,
        result: Result<DeviceConfig, CommandFailure>,
        now: DateTime<Utc>,
    ) {
        match result {
            Ok(applied) => {
                self.reconciler
                    .apply_config_update(&applied, self.focused, now);
                self.notices.post(
                    NoticeSlot::BaseConfig,
                    "Auto/RGB Config updated!",
                    NoticeKind::Success,
                    now,
                );
            }
            Err(failure) => {
                let text = match failure {
                    CommandFailure::Rejected(message) => format!("Error: {message}"),
                    CommandFailure::Network => "Network error.".to_string(),
                };
                self.notices
                    .post(NoticeSlot::BaseConfig, text, NoticeKind::Error, now);
            }
        }
    }

    pub fn begin_manual_command(&mut self, now: DateTime<Utc>) {
        self.notices.post(
            NoticeSlot::ManualFan,
            "Sending fan command...",
            NoticeKind::Success,
            now,
        );
    }

    pub fn finish_manual_command(
        &mut self,
        result: Result<ManualFanResult, CommandFailure>,
        now: DateTime<Utc>,
    ) {
        match result {
            Ok(applied) => {
                self.reconciler.apply_manual_result(applied, now);
                self.readouts.fan_control_mode =
                    readout::fan_control_mode(self.reconciler.last_known());
                self.notices.post(
                    NoticeSlot::ManualFan,
                    "Fan command sent!",
                    NoticeKind::Success,
                    now,
                );
            }
            Err(failure) => {
                let text = match failure {
                    CommandFailure::Rejected(message) => format!("Error: {message}"),
                    CommandFailure::Network => "Network error setting fan.".to_string(),
                };
                self.notices
                    .post(NoticeSlot::ManualFan, text, NoticeKind::Error, now);
            }
        }
    }

    /// Command sent when the manual toggle flips. Enabling follows the fan's
    /// last reported state so the switch does not change what the fan does.
    pub fn manual_toggle_command(&self, active: bool) -> ManualFanCommand {
        let running = self
            .snapshot
            .as_ref()
            .filter(|snapshot| snapshot.device.is_online())
            .and_then(|snapshot| snapshot.reading.as_ref())
            .and_then(|reading| reading.fan_on)
            == Some(true);

        ManualFanCommand {
            active,
            state: active && running,
        }
    }

    pub fn view(&self, now: DateTime<Utc>) -> DashboardView {
        DashboardView {
            readouts: self.readouts.clone(),
            panel: self.reconciler.panel().clone(),
            focused: self.focused,
            status: self.status.clone(),
            status_label: self.engine.status_label().to_string(),
            ring: self.last_frame.clone(),
            diagram: self.diagram,
            chart: self.chart.clone(),
            chart_error: self.chart_error.clone(),
            notices: self.notices.view(now),
            stats: self.stats(),
        }
    }
}
