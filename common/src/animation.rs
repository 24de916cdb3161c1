use serde::Serialize;

use crate::{config::AnimationConfig, status::LogicalStatus, types::Rgb};

/// Unlit cells never go fully dark.
pub const BASELINE: Rgb = Rgb::new(10, 10, 10);
/// Color a finished blink sequence settles on, whatever was blinking.
pub const SETTLED: Rgb = Rgb::new(0, 180, 0);
pub const GLOW_THRESHOLD: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnimationMode {
    None,
    Solid,
    Wipe,
    Blink,
    Spin,
    Pulse,
    Chase,
}

/// What a wipe turns into once every cell is lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeSettle {
    Solid,
    Blink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationTarget {
    pub mode: AnimationMode,
    pub color: Rgb,
    pub settle: WipeSettle,
}

impl AnimationTarget {
    const fn new(mode: AnimationMode, color: Rgb) -> Self {
        Self {
            mode,
            color,
            settle: WipeSettle::Solid,
        }
    }

    const fn wipe_then_blink(color: Rgb) -> Self {
        Self {
            mode: AnimationMode::Wipe,
            color,
            settle: WipeSettle::Blink,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub target: AnimationTarget,
    pub label: &'static str,
}

pub fn target_for(status: &LogicalStatus) -> Transition {
    let (target, label) = match status {
        LogicalStatus::WifiConnecting => (
            AnimationTarget::new(AnimationMode::Spin, Rgb::new(0, 0, 200)),
            "WiFi Connecting...",
        ),
        LogicalStatus::WifiConnectedInit => (
            AnimationTarget::wipe_then_blink(Rgb::new(0, 0, 220)),
            "WiFi Connected!",
        ),
        LogicalStatus::FanOnManual => (
            AnimationTarget::new(AnimationMode::Wipe, Rgb::new(220, 0, 0)),
            "Fan ON (Manual)",
        ),
        LogicalStatus::FanOnAuto => (
            AnimationTarget::new(AnimationMode::Wipe, Rgb::new(220, 0, 0)),
            "Fan ON (Auto)",
        ),
        LogicalStatus::FanOff => (
            AnimationTarget::new(AnimationMode::Wipe, Rgb::new(0, 200, 0)),
            "Fan OFF - Nominal",
        ),
        LogicalStatus::Idle => (
            AnimationTarget::new(AnimationMode::Wipe, Rgb::new(0, 200, 0)),
            "System Nominal",
        ),
        LogicalStatus::TempHigh => (
            AnimationTarget::new(AnimationMode::Pulse, Rgb::new(255, 100, 0)),
            "Temp High!",
        ),
        LogicalStatus::SensorError => (
            AnimationTarget::new(AnimationMode::Solid, Rgb::new(200, 200, 0)),
            "Sensor Error!",
        ),
        LogicalStatus::DeviceOffline => (
            AnimationTarget::new(AnimationMode::Pulse, Rgb::new(100, 0, 0)),
            "ESP Offline/Error",
        ),
        LogicalStatus::Communicating => (
            AnimationTarget::new(AnimationMode::Chase, Rgb::new(100, 100, 100)),
            "Communicating...",
        ),
        LogicalStatus::Unrecognized(_) => (
            AnimationTarget::new(AnimationMode::Solid, Rgb::new(30, 30, 30)),
            "System Idle",
        ),
    };

    Transition { target, label }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingCell {
    pub color: Rgb,
    pub css: String,
    pub glow: bool,
    pub shadow: String,
}

impl From<Rgb> for RingCell {
    fn from(color: Rgb) -> Self {
        let glow = [color.r, color.g, color.b]
            .into_iter()
            .any(|channel| channel > GLOW_THRESHOLD);
        let shadow = if glow {
            format!("0 0 7px 2px rgba({},{},{},0.6)", color.r, color.g, color.b)
        } else {
            "0 0 3px rgba(0,0,0,0.3)".to_string()
        };
        Self {
            color,
            css: color.css(),
            glow,
            shadow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingFrame {
    pub frame: u64,
    pub mode: AnimationMode,
    pub label: String,
    pub cells: Vec<RingCell>,
}

#[derive(Debug, Clone)]
pub struct AnimationEngine {
    config: AnimationConfig,
    requested: Option<AnimationTarget>,

    mode: AnimationMode,
    color: Rgb,
    settle: WipeSettle,

    wipe_progress: usize,
    wipe_ticks: u32,

    blink_cycles_remaining: u32,
    blink_phase_on: bool,
    blink_phase_ticks: u32,

    frame_counter: u64,
    status_label: String,
}

impl AnimationEngine {
    pub fn new(mut config: AnimationConfig) -> Self {
        config.sanitize();
        Self {
            config,
            requested: None,
            mode: AnimationMode::None,
            color: Rgb::default(),
            settle: WipeSettle::Solid,
            wipe_progress: 0,
            wipe_ticks: 0,
            blink_cycles_remaining: 0,
            blink_phase_on: false,
            blink_phase_ticks: 0,
            frame_counter: 0,
            status_label: "Initializing...".to_string(),
        }
    }

    pub fn cells(&self) -> usize {
        self.config.cells
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn wipe_progress(&self) -> usize {
        self.wipe_progress
    }

    pub fn blink_cycles_remaining(&self) -> u32 {
        self.blink_cycles_remaining
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn status_label(&self) -> &str {
        &self.status_label
    }

    /// Returns true when the animation restarted. Repeating the current
    /// target only refreshes the label.
    pub fn set_target(&mut self, status: &LogicalStatus) -> bool {
        let transition = target_for(status);
        if self.status_label != transition.label {
            self.status_label = transition.label.to_string();
        }

        if self.requested == Some(transition.target) {
            return false;
        }

        self.requested = Some(transition.target);
        self.start(transition.target);
        true
    }

    pub fn tick(&mut self) -> RingFrame {
        self.frame_counter = self.frame_counter.wrapping_add(1);

        let cells = (0..self.config.cells)
            .map(|index| RingCell::from(self.cell_color(index)))
            .collect();
        let frame = RingFrame {
            frame: self.frame_counter,
            mode: self.mode,
            label: self.status_label.clone(),
            cells,
        };

        self.advance();
        frame
    }

    fn start(&mut self, target: AnimationTarget) {
        self.mode = target.mode;
        self.color = target.color;
        self.settle = target.settle;
        self.wipe_progress = 0;
        self.wipe_ticks = 0;
        if target.mode == AnimationMode::Blink {
            self.begin_blink();
        } else {
            self.blink_cycles_remaining = 0;
            self.blink_phase_on = false;
            self.blink_phase_ticks = 0;
        }
    }

    fn begin_blink(&mut self) {
        self.mode = AnimationMode::Blink;
        self.blink_cycles_remaining = self.config.blink_cycles;
        self.blink_phase_on = true;
        self.blink_phase_ticks = 0;
    }

    fn cell_color(&self, index: usize) -> Rgb {
        let cells = self.config.cells;
        match self.mode {
            AnimationMode::None => BASELINE,
            AnimationMode::Solid => self.color,
            AnimationMode::Wipe => {
                if index <= self.wipe_progress {
                    self.color
                } else {
                    BASELINE
                }
            }
            AnimationMode::Blink => {
                if self.blink_phase_on {
                    self.color
                } else {
                    BASELINE
                }
            }
            AnimationMode::Spin => {
                let lit = ((self.frame_counter / 2) % cells as u64) as usize;
                if index == lit {
                    self.color
                } else if index == (lit + cells - 1) % cells {
                    self.color.divided(2)
                } else if index == (lit + cells - 2) % cells {
                    self.color.divided(4)
                } else {
                    BASELINE
                }
            }
            AnimationMode::Pulse => {
                let phase = self.frame_counter as f64 * self.config.pulse_speed;
                let factor = (phase.sin() + 1.0) / 2.0;
                self.color.scaled(factor).max(BASELINE)
            }
            AnimationMode::Chase => {
                if index as u64 == self.frame_counter % cells as u64 {
                    self.color
                } else {
                    BASELINE
                }
            }
        }
    }

    fn advance(&mut self) {
        match self.mode {
            AnimationMode::Wipe => self.advance_wipe(),
            AnimationMode::Blink => self.advance_blink(),
            _ => {}
        }
    }

    fn advance_wipe(&mut self) {
        self.wipe_ticks = self.wipe_ticks.saturating_add(1);
        if self.wipe_ticks % self.config.wipe_step_ticks == 0 {
            self.wipe_progress = (self.wipe_progress + 1).min(self.config.cells);
        }

        if self.wipe_progress < self.config.cells {
            return;
        }

        match self.settle {
            WipeSettle::Blink => self.begin_blink(),
            WipeSettle::Solid => self.mode = AnimationMode::Solid,
        }
    }

    fn advance_blink(&mut self) {
        self.blink_phase_ticks += 1;
        if self.blink_phase_ticks < self.config.blink_phase_ticks() {
            return;
        }
        self.blink_phase_ticks = 0;

        if self.blink_phase_on {
            self.blink_phase_on = false;
            return;
        }

        // One full on/off pair done.
        self.blink_cycles_remaining = self.blink_cycles_remaining.saturating_sub(1);
        if self.blink_cycles_remaining == 0 {
            self.mode = AnimationMode::Solid;
            self.color = SETTLED;
        } else {
            self.blink_phase_on = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> AnimationEngine {
        AnimationEngine::new(AnimationConfig::default())
    }

    fn colors(frame: &RingFrame) -> Vec<Rgb> {
        frame.cells.iter().map(|cell| cell.color).collect()
    }

    #[test]
    fn transition_table_matches_statuses() {
        let cases = [
            (LogicalStatus::WifiConnecting, AnimationMode::Spin, Rgb::new(0, 0, 200)),
            (LogicalStatus::WifiConnectedInit, AnimationMode::Wipe, Rgb::new(0, 0, 220)),
            (LogicalStatus::FanOnManual, AnimationMode::Wipe, Rgb::new(220, 0, 0)),
            (LogicalStatus::FanOnAuto, AnimationMode::Wipe, Rgb::new(220, 0, 0)),
            (LogicalStatus::FanOff, AnimationMode::Wipe, Rgb::new(0, 200, 0)),
            (LogicalStatus::Idle, AnimationMode::Wipe, Rgb::new(0, 200, 0)),
            (LogicalStatus::TempHigh, AnimationMode::Pulse, Rgb::new(255, 100, 0)),
            (LogicalStatus::SensorError, AnimationMode::Solid, Rgb::new(200, 200, 0)),
            (LogicalStatus::DeviceOffline, AnimationMode::Pulse, Rgb::new(100, 0, 0)),
            (LogicalStatus::Communicating, AnimationMode::Chase, Rgb::new(100, 100, 100)),
            (
                LogicalStatus::Unrecognized("S_WHATEVER".to_string()),
                AnimationMode::Solid,
                Rgb::new(30, 30, 30),
            ),
        ];

        for (status, mode, color) in cases {
            let transition = target_for(&status);
            assert_eq!(transition.target.mode, mode, "{status:?}");
            assert_eq!(transition.target.color, color, "{status:?}");
        }

        assert_eq!(
            target_for(&LogicalStatus::WifiConnectedInit).target.settle,
            WipeSettle::Blink
        );
        assert_eq!(target_for(&LogicalStatus::FanOff).target.settle, WipeSettle::Solid);
    }

    #[test]
    fn untargeted_ring_shows_baseline() {
        let mut engine = engine();
        let frame = engine.tick();

        assert_eq!(frame.mode, AnimationMode::None);
        assert_eq!(colors(&frame), vec![BASELINE; 12]);
        assert_eq!(frame.label, "Initializing...");
    }

    #[test]
    fn solid_lights_every_cell() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::SensorError);

        let frame = engine.tick();
        assert_eq!(colors(&frame), vec![Rgb::new(200, 200, 0); 12]);
        assert!(frame.cells.iter().all(|cell| cell.glow));
    }

    #[test]
    fn wipe_settles_to_solid_in_exactly_n_times_k_ticks() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::FanOff);

        let mut last_progress = 0;
        for tick in 1..24 {
            let frame = engine.tick();
            assert_eq!(frame.mode, AnimationMode::Wipe, "tick {tick}");
            assert_eq!(engine.mode(), AnimationMode::Wipe, "tick {tick}");
            assert!(engine.wipe_progress() >= last_progress);
            assert!(engine.wipe_progress() <= engine.cells());
            last_progress = engine.wipe_progress();
        }

        engine.tick();
        assert_eq!(engine.mode(), AnimationMode::Solid);
        assert_eq!(engine.wipe_progress(), 12);
        assert_eq!(colors(&engine.tick()), vec![Rgb::new(0, 200, 0); 12]);
    }

    #[test]
    fn wipe_lights_cells_up_to_progress() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::FanOnAuto);

        let first = colors(&engine.tick());
        assert_eq!(first[0], Rgb::new(220, 0, 0));
        assert_eq!(first[1], BASELINE);

        engine.tick();
        let third = colors(&engine.tick());
        assert_eq!(&third[..2], &[Rgb::new(220, 0, 0); 2]);
        assert_eq!(third[2], BASELINE);
    }

    #[test]
    fn wipe_respects_custom_ring_size_and_step() {
        let mut engine = AnimationEngine::new(AnimationConfig {
            cells: 8,
            wipe_step_ticks: 3,
            ..AnimationConfig::default()
        });
        engine.set_target(&LogicalStatus::Idle);

        for _ in 0..23 {
            engine.tick();
        }
        assert_eq!(engine.mode(), AnimationMode::Wipe);
        engine.tick();
        assert_eq!(engine.mode(), AnimationMode::Solid);
    }

    #[test]
    fn repeated_target_does_not_restart_wipe() {
        let mut engine = engine();
        assert!(engine.set_target(&LogicalStatus::FanOff));

        for _ in 0..10 {
            engine.tick();
        }
        assert_eq!(engine.wipe_progress(), 5);

        for _ in 0..5 {
            assert!(!engine.set_target(&LogicalStatus::FanOff));
            assert_eq!(engine.wipe_progress(), 5);
        }

        // Same mode and color from a different status keeps going too.
        assert!(!engine.set_target(&LogicalStatus::Idle));
        assert_eq!(engine.wipe_progress(), 5);
        assert_eq!(engine.status_label(), "System Nominal");
    }

    #[test]
    fn settled_wipe_stays_settled_on_repeat() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::FanOnManual);
        for _ in 0..24 {
            engine.tick();
        }
        assert_eq!(engine.mode(), AnimationMode::Solid);

        assert!(!engine.set_target(&LogicalStatus::FanOnManual));
        assert_eq!(engine.mode(), AnimationMode::Solid);
    }

    #[test]
    fn color_change_restarts_wipe() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::FanOff);
        for _ in 0..10 {
            engine.tick();
        }

        assert!(engine.set_target(&LogicalStatus::FanOnAuto));
        assert_eq!(engine.wipe_progress(), 0);
        assert_eq!(engine.color(), Rgb::new(220, 0, 0));
        assert_eq!(engine.status_label(), "Fan ON (Auto)");
    }

    #[test]
    fn connected_wipe_blinks_then_settles_green() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::WifiConnectedInit);

        for _ in 0..24 {
            engine.tick();
        }
        assert_eq!(engine.mode(), AnimationMode::Blink);
        assert_eq!(engine.blink_cycles_remaining(), 3);

        // 3 cycles * 2 phases * 5 ticks.
        let mut seen_off = false;
        for tick in 1..30 {
            let frame = engine.tick();
            assert_eq!(engine.mode(), AnimationMode::Blink, "tick {tick}");
            seen_off |= frame.cells[0].color == BASELINE;
        }
        assert!(seen_off);

        engine.tick();
        assert_eq!(engine.mode(), AnimationMode::Solid);
        assert_eq!(engine.color(), SETTLED);
        assert_eq!(colors(&engine.tick()), vec![SETTLED; 12]);
    }

    #[test]
    fn blink_terminates_regardless_of_color() {
        for color in [Rgb::new(255, 255, 255), Rgb::new(0, 0, 0), Rgb::new(7, 99, 201)] {
            let mut engine = engine();
            engine.start(AnimationTarget::new(AnimationMode::Blink, color));

            let first = engine.tick();
            assert_eq!(first.cells[0].color, color);

            for _ in 1..30 {
                engine.tick();
                assert_eq!(engine.mode(), AnimationMode::Blink);
            }
            engine.tick();
            assert_eq!(engine.mode(), AnimationMode::Solid);
            assert_eq!(engine.color(), SETTLED);
        }
    }

    #[test]
    fn blink_phases_alternate() {
        let mut engine = engine();
        engine.start(AnimationTarget::new(AnimationMode::Blink, Rgb::new(0, 0, 220)));

        let pattern: Vec<bool> = (0..20)
            .map(|_| engine.tick().cells[0].color != BASELINE)
            .collect();
        let expected: Vec<bool> = [[true; 5], [false; 5], [true; 5], [false; 5]]
            .concat();
        assert_eq!(pattern, expected);
        assert_eq!(engine.blink_cycles_remaining(), 1);
    }

    #[test]
    fn spin_leaves_a_fading_tail() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::WifiConnecting);

        let frame = (0..4).map(|_| engine.tick()).last().unwrap();
        assert_eq!(frame.frame, 4);

        let mut expected = vec![BASELINE; 12];
        expected[2] = Rgb::new(0, 0, 200);
        expected[1] = Rgb::new(0, 0, 100);
        expected[0] = Rgb::new(0, 0, 50);
        assert_eq!(colors(&frame), expected);
    }

    #[test]
    fn spin_tail_wraps_around_the_ring() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::WifiConnecting);

        // frame 25 -> lit cell 0, tail on 11 and 10.
        let frame = (0..25).map(|_| engine.tick()).last().unwrap();
        let colors = colors(&frame);
        assert_eq!(colors[0], Rgb::new(0, 0, 200));
        assert_eq!(colors[11], Rgb::new(0, 0, 100));
        assert_eq!(colors[10], Rgb::new(0, 0, 50));
    }

    #[test]
    fn pulse_scales_every_cell_uniformly() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::TempHigh);

        let frame = engine.tick();
        assert_eq!(colors(&frame), vec![Rgb::new(133, 52, 10); 12]);

        for _ in 0..200 {
            let frame = engine.tick();
            let first = frame.cells[0].color;
            assert!(frame.cells.iter().all(|cell| cell.color == first));
            assert!(first.r >= BASELINE.r && first.g >= BASELINE.g && first.b >= BASELINE.b);
        }
    }

    #[test]
    fn offline_device_pulses_dark_red() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::DeviceOffline);

        assert_eq!(engine.mode(), AnimationMode::Pulse);
        assert_eq!(engine.color(), Rgb::new(100, 0, 0));
        assert_eq!(engine.status_label(), "ESP Offline/Error");
    }

    #[test]
    fn chase_lights_exactly_one_cell() {
        let mut engine = engine();
        engine.set_target(&LogicalStatus::Communicating);

        for _ in 0..30 {
            let frame = engine.tick();
            let lit: Vec<usize> = frame
                .cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| cell.color != BASELINE)
                .map(|(index, _)| index)
                .collect();
            assert_eq!(lit, vec![(frame.frame % 12) as usize]);
        }
    }

    #[test]
    fn glow_is_a_function_of_color() {
        assert!(RingCell::from(Rgb::new(101, 0, 0)).glow);
        assert!(!RingCell::from(Rgb::new(100, 100, 100)).glow);
        assert_eq!(
            RingCell::from(Rgb::new(0, 0, 220)),
            RingCell::from(Rgb::new(0, 0, 220))
        );
        assert_eq!(
            RingCell::from(Rgb::new(0, 0, 220)).shadow,
            "0 0 7px 2px rgba(0,0,220,0.6)"
        );
    }
}
