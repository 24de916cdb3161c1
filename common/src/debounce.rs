/// Trailing-edge debounce on a millisecond clock: a burst of triggers fires
/// once, `window_ms` after the last trigger in the burst.
#[derive(Debug, Clone)]
pub struct Debounce {
    window_ms: u64,
    deadline_ms: Option<u64>,
}

impl Debounce {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            deadline_ms: None,
        }
    }

    pub fn trigger(&mut self, now_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(self.window_ms));
    }

    pub fn is_pending(&self) -> bool {
        self.deadline_ms.is_some()
    }

    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.deadline_ms
            .map(|deadline| deadline.saturating_sub(now_ms))
    }

    /// True exactly once per burst, when the quiet window has elapsed.
    pub fn fire_if_due(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}
