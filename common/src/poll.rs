use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollKind {
    Status,
    History,
}

impl PollKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::History => "history",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollToken(u64);

impl PollToken {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

/// Superseding gate for one poll kind. Requests may overlap; a response is
/// applied only if nothing issued later has already been applied.
#[derive(Debug, Clone, Default)]
pub struct PollGate {
    issued: u64,
    applied: u64,
    dropped: u64,
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> PollToken {
        self.issued += 1;
        PollToken(self.issued)
    }

    pub fn accept(&mut self, token: PollToken) -> bool {
        if token.0 <= self.applied {
            self.dropped += 1;
            return false;
        }
        self.applied = token.0;
        true
    }

    pub fn in_flight(&self) -> u64 {
        self.issued - self.applied
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
