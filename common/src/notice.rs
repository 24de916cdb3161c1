use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::MAX_NOTICE_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSlot {
    BaseConfig,
    ManualFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    #[serde(skip)]
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NoticesView {
    pub base_config: Option<Notice>,
    pub manual_fan: Option<Notice>,
}

/// Short-lived command feedback, one message per slot.
#[derive(Debug, Clone)]
pub struct Notices {
    ttl: Duration,
    base_config: Option<Notice>,
    manual_fan: Option<Notice>,
}

impl Notices {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl: Duration::milliseconds(i64::try_from(ttl_ms.min(MAX_NOTICE_MS)).unwrap_or(0)),
            base_config: None,
            manual_fan: None,
        }
    }

    pub fn post(
        &mut self,
        slot: NoticeSlot,
        text: impl Into<String>,
        kind: NoticeKind,
        now: DateTime<Utc>,
    ) {
        let notice = Notice {
            text: text.into(),
            kind,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        match slot {
            NoticeSlot::BaseConfig => self.base_config = Some(notice),
            NoticeSlot::ManualFan => self.manual_fan = Some(notice),
        }
    }

    pub fn view(&self, now: DateTime<Utc>) -> NoticesView {
        let live = |notice: &Option<Notice>| {
            notice
                .as_ref()
                .filter(|notice| now < notice.expires_at)
                .cloned()
        };
        NoticesView {
            base_config: live(&self.base_config),
            manual_fan: live(&self.manual_fan),
        }
    }
}
