use fan_dashboard_common::{HistoryOutcome, StatusSnapshot};
use tracing::warn;

use crate::{
    api::{ApiClient, ApiError},
    history_source::HistorySource,
};

/// One status request. Failures are logged and shown as the degraded
/// snapshot; the next poll is the retry.
pub async fn poll_status(api: &ApiClient) -> StatusSnapshot {
    snapshot_or_degraded(api.fetch_status().await)
}

fn snapshot_or_degraded(result: Result<StatusSnapshot, ApiError>) -> StatusSnapshot {
    match result {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!("status poll failed: {err}");
            StatusSnapshot::degraded()
        }
    }
}

pub async fn poll_history(source: &HistorySource) -> HistoryOutcome {
    match source {
        HistorySource::Disabled => HistoryOutcome::Unavailable,
        HistorySource::Store(store) => match store.fetch().await {
            Ok(points) => HistoryOutcome::Points(points),
            Err(err) => {
                warn!("history poll failed: {err}");
                HistoryOutcome::Failed(err.to_string())
            }
        },
    }
}
