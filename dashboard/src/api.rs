use std::time::Duration;

use fan_dashboard_common::{
    config::ApiConfig, CommandFailure, ConfigUpdateRequest, DeviceConfig, ManualFanCommand,
    ManualFanResult, StatusSnapshot,
};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned {0}: {1}")]
    Status(u16, String),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{0}")]
    Rejected(String),
}

impl ApiError {
    /// Collapses transport problems into one notice; server-side rejections
    /// keep their message.
    pub fn into_failure(self) -> CommandFailure {
        match self {
            Self::Status(_, message) | Self::Rejected(message) => CommandFailure::Rejected(message),
            Self::Network(_) | Self::Malformed(_) => CommandFailure::Network,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigEnvelope {
    #[serde(default)]
    current_config: Option<DeviceConfig>,
    #[serde(default)]
    error: Option<String>,
}

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
        let url = format!("{}/api/latest_data", self.base_url);
        debug!(url = %url, "polling status");

        let response = self.http.get(&url).send().await?;
        let body = read_body(response).await?;
        Ok(StatusSnapshot::parse(&body)?)
    }

    pub async fn update_config(
        &self,
        request: ConfigUpdateRequest,
    ) -> Result<DeviceConfig, ApiError> {
        let url = format!("{}/api/update_config", self.base_url);
        debug!(url = %url, ?request, "sending config update");

        let response = self.http.post(&url).json(&request).send().await?;
        let body = read_body(response).await?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&body)?;

        match envelope.current_config {
            Some(config) => Ok(config),
            None => Err(ApiError::Rejected(
                envelope.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            )),
        }
    }

    pub async fn set_fan_manual(
        &self,
        command: ManualFanCommand,
    ) -> Result<ManualFanResult, ApiError> {
        let url = format!("{}/api/set_fan_manual", self.base_url);
        debug!(url = %url, ?command, "sending manual fan command");

        let response = self.http.post(&url).json(&command).send().await?;
        let body = read_body(response).await?;

        if let Some(error) = error_message(&body) {
            return Err(ApiError::Rejected(error));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;
    check_status(status, &body)?;
    Ok(body.to_vec())
}

/// Non-2xx replies become `ApiError::Status`, preferring the server's own
/// `error` text over the reason phrase.
fn check_status(status: StatusCode, body: &[u8]) -> Result<(), ApiError> {
    if status.is_success() {
        return Ok(());
    }
    let message = error_message(body)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
    Err(ApiError::Status(status.as_u16(), message))
}

fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_message_is_extracted() {
        assert_eq!(
            error_message(br#"{"error": "threshold must be between 15 and 40"}"#),
            Some("threshold must be between 15 and 40".to_string())
        );
        assert_eq!(error_message(b"<html>502</html>"), None);
        assert_eq!(error_message(br#"{"detail": "nope"}"#), None);
    }

    #[test]
    fn non_success_status_becomes_status_error() {
        assert!(check_status(StatusCode::OK, b"{}").is_ok());
        assert!(check_status(StatusCode::NO_CONTENT, b"").is_ok());

        match check_status(
            StatusCode::SERVICE_UNAVAILABLE,
            br#"{"error": "ESP unreachable"}"#,
        ) {
            Err(ApiError::Status(503, message)) => assert_eq!(message, "ESP unreachable"),
            other => panic!("unexpected result: {other:?}"),
        }

        match check_status(StatusCode::BAD_GATEWAY, b"<html>502</html>") {
            Err(ApiError::Status(502, message)) => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected result: {other:?}"),
        }

        match check_status(StatusCode::from_u16(599).unwrap(), b"") {
            Err(ApiError::Status(599, message)) => assert_eq!(message, UNKNOWN_ERROR),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn failures_map_to_notices() {
        assert_eq!(
            ApiError::Status(400, "bad threshold".to_string()).into_failure(),
            CommandFailure::Rejected("bad threshold".to_string())
        );
        assert_eq!(
            ApiError::Rejected(UNKNOWN_ERROR.to_string()).into_failure(),
            CommandFailure::Rejected(UNKNOWN_ERROR.to_string())
        );

        let malformed = serde_json::from_slice::<ConfigEnvelope>(b"not json")
            .map_err(ApiError::from)
            .unwrap_err();
        assert_eq!(malformed.into_failure(), CommandFailure::Network);
    }

    #[test]
    fn config_envelope_tolerates_error_only_body() {
        let envelope: ConfigEnvelope =
            serde_json::from_slice(br#"{"error": "ESP unreachable"}"#).unwrap();
        assert!(envelope.current_config.is_none());
        assert_eq!(envelope.error.as_deref(), Some("ESP unreachable"));
    }
}
