use fan_dashboard_common::{config::StoreConfig, history, HistoryPoint};
use tracing::{debug, info};

use crate::api::ApiError;

/// Where chart history comes from. Chosen once at startup.
pub enum HistorySource {
    Store(StoreClient),
    Disabled,
}

impl HistorySource {
    pub fn select(config: &StoreConfig, http: reqwest::Client) -> Self {
        if !config.is_configured() {
            info!("history store not configured, chart disabled");
            return Self::Disabled;
        }

        info!(url = %config.url, table = %config.table, "using history store");
        Self::Store(StoreClient {
            http,
            endpoint: query_url(config),
            key: config.anon_key.clone(),
        })
    }
}

pub struct StoreClient {
    http: reqwest::Client,
    endpoint: String,
    key: String,
}

impl StoreClient {
    /// Latest rows, oldest first.
    pub async fn fetch(&self) -> Result<Vec<HistoryPoint>, ApiError> {
        debug!(url = %self.endpoint, "fetching history");

        let response = self
            .http
            .get(&self.endpoint)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = String::from_utf8_lossy(&body).trim().to_string();
            return Err(ApiError::Status(status.as_u16(), message));
        }

        Ok(history::parse_store_rows(&body)?)
    }
}

fn query_url(config: &StoreConfig) -> String {
    format!(
        "{}/rest/v1/{}?select=created_at,temperature,humidity&order=created_at.desc&limit={}",
        config.url, config.table, config.points
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_asks_for_newest_rows_first() {
        let config = StoreConfig {
            url: "https://db.example.net".to_string(),
            anon_key: "anon".to_string(),
            ..StoreConfig::default()
        };
        assert_eq!(
            query_url(&config),
            "https://db.example.net/rest/v1/sensor_readings?select=created_at,temperature,humidity&order=created_at.desc&limit=150"
        );
    }

    #[test]
    fn missing_key_disables_history() {
        let config = StoreConfig {
            url: "https://db.example.net".to_string(),
            ..StoreConfig::default()
        };
        let source = HistorySource::select(&config, reqwest::Client::new());
        assert!(matches!(source, HistorySource::Disabled));
    }
}
