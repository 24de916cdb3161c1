use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::types::{lenient_f32, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct StoreRow {
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_f32")]
    temperature: Option<f32>,
    #[serde(default, deserialize_with = "lenient_f32")]
    humidity: Option<f32>,
}

/// Parses store rows (newest first) into an ascending series. Rows without a
/// usable timestamp are dropped.
pub fn parse_store_rows(body: &[u8]) -> Result<Vec<HistoryPoint>, serde_json::Error> {
    let rows: Vec<StoreRow> = serde_json::from_slice(body)?;
    let mut points: Vec<HistoryPoint> = rows
        .into_iter()
        .rev()
        .filter_map(|row| {
            let timestamp = row.created_at.as_deref().and_then(parse_timestamp)?;
            Some(HistoryPoint {
                timestamp,
                temperature: row.temperature,
                humidity: row.humidity,
            })
        })
        .collect();
    points.sort_by_key(|point| point.timestamp);
    Ok(points)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub temperature: Vec<Option<f32>>,
    pub humidity: Vec<Option<f32>>,
}

impl ChartSeries {
    pub fn from_points(points: &[HistoryPoint], timezone: Tz) -> Self {
        Self {
            labels: points
                .iter()
                .map(|point| {
                    point
                        .timestamp
                        .with_timezone(&timezone)
                        .format("%H:%M")
                        .to_string()
                })
                .collect(),
            temperature: points.iter().map(|point| point.temperature).collect(),
            humidity: points.iter().map(|point| point.humidity).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
