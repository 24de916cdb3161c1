use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::ComponentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagramNodes {
    pub device: ComponentStatus,
    pub server: ComponentStatus,
    pub store: ComponentStatus,
    pub client: ComponentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DiagramEdges {
    pub device_to_server: bool,
    pub server_to_device: bool,
    pub server_to_store: bool,
    pub server_to_client: bool,
    pub client_to_server: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagramState {
    pub nodes: DiagramNodes,
    pub edges: DiagramEdges,
}

impl DiagramState {
    pub fn offline() -> Self {
        project(
            ComponentStatus::Offline,
            ComponentStatus::Offline,
            ComponentStatus::Degraded,
            None,
            Utc::now(),
            Duration::seconds(120),
        )
    }
}

pub fn is_fresh(timestamp: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(timestamp) < window
}

pub fn project(
    device: ComponentStatus,
    server: ComponentStatus,
    store: ComponentStatus,
    last_reading: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    freshness_window: Duration,
) -> DiagramState {
    let device_online = device.is_online();
    let server_online = server.is_online();

    let data_flowing = device_online
        && server_online
        && last_reading.is_some_and(|timestamp| is_fresh(timestamp, now, freshness_window));

    DiagramState {
        nodes: DiagramNodes {
            device,
            server,
            store,
            client: ComponentStatus::Online,
        },
        edges: DiagramEdges {
            device_to_server: data_flowing,
            server_to_device: server_online && device_online,
            server_to_store: data_flowing && store.is_online(),
            server_to_client: server_online,
            client_to_server: server_online,
        },
    }
}
