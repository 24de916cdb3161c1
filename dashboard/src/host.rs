use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{watch, Mutex},
    time::MissedTickBehavior,
};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use fan_dashboard_common::{
    ConfigUpdateRequest, ControlField, DashboardController, Debounce, ManualFanCommand, PollKind,
    RuntimeConfig,
};

use crate::{api::ApiClient, history_source::HistorySource, poller};

#[derive(Clone)]
struct AppState {
    dashboard: Arc<Mutex<DashboardController>>,
    api: ApiClient,
    history: Arc<HistorySource>,
    refresh: Arc<Mutex<Debounce>>,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct FocusUpdate {
    #[serde(default)]
    field: Option<ControlField>,
}

#[derive(Debug, Deserialize)]
struct ConfigUpdateBody {
    threshold: f32,
    brightness: u8,
}

#[derive(Debug, Deserialize)]
struct ManualBody {
    active: bool,
    state: bool,
}

#[derive(Debug, Deserialize)]
struct ManualModeBody {
    active: bool,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    #[serde(rename = "pendingMs")]
    pending_ms: u64,
}

const REFRESH_CHECK_MS: u64 = 100;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime, |key| std::env::var(key).ok());
    runtime.sanitize();

    if runtime.timezone.parse::<chrono_tz::Tz>().is_err() {
        warn!("unknown timezone {:?}, falling back to UTC", runtime.timezone);
        runtime.timezone = "UTC".to_string();
    }
    runtime
        .validate()
        .context("invalid dashboard runtime configuration")?;

    let api = ApiClient::new(&runtime.api).context("failed to build api client")?;
    let history = HistorySource::select(&runtime.store, api.http().clone());

    let app_state = AppState {
        dashboard: Arc::new(Mutex::new(DashboardController::new(&runtime))),
        api,
        history: Arc::new(history),
        refresh: Arc::new(Mutex::new(Debounce::new(
            runtime.ui.history_refresh_debounce_ms,
        ))),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_status_loop(
        app_state.clone(),
        runtime.polling.status_interval_ms,
        shutdown_rx.clone(),
    );
    spawn_history_loop(
        app_state.clone(),
        runtime.polling.history_interval_ms,
        runtime.polling.history_initial_delay_ms,
        shutdown_rx.clone(),
    );
    spawn_tick_loop(
        app_state.clone(),
        runtime.animation.tick_ms,
        shutdown_rx,
    );

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = Router::new()
        .route("/api/view", get(handle_get_view))
        .route("/api/ring", get(handle_get_ring))
        .route("/api/focus", post(handle_set_focus))
        .route("/api/config", post(handle_update_config))
        .route("/api/manual", post(handle_set_manual))
        .route("/api/manual/mode", post(handle_set_manual_mode))
        .route("/api/history/refresh", post(handle_refresh_history))
        .fallback_service(ServeDir::new(web_root))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard server at {addr}"))?;

    info!(api = %runtime.api.base_url, "dashboard listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
            }
            info!("shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;
    Ok(())
}

fn apply_env_overrides(runtime: &mut RuntimeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("DASHBOARD_API_URL") {
        runtime.api.base_url = url;
    }
    if let Some(url) = lookup("DASHBOARD_STORE_URL") {
        runtime.store.url = url;
    }
    if let Some(key) = lookup("DASHBOARD_STORE_KEY") {
        runtime.store.anon_key = key;
    }
    if let Some(port) = lookup("DASHBOARD_HTTP_PORT").and_then(|value| value.parse::<u16>().ok())
    {
        runtime.http_port = port;
    }
    if let Some(timezone) = lookup("DASHBOARD_TIMEZONE") {
        runtime.timezone = timezone;
    }
}

fn spawn_status_loop(app_state: AppState, interval_ms: u64, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            // Spawned so a slow server never holds up the next firing.
            let state = app_state.clone();
            tokio::spawn(async move { run_status_poll(&state).await });
        }
        debug!("status loop stopped");
    });
}

fn spawn_history_loop(
    app_state: AppState,
    interval_ms: u64,
    initial_delay_ms: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + Duration::from_millis(initial_delay_ms);
        let mut interval = tokio::time::interval_at(start, Duration::from_millis(interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refresh_check = tokio::time::interval(Duration::from_millis(REFRESH_CHECK_MS));

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = refresh_check.tick() => {
                    let due = app_state.refresh.lock().await.fire_if_due(monotonic_ms());
                    if !due {
                        continue;
                    }
                    info!("manual history refresh");
                }
                _ = shutdown.changed() => break,
            }

            let state = app_state.clone();
            tokio::spawn(async move { run_history_poll(&state).await });
        }
        debug!("history loop stopped");
    });
}

fn spawn_tick_loop(app_state: AppState, tick_ms: u64, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            let mut dashboard = app_state.dashboard.lock().await;
            dashboard.tick();
        }
        debug!("tick loop stopped");
    });
}

async fn run_status_poll(app_state: &AppState) {
    let (token, issued_at) = {
        let mut dashboard = app_state.dashboard.lock().await;
        (dashboard.begin_poll(PollKind::Status), Utc::now())
    };

    let snapshot = poller::poll_status(&app_state.api).await;

    let mut dashboard = app_state.dashboard.lock().await;
    if !dashboard.apply_status(token, issued_at, snapshot, Utc::now()) {
        debug!(token = token.sequence(), "dropped superseded status response");
    }
}

async fn run_history_poll(app_state: &AppState) {
    let token = {
        let mut dashboard = app_state.dashboard.lock().await;
        dashboard.begin_poll(PollKind::History)
    };

    let outcome = poller::poll_history(&app_state.history).await;

    let mut dashboard = app_state.dashboard.lock().await;
    if !dashboard.apply_history(token, outcome) {
        debug!(token = token.sequence(), "dropped superseded history response");
    }
}

async fn handle_get_view(State(state): State<AppState>) -> impl IntoResponse {
    let dashboard = state.dashboard.lock().await;
    Json(dashboard.view(Utc::now()))
}

async fn handle_get_ring(State(state): State<AppState>) -> impl IntoResponse {
    let dashboard = state.dashboard.lock().await;
    match dashboard.last_frame() {
        Some(frame) => Json(frame.clone()).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "Ring not rendered yet"),
    }
}

async fn handle_set_focus(
    State(state): State<AppState>,
    Json(update): Json<FocusUpdate>,
) -> impl IntoResponse {
    state.dashboard.lock().await.set_focus(update.field);
    handle_get_view(State(state)).await.into_response()
}

async fn handle_update_config(
    State(state): State<AppState>,
    Json(body): Json<ConfigUpdateBody>,
) -> impl IntoResponse {
    if !body.threshold.is_finite() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid input.");
    }

    state
        .dashboard
        .lock()
        .await
        .begin_config_update(Utc::now());

    let request = ConfigUpdateRequest {
        threshold: body.threshold,
        brightness: body.brightness,
    };
    let result = state.api.update_config(request).await;

    let failure = {
        let mut dashboard = state.dashboard.lock().await;
        match result {
            Ok(applied) => {
                info!(?applied, "config update applied");
                dashboard.finish_config_update(Ok(applied), Utc::now());
                None
            }
            Err(err) => {
                warn!("config update failed: {err}");
                let message = err.to_string();
                dashboard.finish_config_update(Err(err.into_failure()), Utc::now());
                Some(message)
            }
        }
    };

    match failure {
        Some(message) => error_response(StatusCode::BAD_GATEWAY, &message),
        None => handle_get_view(State(state)).await.into_response(),
    }
}

async fn handle_set_manual(
    State(state): State<AppState>,
    Json(body): Json<ManualBody>,
) -> impl IntoResponse {
    let command = ManualFanCommand {
        active: body.active,
        state: body.state,
    };
    send_manual_command(state, command).await
}

async fn handle_set_manual_mode(
    State(state): State<AppState>,
    Json(body): Json<ManualModeBody>,
) -> impl IntoResponse {
    let command = {
        let mut dashboard = state.dashboard.lock().await;
        // The toggle is done being edited once its change is submitted.
        if dashboard.focused() == Some(ControlField::ManualModeToggle) {
            dashboard.set_focus(None);
        }
        dashboard.manual_toggle_command(body.active)
    };
    send_manual_command(state, command).await
}

async fn send_manual_command(state: AppState, command: ManualFanCommand) -> axum::response::Response {
    state
        .dashboard
        .lock()
        .await
        .begin_manual_command(Utc::now());

    let result = state.api.set_fan_manual(command).await;

    let failure = {
        let mut dashboard = state.dashboard.lock().await;
        match result {
            Ok(applied) => {
                info!(?command, ?applied, "manual fan command applied");
                dashboard.finish_manual_command(Ok(applied), Utc::now());
                None
            }
            Err(err) => {
                warn!("manual fan command failed: {err}");
                let message = err.to_string();
                dashboard.finish_manual_command(Err(err.into_failure()), Utc::now());
                Some(message)
            }
        }
    };

    match failure {
        Some(message) => error_response(StatusCode::BAD_GATEWAY, &message),
        None => handle_get_view(State(state)).await.into_response(),
    }
}

async fn handle_refresh_history(State(state): State<AppState>) -> impl IntoResponse {
    let now_ms = monotonic_ms();
    let mut refresh = state.refresh.lock().await;
    refresh.trigger(now_ms);

    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            pending_ms: refresh.remaining_ms(now_ms).unwrap_or(0),
        }),
    )
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("DASHBOARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.dashboard"));

        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let path = self.runtime_path.as_ref();
        match tokio::fs::read(path).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("failed to parse {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
