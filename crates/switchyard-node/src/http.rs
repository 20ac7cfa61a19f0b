//! Diagnostics HTTP endpoint.
//!
//! - `GET /health`: liveness and version
//! - `GET /topics`: the bus report against the topic registry
//! - `GET /stats`: bus and gateway counters
//! - `GET /inputs`: configured operator inputs

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use crate::input::{InputCatalog, InputService};
use std::sync::Arc;
use switchyard_core::{BusReport, BusStats, TopicBus, TopicRegistry};
use switchyard_gateway::{GatewayStats, GatewayStatsSnapshot};
use tokio::net::TcpListener;
use tracing::info;

/// Shared diagnostics state.
pub struct AppState {
    pub bus: Arc<TopicBus>,
    pub registry: Arc<TopicRegistry>,
    pub inputs: Arc<InputService>,
    pub gateway: Option<Arc<GatewayStats>>,
}

/// Body of `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub bus: BusStats,
    pub gateway: Option<GatewayStatsSnapshot>,
}

/// Build the diagnostics router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/topics", get(topics_handler))
        .route("/stats", get(stats_handler))
        .route("/inputs", get(inputs_handler))
        .with_state(state)
}

/// Serve diagnostics on `addr` until the task is dropped.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Diagnostics listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn topics_handler(State(state): State<Arc<AppState>>) -> Json<BusReport> {
    Json(state.bus.report(&state.registry))
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        bus: state.bus.stats(),
        gateway: state.gateway.as_ref().map(|stats| stats.snapshot()),
    })
}

async fn inputs_handler(State(state): State<Arc<AppState>>) -> Json<InputCatalog> {
    Json(state.inputs.catalog())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputSection;
    use crate::topics::{self, DriveInput};

    fn state() -> Arc<AppState> {
        let mut registry = TopicRegistry::new();
        topics::register(&mut registry).unwrap();

        let bus = Arc::new(TopicBus::new());
        bus.subscribe_fn(|_: &DriveInput| Ok(()));

        Arc::new(AppState {
            bus,
            registry: Arc::new(registry),
            inputs: Arc::new(InputService::new(InputSection::default())),
            gateway: Some(Arc::new(GatewayStats::default())),
        })
    }

    #[tokio::test]
    async fn test_topics_report() {
        let Json(report) = topics_handler(State(state())).await;
        let names: Vec<_> = report.topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "DriveInput",
                "GamepadButtonInput",
                "GamepadJoystickInput",
                "GamepadTriggerInput",
                "KeyboardInput",
                "LocomotionInput",
                "PositionUpdate"
            ]
        );
        assert_eq!(report.topics[0].subscribers, 1);
        assert!(report.unregistered.is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let state = state();
        state.bus.publish(DriveInput::default()).await.unwrap();

        let Json(stats) = stats_handler(State(state)).await;
        assert_eq!(stats.bus.dispatched, 1);
        assert_eq!(stats.bus.subscribers, 1);
        assert_eq!(stats.gateway, Some(GatewayStatsSnapshot::default()));
    }

    #[tokio::test]
    async fn test_inputs() {
        let Json(inputs) = inputs_handler(State(state())).await;
        assert_eq!(inputs.keyboard["kill_switch"], "Space");
        assert!(inputs.gamepad.is_empty());
    }

    #[tokio::test]
    async fn test_serve_health() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, router(state())).await.unwrap();
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"ok\""));
        server.abort();
    }
}
