use std::net::SocketAddr;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use log::info;

use crate::errors::{DashboardError, DashboardResult};
use crate::render::{render_html, SharedFrame};

/// Routes over the latest mounted frame
pub fn router(frame: SharedFrame) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/frame", get(frame_handler))
        .route("/api/polling", get(polling_handler))
        .with_state(frame)
}

/// Start the dashboard server
pub async fn start_server(frame: SharedFrame, host: &str, port: u16) -> DashboardResult<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| DashboardError::Config(format!("invalid server address {}:{}: {}", host, port, e)))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DashboardError::Network(format!("cannot bind {}: {}", addr, e)))?;
    info!("Dashboard server running on http://{}", addr);

    axum::serve(listener, router(frame))
        .await
        .map_err(|e| DashboardError::Network(e.to_string()))
}

fn not_ready() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Loading market data...").into_response()
}

async fn dashboard_handler(State(frame): State<SharedFrame>) -> Response {
    match frame.latest().await {
        Some(frame) => Html(render_html(&frame)).into_response(),
        None => not_ready(),
    }
}

async fn frame_handler(State(frame): State<SharedFrame>) -> Response {
    match frame.latest().await {
        Some(frame) => Json(frame).into_response(),
        None => not_ready(),
    }
}

async fn polling_handler(State(frame): State<SharedFrame>) -> Response {
    match frame.latest().await {
        Some(frame) => Json(frame.polling).into_response(),
        None => not_ready(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardState;
    use crate::polling::PollingScheduler;
    use crate::pyramid::{PyramidStyle, Timeframe};
    use crate::render::RenderSink;

    async fn get(addr: SocketAddr, path: &str) -> (u16, String) {
        let response = reqwest::get(format!("http://{}{}", addr, path)).await.unwrap();
        (response.status().as_u16(), response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_routes_serve_latest_frame() {
        let frame = SharedFrame::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(frame.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (status, _) = get(addr, "/api/frame").await;
        assert_eq!(status, 503);

        let mut writer = frame.clone();
        let state = DashboardState::new("EUR/USD", PyramidStyle::Daily, Timeframe::H1);
        writer.mount(&state.frame(PollingScheduler::default().status())).await;

        let (status, body) = get(addr, "/api/polling").await;
        assert_eq!(status, 200);
        let polling: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(polling["mode"], "NORMAL");
        assert_eq!(polling["current_interval_ms"], 30000);

        let (status, body) = get(addr, "/").await;
        assert_eq!(status, 200);
        assert!(body.contains("EUR/USD - Flowz Dashboard"));
    }

    #[tokio::test]
    async fn test_bad_address_is_config_error() {
        let err = start_server(SharedFrame::new(), "not a host", 3000).await.unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }
}
