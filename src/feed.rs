//! Backend data feed - enables mocking for tests

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::chart::{ChartRequest, PriceSeries};
use crate::errors::{DashboardError, DashboardResult};
use crate::pyramid::{BlockTreeSnapshot, PyramidStyle};

/// What the pyramid endpoint is asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidQuery {
    pub pair: String,
    pub style: PyramidStyle,
}

impl PyramidQuery {
    pub fn new(pair: impl Into<String>, style: PyramidStyle) -> Self {
        Self {
            pair: pair.into(),
            style,
        }
    }

    /// Pair as the backend settings expect it: `EUR/USD` -> `EURUSD`
    pub fn symbol(&self) -> String {
        self.pair.replace('/', "")
    }
}

/// Backend operations the dashboard depends on
#[async_trait]
pub trait DashboardFeed: Send + Sync {
    /// Current block pyramid for the pair and style
    async fn fetch_dashboard_data(&self, query: &PyramidQuery) -> DashboardResult<BlockTreeSnapshot>;

    /// Price series with indicator output for the chart
    async fn fetch_chart_series(&self, request: &ChartRequest) -> DashboardResult<PriceSeries>;

    /// Tell the backend which pair and style to compute
    async fn update_backend_settings(&self, query: &PyramidQuery) -> DashboardResult<()>;
}

// ============================================================================
// HTTP Implementation
// ============================================================================

#[derive(Debug, Serialize)]
struct SettingsUpdate<'a> {
    symbol: String,
    pyramid_style: &'a str,
}

/// Feed backed by the dashboard's HTTP API
pub struct HttpDashboardFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDashboardFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DashboardResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_text(&self, path: &str, query: &[(String, String)]) -> DashboardResult<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Network(format!("HTTP {} from {}", status, path)));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl DashboardFeed for HttpDashboardFeed {
    async fn fetch_dashboard_data(&self, query: &PyramidQuery) -> DashboardResult<BlockTreeSnapshot> {
        let params = vec![
            ("pair".to_string(), query.pair.clone()),
            ("pyramid_style".to_string(), query.style.to_string()),
        ];
        let body = self.get_text("/api/pyramid", &params).await?;
        BlockTreeSnapshot::from_json(&body)
    }

    async fn fetch_chart_series(&self, request: &ChartRequest) -> DashboardResult<PriceSeries> {
        let body = self.get_text(&request.path(), &request.query_pairs()).await?;
        PriceSeries::from_json(&body)
    }

    async fn update_backend_settings(&self, query: &PyramidQuery) -> DashboardResult<()> {
        let payload = SettingsUpdate {
            symbol: query.symbol(),
            pyramid_style: query.style.as_str(),
        };
        let url = format!("{}/api/update-settings", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_string(&payload)?)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Network(format!("HTTP {} from /api/update-settings", status)));
        }

        let reply: serde_json::Value = serde_json::from_str(&response.text().await?)?;
        match reply.get("status").and_then(|s| s.as_str()) {
            Some("success") => {
                debug!(
                    "Backend settings updated: {}",
                    reply.get("message").and_then(|m| m.as_str()).unwrap_or("")
                );
                Ok(())
            }
            _ => Err(DashboardError::MalformedData(format!(
                "settings update rejected: {}",
                reply.get("error").map(|e| e.to_string()).unwrap_or_else(|| reply.to_string())
            ))),
        }
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Mock feed for exercising the runtime without a backend.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Mock feed serving a settable snapshot and recording every call
    #[derive(Clone, Default)]
    pub struct MockFeed {
        pub snapshot: Arc<Mutex<BlockTreeSnapshot>>,
        pub series: Arc<Mutex<PriceSeries>>,
        pub queries: Arc<Mutex<Vec<PyramidQuery>>>,
        pub chart_requests: Arc<Mutex<Vec<ChartRequest>>>,
        pub settings_updates: Arc<Mutex<Vec<PyramidQuery>>>,
        pub should_fail: Arc<Mutex<bool>>,
        fetches: Arc<AtomicUsize>,
    }

    impl MockFeed {
        pub fn new(snapshot: BlockTreeSnapshot) -> Self {
            Self {
                snapshot: Arc::new(Mutex::new(snapshot)),
                ..Self::default()
            }
        }

        pub async fn set_snapshot(&self, snapshot: BlockTreeSnapshot) {
            *self.snapshot.lock().await = snapshot;
        }

        pub async fn set_series(&self, series: PriceSeries) {
            *self.series.lock().await = series;
        }

        pub async fn set_should_fail(&self, fail: bool) {
            *self.should_fail.lock().await = fail;
        }

        /// Number of dashboard fetches served or failed so far
        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DashboardFeed for MockFeed {
        async fn fetch_dashboard_data(&self, query: &PyramidQuery) -> DashboardResult<BlockTreeSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().await.push(query.clone());
            if *self.should_fail.lock().await {
                return Err(DashboardError::Network("Mock failure".into()));
            }
            Ok(self.snapshot.lock().await.clone())
        }

        async fn fetch_chart_series(&self, request: &ChartRequest) -> DashboardResult<PriceSeries> {
            self.chart_requests.lock().await.push(request.clone());
            if *self.should_fail.lock().await {
                return Err(DashboardError::Network("Mock failure".into()));
            }
            Ok(self.series.lock().await.clone())
        }

        async fn update_backend_settings(&self, query: &PyramidQuery) -> DashboardResult<()> {
            self.settings_updates.lock().await.push(query.clone());
            Ok(())
        }
    }
}
