use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::dashboard::{Dashboard, Selection};
use crate::error::DashboardError;
use crate::models::{CategoryCount, Figure, Granularity};

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
}

pub enum ApiError {
    Dashboard(DashboardError),
    NoChartYet,
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        Self::Dashboard(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Dashboard(err @ DashboardError::InvalidSelection(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Dashboard(err @ DashboardError::DataSourceUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            ApiError::Dashboard(err @ DashboardError::SchemaError(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::NoChartYet => (StatusCode::NOT_FOUND, "no chart rendered yet".to_string()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryCount>,
    pub default: DefaultSelection,
}

#[derive(Debug, Serialize)]
pub struct DefaultSelection {
    pub category: Option<String>,
    pub granularity: Granularity,
}

impl From<Selection> for DefaultSelection {
    fn from(selection: Selection) -> Self {
        Self {
            category: selection.category,
            granularity: selection.granularity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub category: Option<String>,
    pub granularity: Option<String>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/categories", get(get_categories))
        .route("/api/chart", get(get_chart))
        .route("/api/chart/current", get(get_current_chart))
        .with_state(state)
}

pub async fn start_web_server(bind_addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    info!(
        bind_address = %bind_addr,
        dashboard_url = format!("http://{}", bind_addr),
        "Starting web server"
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn get_categories(State(state): State<AppState>) -> Json<CategoriesResponse> {
    let dashboard = &state.dashboard;
    Json(CategoriesResponse {
        categories: dashboard.categories().to_vec(),
        default: dashboard.default_selection().into(),
    })
}

#[instrument(skip(state), name = "api_get_chart")]
async fn get_chart(
    State(state): State<AppState>,
    Query(params): Query<ChartQuery>,
) -> Result<Json<Figure>, ApiError> {
    let category = params.category.ok_or_else(|| {
        DashboardError::InvalidSelection("missing category parameter".to_string())
    })?;
    let granularity = match params.granularity.as_deref() {
        Some(raw) => raw.parse::<Granularity>()?,
        None => Granularity::default(),
    };
    debug!(%category, %granularity, "Rendering chart");

    match state.dashboard.update(&category, granularity).await {
        Ok(chart) => Ok(Json(chart.to_figure())),
        Err(e) => {
            warn!(error = %e, "Chart update failed");
            Err(e.into())
        }
    }
}

async fn get_current_chart(State(state): State<AppState>) -> Result<Json<Figure>, ApiError> {
    state
        .dashboard
        .current()
        .await
        .map(|chart| Json(chart.to_figure()))
        .ok_or(ApiError::NoChartYet)
}
