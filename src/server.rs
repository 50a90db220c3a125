use crate::config::AppConfig;
use crate::error::QueryError;
use crate::store::SalesStore;
use crate::types::SalesRecord;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

pub struct AppState {
    pub store: SalesStore,
}

/// Store failures surface as a bare 500.
pub struct ApiError(QueryError);

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "sales query failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

pub fn router(store: SalesStore, static_dir: &std::path::Path) -> Router {
    let state = Arc::new(AppState { store });

    Router::new()
        .route("/years", get(years_handler))
        .route("/sales/:year", get(sales_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, store: SalesStore) -> Result<()> {
    match store.table_names().await {
        Ok(tables) => info!(?tables, "connected to sales database"),
        Err(err) => error!(error = %err, "failed to list database tables"),
    }

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let app = router(store, &config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Serving sales API on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn years_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<i32>>, ApiError> {
    Ok(Json(state.store.list_years().await?))
}

async fn sales_handler(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> Result<Json<Vec<SalesRecord>>, ApiError> {
    Ok(Json(state.store.list_sales(year).await?))
}
