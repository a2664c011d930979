// src/server.rs
//! HTTP boundary: one GET route per extraction domain, always answering with JSON.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::extractors::league_odds::LeagueOddsExtractor;
use crate::extractors::league_tables::LeagueTablesExtractor;
use crate::extractors::news::NewsExtractor;
use crate::extractors::odds_board::OddsBoardExtractor;
use crate::fetch::PageFetcher;
use crate::pipeline::{self, Pipeline};
use crate::utils::AppError;

pub const ROUTE_LEAGUE_ODDS: &str = "/raspar-cuotas-liga";
pub const ROUTE_NEWS: &str = "/raspar-noticias-relevo";
pub const ROUTE_LEAGUE_TABLES: &str = "/raspar-tablas-liga";
pub const ROUTE_ODDS_BOARD: &str = "/raspar-cuotas-generales-transfermarkt";

/// The four configured extraction domains.
#[derive(Debug, Clone, Default)]
pub struct Pipelines {
    pub league_odds: LeagueOddsExtractor,
    pub news: NewsExtractor,
    pub league_tables: LeagueTablesExtractor,
    pub odds_board: OddsBoardExtractor,
}

/// Application state shared across handlers.
pub struct AppState {
    pub fetcher: PageFetcher,
    pub pipelines: Pipelines,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route(ROUTE_LEAGUE_ODDS, get(league_odds))
        .route(ROUTE_NEWS, get(news))
        .route(ROUTE_LEAGUE_TABLES, get(league_tables))
        .route(ROUTE_ODDS_BOARD, get(odds_board))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting server on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Bienvenido a la API Unificada de Scrapers",
        "rutas_disponibles": [ROUTE_LEAGUE_ODDS, ROUTE_NEWS, ROUTE_LEAGUE_TABLES, ROUTE_ODDS_BOARD],
    }))
}

async fn league_odds(State(state): State<Arc<AppState>>) -> Response {
    respond(&state.pipelines.league_odds, &state.fetcher).await
}

async fn news(State(state): State<Arc<AppState>>) -> Response {
    respond(&state.pipelines.news, &state.fetcher).await
}

async fn league_tables(State(state): State<Arc<AppState>>) -> Response {
    respond(&state.pipelines.league_tables, &state.fetcher).await
}

async fn odds_board(State(state): State<Arc<AppState>>) -> Response {
    respond(&state.pipelines.odds_board, &state.fetcher).await
}

async fn respond<P: Pipeline>(pipeline: &P, fetcher: &PageFetcher) -> Response {
    let report = pipeline::run(pipeline, fetcher).await;
    tracing::debug!("{}: responding from state {:?} ({} skipped)", pipeline.name(), report.state, report.skipped);
    let status = StatusCode::from_u16(report.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(report)).into_response()
}
