use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::pipeline::DashboardState;
use crate::server::AppState;
use crate::store::{Preferences, PreferencesUpdate, SelectionSet};
use crate::view::{repository_checklist, DashboardView, RepositoryRow};

use super::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct RepositoryQuery {
    #[serde(default)]
    pub search: String,
}

pub async fn dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    let snapshot = state.aggregator.snapshot();
    Json(DashboardView::new(&snapshot, &state.store.get()))
}

pub async fn raw_state(State(state): State<Arc<AppState>>) -> Json<DashboardState> {
    Json(state.aggregator.snapshot())
}

pub async fn repositories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RepositoryQuery>,
) -> Json<Vec<RepositoryRow>> {
    let snapshot = state.aggregator.snapshot();
    Json(repository_checklist(
        &snapshot.repositories,
        &query.search,
        &state.store.selection(),
    ))
}

pub async fn toggle_repository(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SelectionSet>, ApiError> {
    Ok(Json(state.store.toggle(&id).await?))
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Preferences>, ApiError> {
    if !state.store.is_ready() {
        return Err(AppError::NotReady.into());
    }
    Ok(Json(state.store.get()))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<Preferences>, ApiError> {
    Ok(Json(state.store.set(update).await?))
}

pub async fn reset_preferences(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Preferences>, ApiError> {
    Ok(Json(state.store.reset().await?))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.poller.refresh_now().await {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
