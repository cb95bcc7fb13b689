use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::azure::{AzureDevOpsClient, DevOpsApi};
use crate::badge::{sink_from_config, BadgeSink, BadgeWriter};
use crate::config::AppConfig;
use crate::pipeline::scheduler::{self, PollerHandle};
use crate::pipeline::Aggregator;
use crate::store::{PreferenceStore, Preferences};

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<PreferenceStore>,
    pub aggregator: Arc<Aggregator>,
    pub poller: PollerHandle,
}

impl AppState {
    /// Wire the Azure DevOps client and the configured badge sink. The
    /// poller starts immediately but idles until the store is loaded.
    pub fn new(config: AppConfig) -> crate::error::Result<Self> {
        let api = Arc::new(AzureDevOpsClient::new(&config.azure)?);
        let sink = sink_from_config(&config.badge);
        Ok(Self::with_api(config, api, sink))
    }

    pub fn with_api(config: AppConfig, api: Arc<dyn DevOpsApi>, sink: Arc<dyn BadgeSink>) -> Self {
        let store = Arc::new(PreferenceStore::new(
            config.storage.path.clone(),
            Preferences::from_config(&config.azure),
        ));
        let badge = BadgeWriter::new(sink, config.badge.debounce());
        let aggregator = Arc::new(Aggregator::new(api, Arc::clone(&store), badge));
        let poller = scheduler::start(Arc::clone(&aggregator), config.poll.clone());

        Self {
            config,
            store,
            aggregator,
            poller,
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/state", get(handlers::raw_state))
        .route("/api/repositories", get(handlers::repositories))
        .route("/api/repositories/:id/toggle", post(handlers::toggle_repository))
        .route(
            "/api/preferences",
            get(handlers::get_preferences).put(handlers::update_preferences),
        )
        .route("/api/preferences/reset", post(handlers::reset_preferences))
        .route("/api/refresh", post(handlers::refresh))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        // The popup is served from the extension's own origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
