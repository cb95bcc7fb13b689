//! Repository refresh and pull request aggregation.
//!
//! Each refresh takes a monotonically increasing cycle number when it starts
//! and only publishes if no newer cycle of the same kind has started since.
//! Publishing is a single update of the shared [`DashboardState`], so readers
//! never observe a half-built result.

pub mod scheduler;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::azure::types::{ApiList, PullRequest, Repository};
use crate::azure::DevOpsApi;
use crate::badge::{badge_text, BadgeWriter};
use crate::error::AppError;
use crate::store::PreferenceStore;

/// Open pull requests of one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestGroup {
    /// Repository name as embedded in the pull requests themselves.
    pub title: String,
    pub data: Vec<PullRequest>,
}

impl PullRequestGroup {
    /// `None` when the repository has no active pull requests.
    pub fn from_list(list: ApiList<PullRequest>) -> Option<Self> {
        let title = list.value.first()?.repository.name.clone();
        Some(Self {
            title,
            data: list.value,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Auth,
    Network,
    Config,
}

/// The error banner shown above the repository list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AppError> for FetchError {
    fn from(e: &AppError) -> Self {
        let kind = match e {
            AppError::Auth(_) => ErrorKind::Auth,
            AppError::Config(_) => ErrorKind::Config,
            _ => ErrorKind::Network,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

/// Everything the front end renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub repositories: Vec<Repository>,
    pub groups: Vec<PullRequestGroup>,
    pub total: usize,
    pub error: Option<FetchError>,
    /// Cycle number of the aggregation that produced `groups`.
    pub cycle: u64,
    pub repositories_refreshed_at: Option<DateTime<Utc>>,
    pub pull_requests_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Results were published. `total` is the repository count for a
    /// repository refresh and the open pull request count for aggregation.
    Published { cycle: u64, total: usize },
    /// The fetch failed and the error banner was published.
    Failed { cycle: u64, kind: ErrorKind },
    /// The preference store has not finished loading; nothing was touched.
    NotReady,
    /// Organization or project is missing; nothing was fetched.
    Misconfigured,
    /// A newer cycle started while this one was in flight; its result was dropped.
    Superseded { cycle: u64 },
}

pub struct Aggregator {
    api: Arc<dyn DevOpsApi>,
    store: Arc<PreferenceStore>,
    badge: BadgeWriter,
    state: watch::Sender<DashboardState>,
    repository_cycles: AtomicU64,
    pull_request_cycles: AtomicU64,
}

impl Aggregator {
    pub fn new(api: Arc<dyn DevOpsApi>, store: Arc<PreferenceStore>, badge: BadgeWriter) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            api,
            store,
            badge,
            state,
            repository_cycles: AtomicU64::new(0),
            pull_request_cycles: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<PreferenceStore> {
        &self.store
    }

    pub fn badge(&self) -> &BadgeWriter {
        &self.badge
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    /// Refresh the repository list. Failures set the error banner and keep
    /// the previous list.
    pub async fn refresh_repositories(&self) -> CycleOutcome {
        if !self.store.is_ready() {
            tracing::debug!("Skipping repository refresh, preferences not loaded");
            return CycleOutcome::NotReady;
        }

        let cycle = self.repository_cycles.fetch_add(1, Ordering::SeqCst) + 1;

        let scope = match self.store.get().scope() {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping repository refresh");
                let banner = FetchError::from(&e);
                let published = self.publish_if_current(&self.repository_cycles, cycle, |state| {
                    state.error = Some(banner);
                });
                return if published {
                    CycleOutcome::Misconfigured
                } else {
                    CycleOutcome::Superseded { cycle }
                };
            }
        };

        let started = Instant::now();
        let result = self.api.list_repositories(&scope).await;

        match result {
            Ok(list) => {
                let count = list.value.len();
                let published = self.publish_if_current(&self.repository_cycles, cycle, |state| {
                    state.repositories = list.value;
                    state.error = None;
                    state.repositories_refreshed_at = Some(Utc::now());
                });
                if !published {
                    tracing::debug!(cycle, "Discarding superseded repository refresh");
                    return CycleOutcome::Superseded { cycle };
                }

                tracing::info!(
                    cycle,
                    count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Repositories refreshed"
                );
                CycleOutcome::Published { cycle, total: count }
            }
            Err(e) => {
                let banner = FetchError::from(&e);
                let kind = banner.kind;
                let published = self.publish_if_current(&self.repository_cycles, cycle, |state| {
                    state.error = Some(banner);
                });
                if !published {
                    return CycleOutcome::Superseded { cycle };
                }

                tracing::error!(cycle, error = %e, "Failed to list repositories");
                CycleOutcome::Failed { cycle, kind }
            }
        }
    }

    /// Run one aggregation cycle over the current selection.
    pub async fn refresh_pull_requests(&self) -> CycleOutcome {
        if !self.store.is_ready() {
            tracing::debug!("Skipping aggregation, preferences not loaded");
            return CycleOutcome::NotReady;
        }

        // Taken before the scope check so a misconfigured cycle still
        // supersedes any cycle in flight for the previous project
        let cycle = self.pull_request_cycles.fetch_add(1, Ordering::SeqCst) + 1;

        let scope = match self.store.get().scope() {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!(cycle, error = %e, "Skipping aggregation");
                return CycleOutcome::Misconfigured;
            }
        };

        let selection = self.store.selection();
        let started = Instant::now();

        tracing::debug!(cycle, repositories = selection.len(), "Aggregation started");

        let api = &self.api;
        let scope = &scope;
        let mut fetches: FuturesUnordered<_> = selection
            .iter()
            .map(|id| async move { (id, api.list_active_pull_requests(scope, id).await) })
            .collect();

        // Groups keep the order their fetches settle in
        let mut groups = Vec::new();
        while let Some((repository_id, result)) = fetches.next().await {
            match result {
                Ok(list) => {
                    if let Some(group) = PullRequestGroup::from_list(list) {
                        groups.push(group);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        cycle,
                        repository = repository_id,
                        error = %e,
                        "Failed to fetch pull requests, omitting repository"
                    );
                }
            }
        }

        let total: usize = groups.iter().map(|g| g.data.len()).sum();
        let group_count = groups.len();

        let published = self.publish_if_current(&self.pull_request_cycles, cycle, |state| {
            state.groups = groups;
            state.total = total;
            state.cycle = cycle;
            state.pull_requests_refreshed_at = Some(Utc::now());
            // Badge updates are ordered with the state they describe
            self.badge.publish(&badge_text(total));
        });
        if !published {
            tracing::debug!(cycle, "Discarding superseded aggregation");
            return CycleOutcome::Superseded { cycle };
        }

        tracing::info!(
            cycle,
            groups = group_count,
            total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pull requests aggregated"
        );
        CycleOutcome::Published { cycle, total }
    }

    /// Apply `update` unless a newer cycle tracked by `counter` has started.
    fn publish_if_current<F>(&self, counter: &AtomicU64, cycle: u64, update: F) -> bool
    where
        F: FnOnce(&mut DashboardState),
    {
        self.state.send_if_modified(|state| {
            if counter.load(Ordering::SeqCst) != cycle {
                return false;
            }
            update(state);
            true
        })
    }
}
