//! Fakes shared by the unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::azure::types::*;
use crate::azure::{DevOpsApi, ProjectScope};
use crate::badge::BadgeSink;
use crate::error::{AppError, Result};
use crate::pipeline::{Aggregator, DashboardState};
use crate::store::Preferences;

pub fn preferences() -> Preferences {
    Preferences {
        organization: "contoso".to_string(),
        project_name: "Fabrikam".to_string(),
        board_name: "Fabrikam Team".to_string(),
    }
}

pub fn repository(id: &str, name: &str) -> Repository {
    Repository {
        id: id.to_string(),
        name: name.to_string(),
        url: format!("https://dev.azure.com/contoso/_apis/git/repositories/{id}"),
        default_branch: Some("refs/heads/main".to_string()),
        project: Some(ProjectRef {
            id: "project-1".to_string(),
            name: "Fabrikam".to_string(),
        }),
        is_disabled: false,
    }
}

pub fn pull_request(id: u64, repository_name: &str) -> PullRequest {
    PullRequest {
        pull_request_id: id,
        title: format!("Change #{id}"),
        source_ref_name: format!("refs/heads/feature/{id}"),
        target_ref_name: "refs/heads/main".to_string(),
        created_by: IdentityRef {
            display_name: "Ada Lovelace".to_string(),
            image_url: Some("https://example.com/ada.png".to_string()),
            links: None,
        },
        reviewers: Vec::new(),
        repository: RepositoryRef {
            id: format!("{repository_name}-id"),
            name: repository_name.to_string(),
        },
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Auth,
    Network,
}

impl Failure {
    fn error(self) -> AppError {
        match self {
            Failure::Auth => AppError::Auth("status 203".to_string()),
            Failure::Network => AppError::Network("connection reset".to_string()),
        }
    }
}

/// In-memory Azure DevOps with scripted answers.
#[derive(Default)]
pub struct FakeApi {
    repositories: Mutex<Vec<Repository>>,
    repositories_failure: Mutex<Option<Failure>>,
    pull_requests: Mutex<HashMap<String, Vec<PullRequest>>>,
    failing_repositories: Mutex<HashSet<String>>,
    pull_request_calls: Mutex<Vec<String>>,
    repository_calls: AtomicUsize,
}

impl FakeApi {
    pub fn with_repositories(self, repositories: Vec<Repository>) -> Self {
        *self.repositories.lock().unwrap() = repositories;
        self
    }

    pub fn with_pull_requests(self, repository_id: &str, prs: Vec<PullRequest>) -> Self {
        self.pull_requests
            .lock()
            .unwrap()
            .insert(repository_id.to_string(), prs);
        self
    }

    pub fn with_failing_repository(self, repository_id: &str) -> Self {
        self.failing_repositories
            .lock()
            .unwrap()
            .insert(repository_id.to_string());
        self
    }

    pub fn fail_repositories(&self, failure: Option<Failure>) {
        *self.repositories_failure.lock().unwrap() = failure;
    }

    pub fn pull_request_calls(&self) -> Vec<String> {
        self.pull_request_calls.lock().unwrap().clone()
    }

    pub fn repository_calls(&self) -> usize {
        self.repository_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DevOpsApi for FakeApi {
    async fn list_repositories(&self, _scope: &ProjectScope) -> Result<ApiList<Repository>> {
        self.repository_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.repositories_failure.lock().unwrap() {
            return Err(failure.error());
        }
        Ok(ApiList::new(self.repositories.lock().unwrap().clone()))
    }

    async fn list_active_pull_requests(
        &self,
        _scope: &ProjectScope,
        repository_id: &str,
    ) -> Result<ApiList<PullRequest>> {
        self.pull_request_calls
            .lock()
            .unwrap()
            .push(repository_id.to_string());
        if self.failing_repositories.lock().unwrap().contains(repository_id) {
            return Err(Failure::Network.error());
        }
        let prs = self
            .pull_requests
            .lock()
            .unwrap()
            .get(repository_id)
            .cloned()
            .unwrap_or_default();
        Ok(ApiList::new(prs))
    }
}

/// Badge sink that remembers every write.
#[derive(Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingSink {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BadgeSink for RecordingSink {
    async fn set_text(&self, text: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("sink offline".to_string()));
        }
        self.writes.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Wait until the published dashboard state satisfies `condition`.
pub async fn wait_for_state<F>(aggregator: &Aggregator, condition: F) -> DashboardState
where
    F: FnMut(&DashboardState) -> bool,
{
    let mut rx = aggregator.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(condition))
        .await
        .expect("timed out waiting for dashboard state")
        .expect("dashboard state channel closed");
    state.clone()
}

/// Poll `condition` between scheduler turns until it holds.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
