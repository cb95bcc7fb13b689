pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use types::*;

pub use client::AzureDevOpsClient;

/// The organization/project pair every request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectScope {
    pub organization: String,
    pub project_name: String,
}

impl ProjectScope {
    /// Build a scope, refusing blank names so no malformed URL is ever built.
    pub fn new(organization: &str, project_name: &str) -> Result<Self> {
        let organization = organization.trim();
        let project_name = project_name.trim();
        if organization.is_empty() {
            return Err(AppError::Config("organization is not set".to_string()));
        }
        if project_name.is_empty() {
            return Err(AppError::Config("project name is not set".to_string()));
        }
        Ok(Self {
            organization: organization.to_string(),
            project_name: project_name.to_string(),
        })
    }

    /// `{api_root}/{organization}/{project}`.
    pub fn base_url(&self, api_root: &str) -> String {
        format!(
            "{}/{}/{}",
            api_root.trim_end_matches('/'),
            urlencoding::encode(&self.organization),
            urlencoding::encode(&self.project_name)
        )
    }
}

#[async_trait]
pub trait DevOpsApi: Send + Sync {
    /// List every Git repository in the project.
    async fn list_repositories(&self, scope: &ProjectScope) -> Result<ApiList<Repository>>;

    /// List active pull requests of one repository.
    async fn list_active_pull_requests(
        &self,
        scope: &ProjectScope,
        repository_id: &str,
    ) -> Result<ApiList<PullRequest>>;
}

/// Drop pull requests opened by an identity named after the organization
/// (service accounts and bots).
pub fn exclude_self_authored(
    list: ApiList<PullRequest>,
    organization: &str,
) -> ApiList<PullRequest> {
    if organization.is_empty() {
        return list;
    }
    let value = list
        .value
        .into_iter()
        .filter(|pr| !pr.created_by.display_name.contains(organization))
        .collect();
    ApiList::new(value)
}
