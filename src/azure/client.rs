use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::AzureConfig;
use crate::error::{AppError, Result};

use super::types::*;
use super::{exclude_self_authored, DevOpsApi, ProjectScope};

const API_VERSION: &str = "7.0";
const MAX_LOGGED_BODY: usize = 512;

pub struct AzureDevOpsClient {
    client: Client,
    api_root: String,
    token: Option<String>,
    exclude_self_authored: bool,
}

impl AzureDevOpsClient {
    pub fn new(config: &AzureConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("azure-prs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_root: config.api_root.clone(),
            token: config.access_token().map(str::to_owned),
            exclude_self_authored: config.exclude_self_authored,
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("content-type", "application/json")
            .query(&[("api-version", API_VERSION)]);

        match &self.token {
            Some(token) => request.basic_auth("", Some(token)),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Azure answers unauthenticated API calls with 203 and a sign-in page
/// instead of a 401, so 203 must be treated as an auth failure.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    match status {
        StatusCode::NON_AUTHORITATIVE_INFORMATION | StatusCode::UNAUTHORIZED => Err(
            AppError::Auth(format!("Azure DevOps rejected the credentials ({status})")),
        ),
        s if s.is_success() => Ok(response),
        _ => {
            // The body is often an HTML error page; keep it out of the banner
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %truncate(&body, MAX_LOGGED_BODY), "API request failed");
            Err(AppError::Network(format!("API returned {status}")))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[async_trait]
impl DevOpsApi for AzureDevOpsClient {
    async fn list_repositories(&self, scope: &ProjectScope) -> Result<ApiList<Repository>> {
        let url = format!("{}/_apis/git/repositories", scope.base_url(&self.api_root));
        tracing::debug!(url = %url, "Listing repositories");

        self.fetch(self.get(&url)).await
    }

    async fn list_active_pull_requests(
        &self,
        scope: &ProjectScope,
        repository_id: &str,
    ) -> Result<ApiList<PullRequest>> {
        let url = format!(
            "{}/_apis/git/repositories/{}/pullRequests",
            scope.base_url(&self.api_root),
            urlencoding::encode(repository_id)
        );
        tracing::debug!(url = %url, "Listing active pull requests");

        let request = self
            .get(&url)
            .query(&[("searchCriteria.status", "active")]);
        let list: ApiList<PullRequest> = self.fetch(request).await?;

        if self.exclude_self_authored {
            Ok(exclude_self_authored(list, &scope.organization))
        } else {
            Ok(list)
        }
    }
}
