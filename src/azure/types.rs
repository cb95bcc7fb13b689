use serde::{Deserialize, Serialize};

/// Envelope Azure DevOps wraps every list response in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiList<T> {
    pub value: Vec<T>,
    #[serde(default)]
    pub count: usize,
}

impl<T> ApiList<T> {
    pub fn new(value: Vec<T>) -> Self {
        let count = value.len();
        Self { value, count }
    }
}

/// A Git repository in the configured project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// Absent on repositories without any commits.
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    #[serde(default)]
    pub is_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: u64,
    pub title: String,
    pub source_ref_name: String,
    pub target_ref_name: String,
    pub created_by: IdentityRef,
    #[serde(default)]
    pub reviewers: Vec<Reviewer>,
    pub repository: RepositoryRef,
}

impl PullRequest {
    /// Reviewers that are real people rather than groups or teams.
    pub fn individual_reviewers(&self) -> impl Iterator<Item = &Reviewer> {
        self.reviewers.iter().filter(|r| !r.is_container)
    }
}

/// The repository reference embedded in a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRef {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub display_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<IdentityLinks>,
}

impl IdentityRef {
    /// Avatar link, preferring `_links.avatar.href` over `imageUrl`.
    pub fn avatar_url(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.avatar.as_ref())
            .map(|a| a.href.as_str())
            .or(self.image_url.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityLinks {
    #[serde(default)]
    pub avatar: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub vote: Vote,
    #[serde(default)]
    pub is_container: bool,
}

/// A reviewer's vote. Unknown values read as `NoVote`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Vote {
    Approved,
    ApprovedWithSuggestions,
    #[default]
    NoVote,
    WaitingForAuthor,
    Rejected,
}

impl From<i32> for Vote {
    fn from(value: i32) -> Self {
        match value {
            10 => Vote::Approved,
            5 => Vote::ApprovedWithSuggestions,
            -5 => Vote::WaitingForAuthor,
            -10 => Vote::Rejected,
            _ => Vote::NoVote,
        }
    }
}

impl From<Vote> for i32 {
    fn from(vote: Vote) -> Self {
        match vote {
            Vote::Approved => 10,
            Vote::ApprovedWithSuggestions => 5,
            Vote::NoVote => 0,
            Vote::WaitingForAuthor => -5,
            Vote::Rejected => -10,
        }
    }
}
