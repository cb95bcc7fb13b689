//! View models derived from the dashboard state. Nothing here holds state of
//! its own.

use serde::Serialize;
use std::fmt::Write;

use crate::azure::types::{PullRequest, Repository, Vote};
use crate::pipeline::{DashboardState, ErrorKind, FetchError, PullRequestGroup};
use crate::store::{Preferences, SelectionSet};
use crate::urls;

/// One line of the repository checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRow {
    pub id: String,
    pub name: String,
    pub selected: bool,
    pub disabled: bool,
}

/// Repositories whose name contains `search` (case-insensitive), selected
/// ones first. Order is otherwise kept.
pub fn repository_checklist(
    repositories: &[Repository],
    search: &str,
    selection: &SelectionSet,
) -> Vec<RepositoryRow> {
    let needle = search.trim().to_lowercase();
    let mut rows: Vec<RepositoryRow> = repositories
        .iter()
        .filter(|repo| repo.name.to_lowercase().contains(&needle))
        .map(|repo| RepositoryRow {
            id: repo.id.clone(),
            name: repo.name.clone(),
            selected: selection.contains(&repo.id),
            disabled: repo.is_disabled,
        })
        .collect();
    rows.sort_by_key(|row| !row.selected);
    rows
}

/// Icon shown next to a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewStatus {
    Approved,
    Waiting,
    Rejected,
    Pending,
}

impl From<Vote> for ReviewStatus {
    fn from(vote: Vote) -> Self {
        match vote {
            Vote::Approved | Vote::ApprovedWithSuggestions => ReviewStatus::Approved,
            Vote::WaitingForAuthor => ReviewStatus::Waiting,
            Vote::Rejected => ReviewStatus::Rejected,
            Vote::NoVote => ReviewStatus::Pending,
        }
    }
}

impl ReviewStatus {
    fn glyph(self) -> &'static str {
        match self {
            ReviewStatus::Approved => "✔",
            ReviewStatus::Waiting => "…",
            ReviewStatus::Rejected => "✘",
            ReviewStatus::Pending => "·",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerBadge {
    pub name: String,
    pub image_url: Option<String>,
    pub status: ReviewStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestCard {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub avatar_url: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub url: String,
    pub reviewers: Vec<ReviewerBadge>,
}

impl PullRequestCard {
    pub fn new(pr: &PullRequest, prefs: &Preferences) -> Self {
        Self {
            id: pr.pull_request_id,
            title: pr.title.clone(),
            author: pr.created_by.display_name.clone(),
            avatar_url: pr.created_by.avatar_url().map(str::to_string),
            source_branch: short_ref(&pr.source_ref_name).to_string(),
            target_branch: short_ref(&pr.target_ref_name).to_string(),
            url: urls::pull_request_url(prefs, pr),
            reviewers: pr
                .individual_reviewers()
                .map(|r| ReviewerBadge {
                    name: r.display_name.clone(),
                    image_url: r.image_url.clone(),
                    status: r.vote.into(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub title: String,
    pub cards: Vec<PullRequestCard>,
}

impl GroupView {
    fn new(group: &PullRequestGroup, prefs: &Preferences) -> Self {
        Self {
            title: group.title.clone(),
            cards: group
                .data
                .iter()
                .map(|pr| PullRequestCard::new(pr, prefs))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub total: usize,
    pub repository_count: usize,
    pub banner: Option<String>,
    pub board_url: String,
    pub groups: Vec<GroupView>,
}

impl DashboardView {
    pub fn new(state: &DashboardState, prefs: &Preferences) -> Self {
        Self {
            total: state.total,
            repository_count: state.repositories.len(),
            banner: state.error.as_ref().map(banner_message),
            board_url: urls::board_url(prefs),
            groups: state.groups.iter().map(|g| GroupView::new(g, prefs)).collect(),
        }
    }
}

fn banner_message(error: &FetchError) -> String {
    match error.kind {
        ErrorKind::Auth => {
            "Could not load repositories. Generate a new personal access token in Azure DevOps."
                .to_string()
        }
        ErrorKind::Network => format!("Could not load repositories: {}", error.message),
        ErrorKind::Config => "Set the organization and project to load repositories.".to_string(),
    }
}

/// `refs/heads/main` -> `main`.
pub fn short_ref(ref_name: &str) -> &str {
    ref_name.strip_prefix("refs/heads/").unwrap_or(ref_name)
}

/// Plain-text rendering for the terminal.
pub fn render_text(view: &DashboardView) -> String {
    let mut out = String::new();

    if let Some(banner) = &view.banner {
        let _ = writeln!(out, "! {banner}\n");
    }

    if view.total > 0 {
        let _ = writeln!(out, "Pull Requests ({})", view.total);
    } else {
        let _ = writeln!(out, "Pull Requests");
    }

    if view.groups.is_empty() {
        let _ = writeln!(out, "\n  No pull requests found for the selected repositories.");
        return out;
    }

    for group in &view.groups {
        let _ = writeln!(out, "\n{}", group.title);
        for card in &group.cards {
            let _ = write!(
                out,
                "  #{} {} [{} -> {}] by {}",
                card.id, card.title, card.source_branch, card.target_branch, card.author
            );
            for reviewer in &card.reviewers {
                let _ = write!(out, "  {} {}", reviewer.status.glyph(), reviewer.name);
            }
            let _ = writeln!(out, "\n    {}", card.url);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::types::Reviewer;
    use crate::test_support::*;

    #[test]
    fn test_checklist_filters_case_insensitively_and_lists_selected_first() {
        let repos = vec![
            repository("1", "Payments-API"),
            repository("2", "web-frontend"),
            repository("3", "payments-worker"),
            repository("4", "docs"),
        ];
        let selection: SelectionSet = ["3"].into_iter().collect();

        let rows = repository_checklist(&repos, "PAYMENTS", &selection);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["payments-worker", "Payments-API"]);
        assert!(rows[0].selected);

        let all = repository_checklist(&repos, "", &selection);
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].id, "3");
    }

    #[test]
    fn test_checklist_without_matches_is_empty() {
        let repos = vec![repository("1", "api")];
        assert!(repository_checklist(&repos, "zzz", &SelectionSet::default()).is_empty());
    }

    #[test]
    fn test_card_hides_container_reviewers_and_maps_votes() {
        let mut pr = pull_request(8, "api");
        pr.reviewers = vec![
            Reviewer {
                id: "a".to_string(),
                display_name: "Grace".to_string(),
                image_url: None,
                vote: Vote::ApprovedWithSuggestions,
                is_container: false,
            },
            Reviewer {
                id: "b".to_string(),
                display_name: "Reviewers".to_string(),
                image_url: None,
                vote: Vote::NoVote,
                is_container: true,
            },
            Reviewer {
                id: "c".to_string(),
                display_name: "Linus".to_string(),
                image_url: None,
                vote: Vote::Rejected,
                is_container: false,
            },
        ];

        let card = PullRequestCard::new(&pr, &preferences());
        assert_eq!(card.source_branch, "feature/8");
        assert_eq!(card.target_branch, "main");
        let statuses: Vec<(&str, ReviewStatus)> = card
            .reviewers
            .iter()
            .map(|r| (r.name.as_str(), r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![("Grace", ReviewStatus::Approved), ("Linus", ReviewStatus::Rejected)]
        );
    }

    #[test]
    fn test_render_text() {
        let state = DashboardState {
            groups: vec![PullRequestGroup {
                title: "api".to_string(),
                data: vec![pull_request(3, "api")],
            }],
            total: 1,
            ..DashboardState::default()
        };
        let text = render_text(&DashboardView::new(&state, &preferences()));

        assert!(text.starts_with("Pull Requests (1)"));
        assert!(text.contains("#3 Change #3 [feature/3 -> main] by Ada Lovelace"));
        assert!(text.contains("/_git/api/pullrequest/3"));
    }

    #[test]
    fn test_render_text_with_banner_and_no_groups() {
        let state = DashboardState {
            error: Some(FetchError {
                kind: ErrorKind::Auth,
                message: "Authentication required".to_string(),
            }),
            ..DashboardState::default()
        };
        let text = render_text(&DashboardView::new(&state, &preferences()));

        assert!(text.starts_with("! Could not load repositories."));
        assert!(text.contains("No pull requests found"));
    }
}
