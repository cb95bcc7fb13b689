use crate::azure::types::PullRequest;
use crate::store::Preferences;

const WEB_ROOT: &str = "https://dev.azure.com";

fn project_root(prefs: &Preferences) -> String {
    format!(
        "{WEB_ROOT}/{}/{}",
        urlencoding::encode(&prefs.organization),
        urlencoding::encode(&prefs.project_name)
    )
}

/// Web page of a pull request.
pub fn pull_request_url(prefs: &Preferences, pr: &PullRequest) -> String {
    format!(
        "{}/_git/{}/pullrequest/{}",
        project_root(prefs),
        urlencoding::encode(&pr.repository.name),
        pr.pull_request_id
    )
}

/// The configured board.
pub fn board_url(prefs: &Preferences) -> String {
    format!(
        "{}/_boards/board/t/{}",
        project_root(prefs),
        urlencoding::encode(&prefs.board_name)
    )
}

/// A work item opened on the configured board.
pub fn work_item_url(prefs: &Preferences, work_item_id: u64) -> String {
    format!("{}/Stories?workitem={work_item_id}", board_url(prefs))
}
