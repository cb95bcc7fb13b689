use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::azure::ProjectScope;
use crate::config::AzureConfig;
use crate::error::Result;

/// Which organization, project and board to query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub organization: String,
    pub project_name: String,
    pub board_name: String,
}

impl Preferences {
    pub fn from_config(config: &AzureConfig) -> Self {
        Self {
            organization: config.organization.clone(),
            project_name: config.project_name.clone(),
            board_name: config.board_name.clone(),
        }
    }

    /// Fails with a config error when organization or project is blank.
    pub fn scope(&self) -> Result<ProjectScope> {
        ProjectScope::new(&self.organization, &self.project_name)
    }
}

/// A partial preferences update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub board_name: Option<String>,
}

/// Repository ids the user opted into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(BTreeSet<String>);

impl SelectionSet {
    pub fn contains(&self, repository_id: &str) -> bool {
        self.0.contains(repository_id)
    }

    /// Add the id if absent, remove it if present.
    pub fn toggle(&mut self, repository_id: &str) {
        if !self.0.remove(repository_id) {
            self.0.insert(repository_id.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
