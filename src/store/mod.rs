//! Persisted user preferences and repository selection.
//!
//! The backing file is one JSON object keyed the same way the extension's
//! local storage is (`organization`, `projectName`, `boardName`,
//! `activeRepositories`), so preferences and selection are stored under
//! independent keys.

pub mod preferences;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{watch, Mutex};

use crate::error::{AppError, Result};

pub use preferences::{Preferences, PreferencesUpdate, SelectionSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    board_name: Option<String>,
    #[serde(default)]
    active_repositories: SelectionSet,
}

impl StoredDocument {
    fn preferences(&self, defaults: &Preferences) -> Preferences {
        Preferences {
            organization: self
                .organization
                .clone()
                .unwrap_or_else(|| defaults.organization.clone()),
            project_name: self
                .project_name
                .clone()
                .unwrap_or_else(|| defaults.project_name.clone()),
            board_name: self
                .board_name
                .clone()
                .unwrap_or_else(|| defaults.board_name.clone()),
        }
    }
}

/// The watch channels mirror the document and are only written while the
/// document lock is held, so subscribers always see the persisted state.
pub struct PreferenceStore {
    path: PathBuf,
    defaults: Preferences,
    document: Mutex<StoredDocument>,
    ready: watch::Sender<bool>,
    selection: watch::Sender<SelectionSet>,
    preferences: watch::Sender<Preferences>,
}

impl PreferenceStore {
    /// Create a store that is not ready until [`PreferenceStore::load`] completes.
    pub fn new(path: impl Into<PathBuf>, defaults: Preferences) -> Self {
        let (ready, _) = watch::channel(false);
        let (selection, _) = watch::channel(SelectionSet::default());
        let (preferences, _) = watch::channel(defaults.clone());

        Self {
            path: path.into(),
            defaults,
            document: Mutex::new(StoredDocument::default()),
            ready,
            selection,
            preferences,
        }
    }

    /// Read the backing file and signal readiness. A missing file means
    /// every preference is at its default and nothing is selected.
    pub async fn load(&self) -> Result<()> {
        let mut guard = self.document.lock().await;

        let document = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str::<StoredDocument>(&raw).map_err(|e| {
                AppError::Storage(format!("Corrupt state file {}: {e}", self.path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredDocument::default(),
            Err(e) => return Err(e.into()),
        };

        let prefs = document.preferences(&self.defaults);
        tracing::info!(
            path = %self.path.display(),
            organization = %prefs.organization,
            project = %prefs.project_name,
            selected = document.active_repositories.len(),
            "Preference store loaded"
        );

        self.preferences.send_replace(prefs);
        self.selection.send_replace(document.active_repositories.clone());
        *guard = document;
        self.ready.send_replace(true);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolve once the initial load has completed.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot fail while borrowed.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn get(&self) -> Preferences {
        self.preferences.borrow().clone()
    }

    /// Read-modify-write of the persisted preferences. Last write wins.
    pub async fn set(&self, update: PreferencesUpdate) -> Result<Preferences> {
        let document = self
            .mutate(|doc| {
                if let Some(organization) = update.organization {
                    doc.organization = Some(organization);
                }
                if let Some(project_name) = update.project_name {
                    doc.project_name = Some(project_name);
                }
                if let Some(board_name) = update.board_name {
                    doc.board_name = Some(board_name);
                }
            })
            .await?;
        let prefs = document.preferences(&self.defaults);

        tracing::info!(
            organization = %prefs.organization,
            project = %prefs.project_name,
            board = %prefs.board_name,
            "Preferences updated"
        );
        Ok(prefs)
    }

    /// Persist the configured defaults as the current preferences.
    pub async fn reset(&self) -> Result<Preferences> {
        let defaults = self.defaults.clone();
        let document = self
            .mutate(|doc| {
                doc.organization = Some(defaults.organization);
                doc.project_name = Some(defaults.project_name);
                doc.board_name = Some(defaults.board_name);
            })
            .await?;

        tracing::info!("Preferences reset to defaults");
        Ok(document.preferences(&self.defaults))
    }

    pub fn selection(&self) -> SelectionSet {
        self.selection.borrow().clone()
    }

    /// Flip one repository in or out of the selection and persist the
    /// result before returning it.
    pub async fn toggle(&self, repository_id: &str) -> Result<SelectionSet> {
        let selection = self
            .mutate(|doc| doc.active_repositories.toggle(repository_id))
            .await?
            .active_repositories;

        tracing::info!(
            repository = repository_id,
            selected = selection.contains(repository_id),
            total = selection.len(),
            "Repository selection toggled"
        );
        Ok(selection)
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<SelectionSet> {
        self.selection.subscribe()
    }

    pub fn subscribe_preferences(&self) -> watch::Receiver<Preferences> {
        self.preferences.subscribe()
    }

    /// Apply `f` to a copy of the document, persist it, then commit it and
    /// notify subscribers before the lock is released. Unchanged values do
    /// not wake subscribers.
    async fn mutate<F>(&self, f: F) -> Result<StoredDocument>
    where
        F: FnOnce(&mut StoredDocument),
    {
        if !self.is_ready() {
            return Err(AppError::NotReady);
        }

        let mut guard = self.document.lock().await;
        let mut next = guard.clone();
        f(&mut next);
        persist(&self.path, &next).await?;

        let prefs = next.preferences(&self.defaults);
        self.preferences.send_if_modified(|current| replace_if_changed(current, prefs));
        let selection = next.active_repositories.clone();
        self.selection.send_if_modified(|current| replace_if_changed(current, selection));

        *guard = next.clone();
        Ok(next)
    }
}

fn replace_if_changed<T: PartialEq>(current: &mut T, next: T) -> bool {
    if *current == next {
        return false;
    }
    *current = next;
    true
}

/// Write through a sibling temp file so a crash never leaves half a document.
async fn persist(path: &Path, document: &StoredDocument) -> Result<()> {
    let json = serde_json::to_vec_pretty(document)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to replace {}: {e}", path.display())))?;
    Ok(())
}
