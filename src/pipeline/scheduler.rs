use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::config::PollConfig;

use super::{Aggregator, CycleOutcome};

/// Commands accepted by the background poller.
#[derive(Debug)]
pub enum PollCommand {
    /// Refresh repositories and pull requests right away.
    RefreshNow,
    Stop,
}

/// Handle for talking to the background poller.
#[derive(Clone)]
pub struct PollerHandle {
    command_tx: mpsc::Sender<PollCommand>,
}

impl PollerHandle {
    pub async fn refresh_now(&self) -> bool {
        self.command_tx.send(PollCommand::RefreshNow).await.is_ok()
    }

    pub async fn stop(&self) {
        let _ = self.command_tx.send(PollCommand::Stop).await;
    }
}

/// Start polling in the background.
///
/// Nothing runs until the preference store has loaded. After that, both
/// refreshes run once immediately and then on their own timers; a selection
/// change re-runs the aggregation and a preference change re-runs both.
/// Triggered cycles run as independent tasks, so a slow cycle never delays
/// the next one.
pub fn start(aggregator: Arc<Aggregator>, config: PollConfig) -> PollerHandle {
    let (command_tx, mut command_rx) = mpsc::channel::<PollCommand>(16);

    tokio::spawn(async move {
        let store = Arc::clone(aggregator.store());
        store.wait_ready().await;

        // Subscribing after the load means the load itself is not a change
        let mut selection_rx = store.subscribe_selection();
        let mut preferences_rx = store.subscribe_preferences();

        let mut repositories_timer = time::interval(config.repositories_interval());
        repositories_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pull_requests_timer = time::interval(config.pull_requests_interval());
        pull_requests_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            repositories_interval_secs = config.repositories_interval().as_secs(),
            pull_requests_interval_secs = config.pull_requests_interval().as_secs(),
            "Poller started"
        );

        loop {
            tokio::select! {
                _ = repositories_timer.tick() => {
                    spawn_repository_refresh(&aggregator);
                }
                _ = pull_requests_timer.tick() => {
                    spawn_aggregation(&aggregator);
                }
                Ok(()) = selection_rx.changed() => {
                    tracing::debug!("Selection changed");
                    spawn_aggregation(&aggregator);
                }
                Ok(()) = preferences_rx.changed() => {
                    tracing::debug!("Preferences changed");
                    spawn_repository_refresh(&aggregator);
                    spawn_aggregation(&aggregator);
                }
                Some(command) = command_rx.recv() => match command {
                    PollCommand::RefreshNow => {
                        tracing::info!("Manual refresh requested");
                        spawn_repository_refresh(&aggregator);
                        spawn_aggregation(&aggregator);
                    }
                    PollCommand::Stop => break,
                },
                else => break,
            }
        }

        tracing::info!("Poller stopped");
    });

    PollerHandle { command_tx }
}

fn spawn_repository_refresh(aggregator: &Arc<Aggregator>) {
    let aggregator = Arc::clone(aggregator);
    tokio::spawn(async move {
        let outcome = aggregator.refresh_repositories().await;
        log_outcome("repositories", &outcome);
    });
}

fn spawn_aggregation(aggregator: &Arc<Aggregator>) {
    let aggregator = Arc::clone(aggregator);
    tokio::spawn(async move {
        let outcome = aggregator.refresh_pull_requests().await;
        log_outcome("pull_requests", &outcome);
    });
}

fn log_outcome(kind: &str, outcome: &CycleOutcome) {
    tracing::trace!(kind, outcome = ?outcome, "Cycle finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::BadgeWriter;
    use crate::store::{PreferenceStore, PreferencesUpdate};
    use crate::test_support::*;
    use std::time::Duration;

    fn idle_poll_config() -> PollConfig {
        PollConfig {
            repositories_interval_secs: 3600,
            pull_requests_interval_secs: 3600,
        }
    }

    fn aggregator(api: Arc<FakeApi>, store: &Arc<PreferenceStore>) -> Arc<Aggregator> {
        let sink = Arc::new(RecordingSink::default());
        let badge = BadgeWriter::new(sink, Duration::from_millis(200));
        Arc::new(Aggregator::new(api, Arc::clone(store), badge))
    }

    #[tokio::test]
    async fn test_waits_for_store_then_runs_once_with_persisted_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, r#"{"activeRepositories":["repoA"]}"#).unwrap();

        let store = Arc::new(PreferenceStore::new(&path, preferences()));
        let api = Arc::new(
            FakeApi::default()
                .with_repositories(vec![repository("repoA", "alpha")])
                .with_pull_requests("repoA", vec![pull_request(1, "alpha")]),
        );
        let aggregator = aggregator(api.clone(), &store);

        let poller = start(Arc::clone(&aggregator), idle_poll_config());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(api.pull_request_calls().is_empty());
        assert_eq!(api.repository_calls(), 0);

        store.load().await.unwrap();
        let state = wait_for_state(&aggregator, |s| {
            s.repositories_refreshed_at.is_some() && s.pull_requests_refreshed_at.is_some()
        })
        .await;

        assert_eq!(api.pull_request_calls(), vec!["repoA"]);
        assert_eq!(api.repository_calls(), 1);
        assert_eq!(state.total, 1);
        assert_eq!(state.cycle, 1);

        poller.stop().await;
    }

    #[tokio::test]
    async fn test_selection_and_preference_changes_trigger_refreshes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(PreferenceStore::new(tmp.path().join("state.json"), preferences()));
        store.load().await.unwrap();

        let api = Arc::new(
            FakeApi::default().with_pull_requests("repoB", vec![pull_request(7, "beta")]),
        );
        let aggregator = aggregator(api.clone(), &store);

        let poller = start(Arc::clone(&aggregator), idle_poll_config());
        wait_for_state(&aggregator, |s| s.cycle == 1).await;
        eventually(|| api.repository_calls() == 1).await;

        store.toggle("repoB").await.unwrap();
        let state = wait_for_state(&aggregator, |s| s.cycle == 2).await;
        assert_eq!(api.pull_request_calls(), vec!["repoB"]);
        assert_eq!(state.total, 1);

        store
            .set(PreferencesUpdate {
                organization: Some("northwind".to_string()),
                ..PreferencesUpdate::default()
            })
            .await
            .unwrap();
        wait_for_state(&aggregator, |s| s.cycle == 3).await;
        eventually(|| api.repository_calls() == 2).await;
        assert_eq!(api.pull_request_calls().len(), 2);

        assert!(poller.refresh_now().await);
        wait_for_state(&aggregator, |s| s.cycle == 4).await;
        eventually(|| api.repository_calls() == 3).await;

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_repeat_refreshes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(PreferenceStore::new(tmp.path().join("state.json"), preferences()));
        store.load().await.unwrap();
        store.toggle("repoA").await.unwrap();

        let api = Arc::new(FakeApi::default());
        let poller = start(aggregator(api.clone(), &store), PollConfig::default());
        tokio::time::sleep(Duration::from_secs(65)).await;

        // Immediate run plus the ticks at 30s and 60s
        assert_eq!(api.repository_calls(), 3);
        assert_eq!(api.pull_request_calls().len(), 3);

        poller.stop().await;
    }
}
