//! Badge output: the open pull request count shown on the toolbar icon or
//! status bar.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::BadgeConfig;
use crate::error::{AppError, Result};

#[async_trait]
pub trait BadgeSink: Send + Sync {
    /// Replace the badge text. An empty string clears the badge.
    async fn set_text(&self, text: &str) -> Result<()>;
}

/// Logs the badge instead of drawing it anywhere.
pub struct TracingBadgeSink;

#[async_trait]
impl BadgeSink for TracingBadgeSink {
    async fn set_text(&self, text: &str) -> Result<()> {
        tracing::info!(badge = text, "Badge updated");
        Ok(())
    }
}

/// Writes the badge text to a file for status bars to pick up.
pub struct FileBadgeSink {
    path: PathBuf,
}

impl FileBadgeSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BadgeSink for FileBadgeSink {
    async fn set_text(&self, text: &str) -> Result<()> {
        tokio::fs::write(&self.path, text).await.map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write badge file {}: {e}", self.path.display()),
            ))
        })
    }
}

/// Pick the sink named by the configuration.
pub fn sink_from_config(config: &BadgeConfig) -> Arc<dyn BadgeSink> {
    match &config.output_path {
        Some(path) => Arc::new(FileBadgeSink::new(path.clone())),
        None => Arc::new(TracingBadgeSink),
    }
}

/// Badge text for an open pull request count; zero clears the badge.
pub fn badge_text(total: usize) -> String {
    if total == 0 {
        String::new()
    } else {
        total.to_string()
    }
}

fn normalize(text: &str) -> &str {
    if text == "0" {
        ""
    } else {
        text
    }
}

/// Debounced, idempotent front of a [`BadgeSink`].
///
/// Bursts of `publish` calls inside the debounce window collapse into one
/// write of the latest value, and a value equal to the last written one is
/// never written again.
#[derive(Clone)]
pub struct BadgeWriter {
    inner: Arc<Inner>,
}

struct Inner {
    sink: Arc<dyn BadgeSink>,
    debounce: Duration,
    state: Mutex<WriterState>,
    /// Serializes sink writes so they land in claim order.
    write_lock: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct WriterState {
    /// `None` until the first successful write, so the first publish
    /// always reaches the sink and clears whatever a previous run left.
    last_written: Option<String>,
    pending: Option<Pending>,
    generation: u64,
}

struct Pending {
    text: String,
    generation: u64,
    handle: JoinHandle<()>,
}

impl BadgeWriter {
    pub fn new(sink: Arc<dyn BadgeSink>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                debounce,
                state: Mutex::new(WriterState::default()),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Schedule `text` to be written once the debounce window passes.
    /// Must be called from within a Tokio runtime.
    pub fn publish(&self, text: &str) {
        let text = normalize(text).to_string();
        let mut state = self.inner.lock_state();

        if let Some(pending) = state.pending.take() {
            pending.handle.abort();
        }
        if state.last_written.as_deref() == Some(text.as_str()) {
            return;
        }

        state.generation += 1;
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        let debounce = self.inner.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.write_if_current(generation).await;
        });

        state.pending = Some(Pending {
            text,
            generation,
            handle,
        });
    }

    /// Write a pending value immediately instead of waiting for the timer.
    pub async fn flush(&self) {
        let generation = {
            let state = self.inner.lock_state();
            match &state.pending {
                Some(pending) => pending.generation,
                None => return,
            }
        };
        self.inner.write_if_current(generation).await;
    }

    /// The value most recently written to the sink.
    pub fn last_written(&self) -> Option<String> {
        self.inner.lock_state().last_written.clone()
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, WriterState> {
        // Nothing panics while holding the lock; recover the data if it ever does.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn write_if_current(&self, generation: u64) {
        let _write = self.write_lock.lock().await;

        let text = {
            let mut state = self.lock_state();
            match state.pending.take() {
                Some(pending) if pending.generation == generation => {
                    state.last_written = Some(pending.text.clone());
                    pending.text
                }
                other => {
                    state.pending = other;
                    return;
                }
            }
        };

        if let Err(e) = self.sink.set_text(&text).await {
            tracing::warn!(badge = %text, error = %e, "Failed to write badge");
            let mut state = self.lock_state();
            if state.last_written.as_deref() == Some(text.as_str()) {
                state.last_written = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSink;
    use std::sync::atomic::Ordering;

    fn writer() -> (Arc<RecordingSink>, BadgeWriter) {
        let sink = Arc::new(RecordingSink::default());
        let writer = BadgeWriter::new(sink.clone(), Duration::from_millis(200));
        (sink, writer)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    #[test]
    fn test_badge_text_for_zero_is_empty() {
        assert_eq!(badge_text(0), "");
        assert_eq!(badge_text(7), "7");
        assert_eq!(normalize("0"), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_latest() {
        let (sink, writer) = writer();

        writer.publish("1");
        writer.publish("2");
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.publish("3");
        assert!(sink.writes().is_empty());

        settle().await;
        assert_eq!(sink.writes(), vec!["3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_is_written_as_empty() {
        let (sink, writer) = writer();

        writer.publish("0");
        settle().await;
        assert_eq!(sink.writes(), vec![""]);
        assert_eq!(writer.last_written().as_deref(), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_values_written_once() {
        let (sink, writer) = writer();

        writer.publish("4");
        settle().await;
        writer.publish("4");
        settle().await;
        writer.publish("4");
        settle().await;

        assert_eq!(sink.writes(), vec!["4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returning_to_written_value_cancels_pending() {
        let (sink, writer) = writer();

        writer.publish("3");
        settle().await;

        writer.publish("");
        writer.publish("3");
        settle().await;
        assert_eq!(sink.writes(), vec!["3"]);

        writer.publish("5");
        writer.publish("");
        settle().await;
        assert_eq!(sink.writes(), vec!["3", ""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_pending_immediately() {
        let (sink, writer) = writer();

        writer.publish("9");
        writer.flush().await;
        assert_eq!(sink.writes(), vec!["9"]);

        // The timer that would have written it finds nothing left to do
        settle().await;
        assert_eq!(sink.writes(), vec!["9"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_retried_on_next_publish() {
        let (sink, writer) = writer();

        sink.fail.store(true, Ordering::SeqCst);
        writer.publish("2");
        settle().await;
        assert_eq!(writer.last_written(), None);

        sink.fail.store(false, Ordering::SeqCst);
        writer.publish("2");
        settle().await;
        assert_eq!(sink.writes(), vec!["2"]);
    }

    #[tokio::test]
    async fn test_file_sink_writes_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("badge.txt");
        let sink = FileBadgeSink::new(&path);

        sink.set_text("12").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "12");
    }
}
