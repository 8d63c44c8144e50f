//! Debounced settings persistence.
//!
//! Slider-driven settings change many times a second. Callers apply each
//! change live and hand it to a [`DebouncedWriter`], which writes only the
//! latest value once no update has arrived for the quiet period.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use veil_core::KeyValueStore;

use crate::io::save_settings;
use crate::schema::Settings;

/// Quiet period before a pending update is written.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

enum Command {
    Update(Settings),
    Flush(oneshot::Sender<Result<()>>),
}

#[derive(Debug)]
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl DebouncedWriter {
    /// Spawn the writer task on the current Tokio runtime.
    pub fn spawn(kv: Arc<dyn KeyValueStore>, quiet: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(kv, quiet, rx));
        Self { tx, handle }
    }

    /// Queue `settings` for persistence, replacing any pending value.
    pub fn update(&self, settings: Settings) {
        if self.tx.send(Command::Update(settings)).is_err() {
            warn!("Settings writer has stopped; update dropped");
        }
    }

    /// Write any pending value now and wait for the result.
    ///
    /// Callers that persist immediately should `update` then `flush` here
    /// instead of writing around the writer, or a stale pending value may
    /// land later and overwrite theirs.
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack_tx))
            .map_err(|_| anyhow!("settings writer has stopped"))?;
        ack_rx
            .await
            .map_err(|_| anyhow!("settings writer dropped the flush"))?
    }

    /// Write any pending value and stop the task.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Settings writer task failed");
        }
    }
}

async fn run(
    kv: Arc<dyn KeyValueStore>,
    quiet: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<Settings> = None;
    loop {
        let command = if pending.is_some() {
            match tokio::time::timeout(quiet, rx.recv()).await {
                Ok(command) => command,
                Err(_) => {
                    log_failure(write(kv.as_ref(), pending.take()).await);
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(Command::Update(settings)) => pending = Some(settings),
            Some(Command::Flush(ack)) => {
                let _ = ack.send(write(kv.as_ref(), pending.take()).await);
            }
            None => {
                log_failure(write(kv.as_ref(), pending.take()).await);
                debug!("Settings writer stopped");
                return;
            }
        }
    }
}

async fn write(kv: &dyn KeyValueStore, settings: Option<Settings>) -> Result<()> {
    match settings {
        Some(settings) => save_settings(kv, &settings).await,
        None => Ok(()),
    }
}

fn log_failure(result: Result<()>) {
    if let Err(e) = result {
        error!(error = %format!("{e:#}"), "Debounced settings write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load_settings;
    use veil_core::MemoryKvStore;

    fn opacity(value: f64) -> Settings {
        Settings {
            panel_opacity: value,
            ..Settings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn coalesces_rapid_updates() {
        let kv = Arc::new(MemoryKvStore::new());
        let writer = DebouncedWriter::spawn(kv.clone(), DEFAULT_QUIET_PERIOD);

        for value in [0.2, 0.3, 0.4, 0.5] {
            writer.update(opacity(value));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(kv.writes(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(kv.writes(), 1);
        assert_eq!(load_settings(kv.as_ref()).await.unwrap(), opacity(0.5));

        writer.shutdown().await;
        assert_eq!(kv.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_immediately() {
        let kv = Arc::new(MemoryKvStore::new());
        let writer = DebouncedWriter::spawn(kv.clone(), DEFAULT_QUIET_PERIOD);
        writer.update(opacity(0.9));
        writer.flush().await.unwrap();
        assert_eq!(kv.writes(), 1);
        writer.flush().await.unwrap();
        assert_eq!(kv.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_reports_failed_write() {
        let kv = Arc::new(MemoryKvStore::new());
        let writer = DebouncedWriter::spawn(kv.clone(), DEFAULT_QUIET_PERIOD);
        kv.set_fail_writes(true);
        writer.update(opacity(0.3));
        assert!(writer.flush().await.is_err());

        // The failed value is not retried once the quiet period passes.
        kv.set_fail_writes(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(kv.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_writes_pending_value() {
        let kv = Arc::new(MemoryKvStore::new());
        let writer = DebouncedWriter::spawn(kv.clone(), DEFAULT_QUIET_PERIOD);
        writer.update(opacity(0.7));
        writer.shutdown().await;
        assert_eq!(load_settings(kv.as_ref()).await.unwrap(), opacity(0.7));
    }
}
