//! Tap session actor
//!
//! Owns one [`BurstAggregator`] on a dedicated tokio task so that ticks,
//! configuration changes, cancellation, and deadline expiry are serialized
//! on a single logical stream of mutation. Handles only send commands; the
//! task is the sole writer.
//!
//! Finalized bursts fan out on a broadcast channel, one send per burst, in
//! burst order, before any tick of the next burst is processed. Countdown
//! telemetry is published on a watch channel at roughly UI refresh cadence;
//! no correctness property depends on its frequency.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant, MissedTickBehavior};

use crate::config::TapConfig;
use crate::tap::aggregator::{BurstAggregator, BurstOutcome, Progress};
use crate::tap::trigger::{InputEvent, TapSource, TriggerKey};

/// Command queue depth; ticks are tiny, this never fills in practice
const COMMAND_QUEUE_SIZE: usize = 64;

/// Outcome broadcast capacity
const EMIT_QUEUE_SIZE: usize = 32;

/// Telemetry refresh period while a burst is open (~30 Hz)
const PROGRESS_REFRESH: Duration = Duration::from_millis(33);

/// Parking duration for the deadline timer while idle
const IDLE_PARK: Duration = Duration::from_secs(3600);

/// Errors from a [`SessionHandle`]
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session task has shut down or panicked
    #[error("tap session closed")]
    Closed,
}

/// Snapshot of session state (safe to send between tasks)
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// True while a burst is open
    pub accumulating: bool,
    /// Taps in the current burst
    pub count: u32,
    /// Effective window in milliseconds
    pub window_ms: u32,
    /// Configured trigger key value
    pub trigger_key: String,
}

enum SessionCommand {
    Input {
        event: InputEvent,
        reply: oneshot::Sender<Option<TapSource>>,
    },
    Tick {
        source: TapSource,
    },
    Configure {
        window_ms: u32,
        trigger_key: String,
    },
    Cancel,
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown,
}

/// The session task state; constructed and consumed by [`TapSession::spawn`]
pub struct TapSession {
    aggregator: BurstAggregator,
    trigger: TriggerKey,
    rx: mpsc::Receiver<SessionCommand>,
    emit_tx: broadcast::Sender<BurstOutcome>,
    progress_tx: watch::Sender<Option<Progress>>,
}

/// Handle to a running tap session
///
/// Clonable; all clones talk to the same task. Independent sessions share
/// nothing.
///
/// # Example
/// ```no_run
/// use morsetap_core::{TapConfig, TapSession, TapSource};
///
/// # async fn demo() -> Result<(), morsetap_core::tap::session::SessionError> {
/// let handle = TapSession::spawn(TapConfig::default());
/// let mut outcomes = handle.subscribe();
/// handle.tick(TapSource::Key).await?;
/// // ... after the window elapses the outcome arrives:
/// let outcome = outcomes.recv().await.unwrap();
/// assert_eq!(outcome.value, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    emit_tx: broadcast::Sender<BurstOutcome>,
    progress_rx: watch::Receiver<Option<Progress>>,
}

impl TapSession {
    /// Spawn the session task and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: TapConfig) -> SessionHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (emit_tx, _) = broadcast::channel(EMIT_QUEUE_SIZE);
        let (progress_tx, progress_rx) = watch::channel(None);

        let session = TapSession {
            aggregator: BurstAggregator::new(config.effective_window_ms()),
            trigger: config.trigger(),
            rx,
            emit_tx: emit_tx.clone(),
            progress_tx,
        };
        tokio::spawn(session.run());

        SessionHandle {
            tx,
            emit_tx,
            progress_rx,
        }
    }

    async fn run(mut self) {
        let mut progress_interval = tokio::time::interval(PROGRESS_REFRESH);
        progress_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // select! evaluates the sleep even when the branch is disabled,
            // so park far in the future while idle
            let deadline = self
                .aggregator
                .deadline()
                .map(Instant::from_std)
                .unwrap_or_else(|| Instant::now() + IDLE_PARK);

            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = sleep_until(deadline), if self.aggregator.is_accumulating() => {
                    self.fire_deadline();
                }
                _ = progress_interval.tick(), if self.aggregator.is_accumulating() => {
                    self.publish_progress();
                }
            }
        }

        tracing::debug!("tap session stopped");
    }

    /// Returns true when the session should shut down
    fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Input { event, reply } => {
                let hit = self.trigger.match_event(&event);
                if let Some(source) = hit {
                    self.register_tap(source);
                }
                let _ = reply.send(hit);
            }
            SessionCommand::Tick { source } => {
                self.register_tap(source);
            }
            SessionCommand::Configure {
                window_ms,
                trigger_key,
            } => {
                self.aggregator.set_window_ms(window_ms);
                self.trigger = TriggerKey::new(trigger_key);
                tracing::info!(
                    window_ms = self.aggregator.window_ms(),
                    trigger_key = %self.trigger.display(),
                    "session reconfigured"
                );
            }
            SessionCommand::Cancel => {
                self.aggregator.cancel();
                self.progress_tx.send_replace(None);
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(SessionStatus {
                    accumulating: self.aggregator.is_accumulating(),
                    count: self.aggregator.count(),
                    window_ms: self.aggregator.window_ms(),
                    trigger_key: self.trigger.value().to_string(),
                });
            }
            SessionCommand::Shutdown => return true,
        }
        false
    }

    fn register_tap(&mut self, source: TapSource) {
        self.aggregator.tick_at(source, Instant::now().into_std());
        self.publish_progress();
    }

    fn fire_deadline(&mut self) {
        // The aggregator resets before handing the outcome back, so a
        // failing subscriber cannot leave it accumulating
        if let Some(outcome) = self.aggregator.finalize_due(Instant::now().into_std()) {
            self.progress_tx.send_replace(None);
            // No receivers (or lagging ones) is not our problem
            let _ = self.emit_tx.send(outcome);
        }
    }

    fn publish_progress(&mut self) {
        let progress = self.aggregator.progress_at(Instant::now().into_std());
        self.progress_tx.send_replace(progress);
    }
}

impl SessionHandle {
    /// Feed a raw input event through trigger matching.
    ///
    /// Returns the tap source when the event qualified and was counted,
    /// `None` when it was ignored.
    pub async fn input(&self, event: InputEvent) -> Result<Option<TapSource>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Input { event, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Register one qualifying tap, bypassing trigger matching.
    pub async fn tick(&self, source: TapSource) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::Tick { source })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Update window and trigger key for subsequent deadline computations.
    ///
    /// The window is clamped to [150, 2000] ms; a deadline already armed
    /// for the current burst is unaffected.
    pub async fn configure(
        &self,
        window_ms: u32,
        trigger_key: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::Configure {
                window_ms,
                trigger_key: trigger_key.into(),
            })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Abort the current burst without emitting.
    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::Cancel)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Snapshot of current session state.
    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Status { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Subscribe to finalized bursts (one value per completed burst).
    pub fn subscribe(&self) -> broadcast::Receiver<BurstOutcome> {
        self.emit_tx.subscribe()
    }

    /// Countdown telemetry; `None` while idle.
    pub fn progress(&self) -> watch::Receiver<Option<Progress>> {
        self.progress_rx.clone()
    }

    /// Stop the session task. Subsequent calls on any clone fail with
    /// [`SessionError::Closed`].
    pub async fn shutdown(&self) {
        let _ = self.tx.send(SessionCommand::Shutdown).await;
    }
}
