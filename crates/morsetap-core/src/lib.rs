//! Morsetap Core - burst aggregation, trigger matching, and signal history
//!
//! This library provides the core functionality for turning a stream of
//! repeated input events (key presses, taps, ctrl-clicks) into integer
//! signals: the number of taps within a rolling silence window, capped at 5,
//! becomes the emitted value.

pub mod actor;
pub mod config;
pub mod signal;
pub mod tap;

pub use actor::ActorId;
pub use config::TapConfig;
pub use signal::store::{SignalRecord, SignalStore};
pub use tap::aggregator::{BurstAggregator, BurstOutcome, Progress};
pub use tap::session::{SessionHandle, SessionStatus, TapSession};
pub use tap::trigger::{InputEvent, TapSource, TriggerKey};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Smallest accepted burst window in milliseconds
pub const MIN_WINDOW_MS: u32 = 150;

/// Largest accepted burst window in milliseconds
pub const MAX_WINDOW_MS: u32 = 2000;

/// Default burst window in milliseconds
pub const DEFAULT_WINDOW_MS: u32 = 700;

/// Largest emitted signal value; raw tap counts above this are clamped
pub const MAX_SIGNAL_VALUE: u8 = 5;
