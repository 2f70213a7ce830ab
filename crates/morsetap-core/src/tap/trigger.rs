//! Trigger matching for raw input events
//!
//! Decides which raw events qualify as taps. Key events match the configured
//! trigger key case-insensitively, with a blank value standing in for the
//! space key. Pointer events require the ctrl chord so ambient clicks do not
//! register. Events are statically shaped; anything malformed fails to
//! deserialize at the boundary instead of being silently coerced.

use serde::{Deserialize, Serialize};

/// Label carried by a qualifying tap, identifying its origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapSource {
    /// Trigger key press
    Key,
    /// Direct tap surface (the on-screen button)
    Tap,
    /// Ctrl-click
    Click,
}

impl TapSource {
    /// Stable lowercase label for logging and wire formats
    pub fn as_str(&self) -> &'static str {
        match self {
            TapSource::Key => "key",
            TapSource::Tap => "tap",
            TapSource::Click => "click",
        }
    }
}

/// A raw input event crossing into the core, statically shaped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InputEvent {
    /// Key press with its logical key identity (e.g. `"a"`, `" "`, `"Enter"`)
    Key {
        /// Logical key value as reported by the input source
        key: String,
    },
    /// Pointer click; only qualifies with the ctrl chord held
    Pointer {
        /// Whether ctrl was held during the click
        #[serde(default)]
        ctrl: bool,
    },
    /// Direct tap surface; always qualifies
    Tap,
}

/// Configured trigger key with the matching rules applied
///
/// # Example
/// ```
/// use morsetap_core::tap::trigger::{InputEvent, TapSource, TriggerKey};
///
/// let trigger = TriggerKey::new(" ");
/// let hit = trigger.match_event(&InputEvent::Key { key: "Space".into() });
/// assert_eq!(hit, Some(TapSource::Key));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerKey {
    value: String,
}

impl TriggerKey {
    /// Create a trigger from the configured key value.
    ///
    /// A blank or whitespace-only value is the sentinel for the space key.
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    /// True when this trigger targets the space key
    pub fn is_space(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Configured raw value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Human-readable form, `"Space"` for the sentinel
    pub fn display(&self) -> String {
        if self.is_space() {
            "Space".to_string()
        } else {
            self.value.to_uppercase()
        }
    }

    /// True when the given logical key identity hits this trigger.
    ///
    /// Comparison is case-insensitive. The space sentinel accepts both the
    /// literal `" "` key value and the `"Space"` key code.
    pub fn matches_key(&self, key: &str) -> bool {
        if self.is_space() {
            key == " " || key.eq_ignore_ascii_case("space")
        } else {
            key.eq_ignore_ascii_case(&self.value)
        }
    }

    /// Classify a raw event, returning the tap source when it qualifies.
    pub fn match_event(&self, event: &InputEvent) -> Option<TapSource> {
        match event {
            InputEvent::Key { key } => self.matches_key(key).then_some(TapSource::Key),
            InputEvent::Pointer { ctrl } => ctrl.then_some(TapSource::Click),
            InputEvent::Tap => Some(TapSource::Tap),
        }
    }
}
