//! Process-local actor identity
//!
//! Each running client identifies its emitted signals with a short
//! pseudo-random id. The id is opaque to everything downstream; it exists
//! only so observers can tell their own signals from others'.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Length of a generated id in base-36 characters
const ID_LENGTH: usize = 9;

/// Per-process sequence mixed into the seed so ids generated in the same
/// nanosecond still differ
static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Opaque actor identifier, 9 lowercase base-36 characters when generated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Generate a fresh pseudo-random id.
    ///
    /// Uses the glibc LCG over a time-derived seed; no cryptographic
    /// properties are needed or claimed.
    pub fn generate() -> Self {
        let mut seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
            .unwrap_or(0x6D74_6170);
        seed ^= SEQUENCE
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_mul(0x9E37_79B9);

        let mut out = String::with_capacity(ID_LENGTH);
        for _ in 0..ID_LENGTH {
            // LCG parameters (same as glibc)
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let digit = (seed >> 16) % 36;
            out.push(char::from_digit(digit, 36).unwrap_or('0'));
        }
        ActorId(out)
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ActorId {
    fn from(value: String) -> Self {
        ActorId(value)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_shape() {
        let id = ActorId::generate();
        assert_eq!(id.as_str().len(), 9);
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
            "id should be lowercase base-36, got {}",
            id
        );
    }

    #[test]
    fn test_ids_distinct() {
        let ids: HashSet<String> = (0..50)
            .map(|_| ActorId::generate().as_str().to_string())
            .collect();
        assert_eq!(ids.len(), 50, "sequence mixing should keep ids distinct");
    }

    #[test]
    fn test_serde_transparent() {
        let id = ActorId::from("abc123xyz".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123xyz\"");
        let back: ActorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
