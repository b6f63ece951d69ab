use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lift (500ms) + slide (500ms) + settle (300ms) of the board animation.
const DEFAULT_ROTATION_SETTLE_MS: u64 = 1300;

/// Client settings. Missing fields fall back to their defaults, so a
/// partial JSON object from the page is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// How long input stays blocked after a rotation.
    pub rotation_settle_ms: u64,
    /// Attach a CRC32 digest of the sender's state to every game-state message.
    pub attach_digest: bool,
}

impl Settings {
    pub fn rotation_settle(&self) -> Duration {
        Duration::from_millis(self.rotation_settle_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rotation_settle_ms: DEFAULT_ROTATION_SETTLE_MS,
            attach_digest: true,
        }
    }
}
