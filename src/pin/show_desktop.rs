//! Show-desktop gesture detection.
//!
//! Fed from a global low-level keyboard filter: the gesture fires on the
//! show-desktop letter going down while a meta/super key is held. The meta
//! key is read live from the platform rather than from the event payload,
//! because the hook sees the letter event before the modifier state it was
//! composed with is reflected there.

use std::time::Duration;

use tracing::debug;

use crate::platform::{Key, Platform};

/// Repeat suppression window after a trigger.
pub const TRIGGER_COOLDOWN: Duration = Duration::from_millis(200);

/// Debounced detector for the show-desktop key gesture.
pub struct ShowDesktopWatcher {
    cooldown: Duration,
    triggered_at: Option<std::time::Instant>,
}

impl ShowDesktopWatcher {
    pub fn new() -> Self {
        Self {
            cooldown: TRIGGER_COOLDOWN,
            triggered_at: None,
        }
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            triggered_at: None,
        }
    }

    /// Feed one key event from the global filter. Returns true when the
    /// show-desktop gesture fired. Key auto-repeat within the cool-down is
    /// swallowed; the cool-down re-arms itself once elapsed.
    pub fn observe(&mut self, platform: &dyn Platform, key: Key, pressed: bool) -> bool {
        if let Some(at) = self.triggered_at {
            if platform.now().duration_since(at) < self.cooldown {
                return false;
            }
            self.triggered_at = None;
        }

        if pressed
            && key == Key::D
            && (platform.key_held(Key::MetaLeft) || platform.key_held(Key::MetaRight))
        {
            debug!("show-desktop gesture detected");
            self.triggered_at = Some(platform.now());
            return true;
        }
        false
    }
}

impl Default for ShowDesktopWatcher {
    fn default() -> Self {
        Self::new()
    }
}
