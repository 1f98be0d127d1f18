//! Desktop Pin Module
//!
//! Keeps attached windows rendered as part of the desktop background: always
//! beneath normal application windows, excluded from peek previews, yet
//! interactive. Briefly surfaces a window while a context menu is open and
//! races the shell to push it back down whenever something else would change
//! its z-order. Also handles the show-desktop round trip so pinned windows
//! stay visible over the revealed desktop.

pub mod show_desktop;

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::platform::{FilterStatus, PendingPlacement, PlacementFlags, Platform, WindowId};

pub use show_desktop::ShowDesktopWatcher;

/// Window classes the shell uses for the desktop root.
const SHELL_ROOT_CLASSES: [&str; 2] = ["Progman", "WorkerW"];
/// The shell's desktop view child, recreated lazily after a show-desktop
/// toggle.
const SHELL_VIEW_CLASS: &str = "SHELLDLL_DefView";
const SHELL_VIEW_POLL_ATTEMPTS: u32 = 5;
const SHELL_VIEW_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A raised window is only pushed back once the dismissal delay has elapsed,
/// so the activation churn from the raise itself does not dismiss the menu.
const MENU_DISMISS_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct PinnedWindow {
    window: WindowId,
    menu_active: bool,
    menu_raised_at: Option<Instant>,
}

/// Pins a set of windows to the desktop background layer.
pub struct DesktopPinner {
    windows: Vec<PinnedWindow>,
    showing_desktop: bool,
    update_in_progress: bool,
    menu_dismiss_delay: Duration,
}

impl DesktopPinner {
    pub fn new() -> Self {
        Self {
            windows: Vec::new(),
            showing_desktop: false,
            update_in_progress: false,
            menu_dismiss_delay: MENU_DISMISS_DELAY,
        }
    }

    /// Non-activating, geometry-preserving push to the very bottom of the
    /// stack. Best-effort; the next message re-attempts on failure.
    pub fn send_to_back(platform: &dyn Platform, window: WindowId) {
        if let Err(e) = platform.place_bottom(window) {
            warn!("send-to-back failed for {:?}: {e:#}", window);
        }
    }

    /// Non-activating push to the very top of the stack.
    pub fn send_to_top(platform: &dyn Platform, window: WindowId) {
        if let Err(e) = platform.place_top(window) {
            warn!("send-to-top failed for {:?}: {e:#}", window);
        }
    }

    /// Start managing a window: exclude it from peek previews and drop it to
    /// the bottom of the stack. Attaching twice is a no-op.
    pub fn attach(&mut self, platform: &dyn Platform, window: WindowId) {
        if self.windows.iter().any(|w| w.window == window) {
            return;
        }
        debug!("pinning {:?} to the desktop", window);
        if let Err(e) = platform.exclude_from_peek(window) {
            warn!("peek exclusion unavailable for {:?}: {e:#}", window);
        }
        Self::send_to_back(platform, window);
        self.windows.push(PinnedWindow {
            window,
            menu_active: false,
            menu_raised_at: None,
        });
    }

    pub fn detach(&mut self, window: WindowId) {
        self.windows.retain(|w| w.window != window);
    }

    pub fn is_attached(&self, window: WindowId) -> bool {
        self.windows.iter().any(|w| w.window == window)
    }

    pub fn is_showing_desktop(&self) -> bool {
        self.showing_desktop
    }

    /// Host-owned flag set while it reprograms window geometry itself, so the
    /// position-changing clamp stays out of the way.
    pub fn set_update_in_progress(&mut self, in_progress: bool) {
        self.update_in_progress = in_progress;
    }

    /// A child of the window reported a right-button press: a context menu is
    /// about to appear. Surface the window and arm the dismissal delay.
    pub fn on_context_menu_opening(
        &mut self,
        platform: &dyn Platform,
        window: WindowId,
    ) -> FilterStatus {
        let now = platform.now();
        let Some(entry) = self.windows.iter_mut().find(|w| w.window == window) else {
            return FilterStatus::Pass;
        };
        debug!("context menu opening on {:?}, surfacing", window);
        entry.menu_active = true;
        entry.menu_raised_at = Some(now);
        Self::send_to_top(platform, window);
        FilterStatus::Remove
    }

    /// Activation finished on the window. Once the menu was up and the
    /// dismissal delay has passed, send the window back down.
    pub fn on_activation_settled(
        &mut self,
        platform: &dyn Platform,
        window: WindowId,
    ) -> FilterStatus {
        let now = platform.now();
        let delay = self.menu_dismiss_delay;
        let Some(entry) = self.windows.iter_mut().find(|w| w.window == window) else {
            return FilterStatus::Pass;
        };
        if !entry.menu_active {
            return FilterStatus::Pass;
        }
        let elapsed = entry
            .menu_raised_at
            .map(|at| now.duration_since(at) >= delay)
            .unwrap_or(true);
        if !elapsed {
            return FilterStatus::Pass;
        }
        debug!("context menu dismissed on {:?}, sinking", window);
        entry.menu_active = false;
        entry.menu_raised_at = None;
        Self::send_to_back(platform, window);
        FilterStatus::Remove
    }

    /// The platform proposed a position change. Unless a context menu, a
    /// host update, or an interactive drag is in flight, pin the z-order in
    /// place and push the window back down.
    pub fn on_position_changing(
        &mut self,
        platform: &dyn Platform,
        window: WindowId,
        placement: &mut PendingPlacement,
        drag_in_progress: bool,
    ) -> FilterStatus {
        let update_in_progress = self.update_in_progress;
        let Some(entry) = self.windows.iter().find(|w| w.window == window) else {
            return FilterStatus::Pass;
        };
        if entry.menu_active || update_in_progress || drag_in_progress {
            return FilterStatus::Pass;
        }
        debug!(
            "clamping z-order for {:?} (proposed {:?})",
            window, placement.bounds
        );
        placement.flags |= PlacementFlags::NO_ZORDER;
        Self::send_to_back(platform, window);
        FilterStatus::Remove
    }

    /// The show-desktop gesture fired: surface every pinned window so they
    /// stay visible over the revealed desktop.
    pub fn on_show_desktop_requested(&mut self, platform: &dyn Platform) {
        debug!("show desktop: surfacing {} pinned windows", self.windows.len());
        for entry in &self.windows {
            Self::send_to_top(platform, entry.window);
        }
        self.showing_desktop = true;
    }

    /// The foreground changed. When the shell's desktop root takes it back
    /// after a show-desktop toggle, wait briefly for the shell to recreate
    /// its view child, then sink every pinned window again.
    pub fn on_foreground_changed(
        &mut self,
        platform: &dyn Platform,
        foreground: WindowId,
        class_name: &str,
    ) {
        if !self.showing_desktop {
            return;
        }
        if !SHELL_ROOT_CLASSES.contains(&class_name) {
            return;
        }
        // The shell recreates the view window lazily; if it never shows up,
        // proceed anyway.
        for _ in 0..SHELL_VIEW_POLL_ATTEMPTS {
            if platform
                .find_child_by_class(foreground, SHELL_VIEW_CLASS)
                .is_some()
            {
                break;
            }
            platform.sleep(SHELL_VIEW_POLL_INTERVAL);
        }
        debug!("desktop restored: sinking {} pinned windows", self.windows.len());
        for entry in &self.windows {
            Self::send_to_back(platform, entry.window);
        }
        self.showing_desktop = false;
    }
}

impl Default for DesktopPinner {
    fn default() -> Self {
        Self::new()
    }
}
