//! Platform Module
//!
//! The windowing capabilities the core needs from its host environment:
//! window bounds, monitor work areas, coordinate conversion, pointer capture,
//! bottom/top z-order placement without activation, peek exclusion, live
//! modifier-key state and child-window lookup by class. The Win32 backend
//! lives in `win32`; tests run against the in-memory double in `fake`.

use std::time::{Duration, Instant};

use anyhow::Result;
use bitflags::bitflags;

use crate::shared::{Edges, Point, Rect, SizeLimits};

#[cfg(test)]
pub mod fake;
#[cfg(windows)]
pub mod win32;

/// Opaque handle to a live platform window.
///
/// The zero handle is reserved as "no window" so callers can fail fast on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(i64);

impl WindowId {
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Keys the core cares about. Everything else arrives as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    /// The show-desktop accelerator letter.
    D,
    MetaLeft,
    MetaRight,
    Other(u32),
}

/// Where inside the non-client area a pointer event landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTest {
    Caption,
    Left,
    Right,
    Top,
    TopLeft,
    TopRight,
    Bottom,
    BottomLeft,
    BottomRight,
    Client,
    Other(i32),
}

impl HitTest {
    /// The edge set a border/corner hit drags, or `None` for non-resize hits.
    pub fn resize_edges(&self) -> Option<Edges> {
        match self {
            HitTest::Left => Some(Edges::LEFT),
            HitTest::Right => Some(Edges::RIGHT),
            HitTest::Top => Some(Edges::TOP),
            HitTest::Bottom => Some(Edges::BOTTOM),
            HitTest::TopLeft => Some(Edges::TOP | Edges::LEFT),
            HitTest::TopRight => Some(Edges::TOP | Edges::RIGHT),
            HitTest::BottomLeft => Some(Edges::BOTTOM | Edges::LEFT),
            HitTest::BottomRight => Some(Edges::BOTTOM | Edges::RIGHT),
            _ => None,
        }
    }
}

/// Window messages the sticky controller consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMessage {
    /// Non-client button down; `screen_pos` is as reported by the message.
    NcButtonDown { hit: HitTest, screen_pos: Point },
    /// Pointer moved while captured; `pos` is window-local.
    PointerMove { pos: Point },
    /// Primary button released while captured.
    ButtonUp,
    KeyDown { key: Key },
    /// Pointer capture was taken away externally.
    CaptureLost,
}

/// Whether a message was consumed or should continue to default processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    /// Pass event through
    Pass,
    /// Remove/ignore event
    Remove,
}

bitflags! {
    /// Flags on a proposed window placement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlacementFlags: u32 {
        const NO_ZORDER   = 1 << 0;
        const NO_SIZE     = 1 << 1;
        const NO_MOVE     = 1 << 2;
        const NO_ACTIVATE = 1 << 3;
    }
}

/// A position change the platform is about to apply to a window. Handlers
/// may force flags in before the change goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPlacement {
    pub bounds: Rect,
    pub flags: PlacementFlags,
}

/// Host-environment capability surface.
///
/// All calls are best-effort from the core's point of view: a failed z-order
/// or capture call is logged and swallowed by the caller, never retried.
/// Implementations keep any mutability internal so handlers can share one
/// instance freely on the single owning thread.
pub trait Platform {
    /// Current bounds of a window in screen coordinates.
    fn window_bounds(&self, window: WindowId) -> Result<Rect>;

    /// Move/size a window without activating it or changing its z-order.
    fn set_window_bounds(&self, window: WindowId, bounds: Rect) -> Result<()>;

    /// The window's own declared min/max size.
    fn window_size_limits(&self, window: WindowId) -> SizeLimits;

    /// The platform's global min/max trackable window size.
    fn track_size_limits(&self) -> SizeLimits;

    /// Work area of the monitor containing `point`, or `None` if the point is
    /// outside every monitor.
    fn monitor_work_area(&self, point: Point) -> Option<Rect>;

    /// Work area of the monitor nearest to `point`. Always succeeds.
    fn nearest_work_area(&self, point: Point) -> Rect;

    /// Convert a window-local point to screen coordinates.
    fn window_to_screen(&self, window: WindowId, point: Point) -> Point;

    /// Live pointer position in screen coordinates.
    fn cursor_pos(&self) -> Point;

    /// Route all pointer input to `window` until released.
    fn capture_pointer(&self, window: WindowId) -> Result<()>;

    fn release_pointer(&self);

    /// Place a window at the very bottom of the stack, keeping geometry and
    /// focus untouched.
    fn place_bottom(&self, window: WindowId) -> Result<()>;

    /// Place a window at the very top of the stack without activating it.
    fn place_top(&self, window: WindowId) -> Result<()>;

    /// Exclude a window from peek-style desktop previews. A no-op error on
    /// platforms without the concept.
    fn exclude_from_peek(&self, window: WindowId) -> Result<()>;

    /// Live pressed state of a key, independent of the event being handled.
    fn key_held(&self, key: Key) -> bool;

    /// Find a direct child of `parent` by window class name.
    fn find_child_by_class(&self, parent: WindowId, class: &str) -> Option<WindowId>;

    fn now(&self) -> Instant;

    /// Short bounded sleep used while polling for shell windows.
    fn sleep(&self, duration: Duration);
}
