//! Sticky Registry Module
//!
//! The shared set of windows that act as snap anchors, plus the process-wide
//! stick gap. One context is created by the host and handed to every
//! controller; all access happens on the owning UI thread.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::platform::{Platform, WindowId};
use crate::shared::{Rect, SizeLimits};

/// Default pixel distance within which an edge snaps.
pub const DEFAULT_STICK_GAP: i32 = 10;

/// How a tracked window participates in snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedKind {
    /// Dragged by a controller and anchors others.
    Sticky,
    /// Registered externally; anchors others but is never dragged here.
    Reference,
}

/// A live window known to the snapping system.
#[derive(Debug, Clone)]
pub struct TrackedWindow {
    pub window: WindowId,
    /// Bounds as last observed; refreshed from the platform when anchoring.
    pub bounds: Rect,
    pub limits: SizeLimits,
    pub kind: TrackedKind,
}

#[derive(Default)]
struct WindowRegistry {
    entries: Vec<TrackedWindow>,
}

impl WindowRegistry {
    fn add(&mut self, entry: TrackedWindow) {
        if self.entries.iter().any(|e| e.window == entry.window) {
            return;
        }
        self.entries.push(entry);
    }

    fn remove(&mut self, window: WindowId) {
        self.entries.retain(|e| e.window != window);
    }
}

/// Shared sticky-window state: the anchor registry and the stick gap.
pub struct StickyContext {
    registry: RefCell<WindowRegistry>,
    stick_gap: Cell<i32>,
}

impl StickyContext {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            registry: RefCell::new(WindowRegistry::default()),
            stick_gap: Cell::new(DEFAULT_STICK_GAP),
        })
    }

    pub fn stick_gap(&self) -> i32 {
        self.stick_gap.get()
    }

    /// Affects subsequent snap computations across all windows; anything
    /// already committed stays where it is.
    pub fn set_stick_gap(&self, gap: i32) {
        self.stick_gap.set(gap);
    }

    /// Add a window as a static snap anchor. Duplicate registration keeps a
    /// single entry.
    pub fn register_reference_window(&self, platform: &dyn Platform, window: WindowId) {
        let bounds = platform.window_bounds(window).unwrap_or_default();
        debug!("registering reference window {:?} at {:?}", window, bounds);
        self.registry.borrow_mut().add(TrackedWindow {
            window,
            bounds,
            limits: SizeLimits::unbounded(),
            kind: TrackedKind::Reference,
        });
    }

    /// Remove a reference window. Removing a non-member is a no-op.
    pub fn unregister_reference_window(&self, window: WindowId) {
        self.registry.borrow_mut().remove(window);
    }

    pub(crate) fn track_sticky(&self, platform: &dyn Platform, window: WindowId) {
        let bounds = platform.window_bounds(window).unwrap_or_default();
        let limits = platform.window_size_limits(window);
        debug!("tracking sticky window {:?} at {:?}", window, bounds);
        self.registry.borrow_mut().add(TrackedWindow {
            window,
            bounds,
            limits,
            kind: TrackedKind::Sticky,
        });
    }

    pub(crate) fn release(&self, window: WindowId) {
        debug!("releasing tracked window {:?}", window);
        self.registry.borrow_mut().remove(window);
    }

    /// Record the bounds a controller just committed for its window.
    pub(crate) fn commit_bounds(&self, window: WindowId, bounds: Rect) {
        if let Some(entry) = self
            .registry
            .borrow_mut()
            .entries
            .iter_mut()
            .find(|e| e.window == window)
        {
            entry.bounds = bounds;
        }
    }

    /// Current bounds of every tracked window except `exclude`, for use as
    /// snap anchors. Bounds are re-read from the platform so a drag always
    /// sees siblings where they actually are; the stored bounds are the
    /// fallback when the query fails.
    pub(crate) fn anchor_bounds(&self, platform: &dyn Platform, exclude: WindowId) -> Vec<Rect> {
        self.registry
            .borrow()
            .entries
            .iter()
            .filter(|e| e.window != exclude)
            .map(|e| platform.window_bounds(e.window).unwrap_or(e.bounds))
            .collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    /// Whether a window is tracked purely as an external anchor.
    pub fn is_reference(&self, window: WindowId) -> bool {
        self.registry
            .borrow()
            .entries
            .iter()
            .any(|e| e.window == window && e.kind == TrackedKind::Reference)
    }
}
