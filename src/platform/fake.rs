//! In-memory platform double for unit tests.
//!
//! Models windows, monitors, a z-order stack, pointer capture and key state
//! as plain collections, with a manually advanced clock.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

use crate::shared::{Point, Rect, Size, SizeLimits};

use super::{Key, Platform, WindowId};

#[derive(Debug, Clone)]
struct FakeWindow {
    bounds: Rect,
    limits: SizeLimits,
    peek_excluded: bool,
    children: Vec<(String, WindowId)>,
}

#[derive(Debug, Clone, Copy)]
struct FakeMonitor {
    bounds: Rect,
    work_area: Rect,
}

struct Inner {
    windows: HashMap<WindowId, FakeWindow>,
    /// Bottom to top.
    z_order: Vec<WindowId>,
    monitors: Vec<FakeMonitor>,
    cursor: Point,
    held: HashSet<Key>,
    captured: Option<WindowId>,
    capture_fails: bool,
    now: Instant,
    slept: Duration,
    track_limits: SizeLimits,
}

pub struct FakePlatform {
    inner: RefCell<Inner>,
}

impl FakePlatform {
    /// One 1920x1080 monitor with a 40px taskbar strip at the bottom.
    pub fn new() -> Self {
        let monitor = FakeMonitor {
            bounds: Rect::new(0, 0, 1920, 1080),
            work_area: Rect::new(0, 0, 1920, 1040),
        };
        Self {
            inner: RefCell::new(Inner {
                windows: HashMap::new(),
                z_order: Vec::new(),
                monitors: vec![monitor],
                cursor: Point::new(0, 0),
                held: HashSet::new(),
                captured: None,
                capture_fails: false,
                now: Instant::now(),
                slept: Duration::ZERO,
                track_limits: SizeLimits::new(Size::new(40, 20), Size::new(4000, 4000)),
            }),
        }
    }

    pub fn add_monitor(&self, bounds: Rect, work_area: Rect) {
        self.inner
            .borrow_mut()
            .monitors
            .push(FakeMonitor { bounds, work_area });
    }

    pub fn add_window(&self, window: WindowId, bounds: Rect) {
        let mut inner = self.inner.borrow_mut();
        inner.windows.insert(
            window,
            FakeWindow {
                bounds,
                limits: SizeLimits::unbounded(),
                peek_excluded: false,
                children: Vec::new(),
            },
        );
        inner.z_order.push(window);
    }

    pub fn add_child(&self, parent: WindowId, class: &str, child: WindowId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(w) = inner.windows.get_mut(&parent) {
            w.children.push((class.to_string(), child));
        }
    }

    pub fn set_window_limits(&self, window: WindowId, limits: SizeLimits) {
        if let Some(w) = self.inner.borrow_mut().windows.get_mut(&window) {
            w.limits = limits;
        }
    }

    pub fn set_track_limits(&self, limits: SizeLimits) {
        self.inner.borrow_mut().track_limits = limits;
    }

    pub fn set_cursor(&self, pos: Point) {
        self.inner.borrow_mut().cursor = pos;
    }

    pub fn hold_key(&self, key: Key) {
        self.inner.borrow_mut().held.insert(key);
    }

    pub fn release_key(&self, key: Key) {
        self.inner.borrow_mut().held.remove(&key);
    }

    pub fn fail_capture(&self, fail: bool) {
        self.inner.borrow_mut().capture_fails = fail;
    }

    pub fn advance(&self, by: Duration) {
        let mut inner = self.inner.borrow_mut();
        inner.now += by;
    }

    pub fn bounds(&self, window: WindowId) -> Rect {
        self.inner.borrow().windows[&window].bounds
    }

    pub fn captured(&self) -> Option<WindowId> {
        self.inner.borrow().captured
    }

    pub fn peek_excluded(&self, window: WindowId) -> bool {
        self.inner.borrow().windows[&window].peek_excluded
    }

    /// Position in the stack, 0 = bottom.
    pub fn stack_position(&self, window: WindowId) -> Option<usize> {
        self.inner.borrow().z_order.iter().position(|&w| w == window)
    }

    pub fn stack_len(&self) -> usize {
        self.inner.borrow().z_order.len()
    }

    pub fn total_slept(&self) -> Duration {
        self.inner.borrow().slept
    }
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for FakePlatform {
    fn window_bounds(&self, window: WindowId) -> Result<Rect> {
        self.inner
            .borrow()
            .windows
            .get(&window)
            .map(|w| w.bounds)
            .ok_or_else(|| anyhow!("unknown window {:?}", window))
    }

    fn set_window_bounds(&self, window: WindowId, bounds: Rect) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let w = inner
            .windows
            .get_mut(&window)
            .ok_or_else(|| anyhow!("unknown window {:?}", window))?;
        w.bounds = bounds;
        Ok(())
    }

    fn window_size_limits(&self, window: WindowId) -> SizeLimits {
        self.inner
            .borrow()
            .windows
            .get(&window)
            .map(|w| w.limits)
            .unwrap_or_default()
    }

    fn track_size_limits(&self) -> SizeLimits {
        self.inner.borrow().track_limits
    }

    fn monitor_work_area(&self, point: Point) -> Option<Rect> {
        self.inner
            .borrow()
            .monitors
            .iter()
            .find(|m| m.bounds.contains(point))
            .map(|m| m.work_area)
    }

    fn nearest_work_area(&self, point: Point) -> Rect {
        let inner = self.inner.borrow();
        inner
            .monitors
            .iter()
            .min_by_key(|m| {
                let clamped = m.bounds.clamp_point(point);
                let dx = (clamped.x - point.x) as i64;
                let dy = (clamped.y - point.y) as i64;
                dx * dx + dy * dy
            })
            .map(|m| m.work_area)
            .expect("fake platform always has a monitor")
    }

    fn window_to_screen(&self, window: WindowId, point: Point) -> Point {
        let origin = self
            .inner
            .borrow()
            .windows
            .get(&window)
            .map(|w| w.bounds.origin())
            .unwrap_or_default();
        Point::new(origin.x + point.x, origin.y + point.y)
    }

    fn cursor_pos(&self) -> Point {
        self.inner.borrow().cursor
    }

    fn capture_pointer(&self, window: WindowId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.capture_fails {
            return Err(anyhow!("capture refused"));
        }
        inner.captured = Some(window);
        Ok(())
    }

    fn release_pointer(&self) {
        self.inner.borrow_mut().captured = None;
    }

    fn place_bottom(&self, window: WindowId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.z_order.retain(|&w| w != window);
        inner.z_order.insert(0, window);
        Ok(())
    }

    fn place_top(&self, window: WindowId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.z_order.retain(|&w| w != window);
        inner.z_order.push(window);
        Ok(())
    }

    fn exclude_from_peek(&self, window: WindowId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let w = inner
            .windows
            .get_mut(&window)
            .ok_or_else(|| anyhow!("unknown window {:?}", window))?;
        w.peek_excluded = true;
        Ok(())
    }

    fn key_held(&self, key: Key) -> bool {
        self.inner.borrow().held.contains(&key)
    }

    fn find_child_by_class(&self, parent: WindowId, class: &str) -> Option<WindowId> {
        self.inner
            .borrow()
            .windows
            .get(&parent)
            .and_then(|w| w.children.iter().find(|(c, _)| c == class).map(|(_, id)| *id))
    }

    fn now(&self) -> Instant {
        self.inner.borrow().now
    }

    fn sleep(&self, duration: Duration) {
        let mut inner = self.inner.borrow_mut();
        inner.now += duration;
        inner.slept += duration;
    }
}
