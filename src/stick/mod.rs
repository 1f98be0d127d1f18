//! Sticky Window Module
//!
//! Intercepts a window's non-client hit-test messages and drives interactive
//! move/resize with edge snapping against the monitor work area and the other
//! tracked windows. One controller attaches per window; controllers share a
//! [`StickyContext`] so every window anchors its siblings.

pub mod registry;
mod snap;

use std::mem;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::platform::{FilterStatus, HitTest, Key, Platform, WindowId, WindowMessage};
use crate::shared::{Edges, Point, Rect};

pub use registry::{DEFAULT_STICK_GAP, StickyContext, TrackedKind, TrackedWindow};

/// Raised when an interactive drag completes normally. Cancelled or abandoned
/// drags raise nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    MoveEnded(Rect),
    ResizeEnded(Rect),
}

/// Per-controller drag state. `original` is the window's bounds at grab time,
/// kept for cancel-restore.
#[derive(Debug, Clone, Copy)]
enum DragState {
    Idle,
    Moving { original: Rect, grab: Point },
    Resizing { original: Rect, edges: Edges },
}

/// Attaches sticky move/resize behavior to one window.
pub struct StickyWindowController {
    window: WindowId,
    ctx: Rc<StickyContext>,
    /// Caption drags move the window with snapping.
    pub stick_on_move: bool,
    /// Border/corner drags resize the window with snapping.
    pub stick_on_resize: bool,
    /// Snap against the monitor work-area edges.
    pub stick_to_screen: bool,
    /// Snap against the other tracked windows.
    pub stick_to_other: bool,
    state: DragState,
    on_drag_end: Option<Box<dyn FnMut(DragEvent)>>,
}

impl StickyWindowController {
    /// Attach to a live window and add it to the shared anchor set.
    ///
    /// # Panics
    ///
    /// Panics on a null window handle; attaching to nothing is a programming
    /// error, not a recoverable condition.
    pub fn attach(ctx: &Rc<StickyContext>, platform: &dyn Platform, window: WindowId) -> Self {
        assert!(
            !window.is_null(),
            "sticky controller requires a live window handle"
        );
        ctx.track_sticky(platform, window);
        Self {
            window,
            ctx: Rc::clone(ctx),
            stick_on_move: true,
            stick_on_resize: true,
            stick_to_screen: true,
            stick_to_other: true,
            state: DragState::Idle,
            on_drag_end: None,
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    /// True while a move or resize drag is active. The host feeds this into
    /// the pinner's position-changing gate.
    pub fn is_dragging(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    pub fn on_drag_end(&mut self, handler: impl FnMut(DragEvent) + 'static) {
        self.on_drag_end = Some(Box::new(handler));
    }

    /// Single dispatch point for the window's messages. Returns whether the
    /// message was consumed or should continue to default processing.
    pub fn handle_message(&mut self, platform: &dyn Platform, msg: &WindowMessage) -> FilterStatus {
        match self.state {
            DragState::Idle => match *msg {
                WindowMessage::NcButtonDown { hit, screen_pos } => {
                    self.begin_drag(platform, hit, screen_pos)
                }
                _ => FilterStatus::Pass,
            },
            DragState::Moving { .. } | DragState::Resizing { .. } => match *msg {
                WindowMessage::PointerMove { pos } => {
                    self.track(platform, pos);
                    FilterStatus::Remove
                }
                WindowMessage::ButtonUp => {
                    self.finish(platform);
                    FilterStatus::Remove
                }
                WindowMessage::KeyDown { key: Key::Escape } => {
                    self.cancel(platform);
                    FilterStatus::Remove
                }
                WindowMessage::CaptureLost => {
                    // External capture loss abandons at the last committed
                    // bounds, silently.
                    debug!("capture lost mid-drag on {:?}", self.window);
                    self.state = DragState::Idle;
                    FilterStatus::Remove
                }
                _ => FilterStatus::Pass,
            },
        }
    }

    fn begin_drag(&mut self, platform: &dyn Platform, hit: HitTest, screen_pos: Point) -> FilterStatus {
        let edges = hit.resize_edges();
        let wants_move = hit == HitTest::Caption && self.stick_on_move;
        let wants_resize = edges.is_some() && self.stick_on_resize;
        if !wants_move && !wants_resize {
            return FilterStatus::Pass;
        }

        let original = match platform.window_bounds(self.window) {
            Ok(b) => b,
            Err(e) => {
                warn!("cannot start drag on {:?}: {e:#}", self.window);
                return FilterStatus::Pass;
            }
        };
        if let Err(e) = platform.capture_pointer(self.window) {
            warn!("pointer capture failed on {:?}: {e:#}", self.window);
            return FilterStatus::Pass;
        }

        self.state = if wants_move {
            // Hit-test coordinates lag the true cursor on some shells; start
            // from the reported point and fold in a live cursor read.
            let mut grab = Point::new(screen_pos.x - original.x, screen_pos.y - original.y);
            let live = platform.cursor_pos();
            grab.x += live.x - screen_pos.x;
            grab.y += live.y - screen_pos.y;
            debug!("move drag on {:?}, grab offset {:?}", self.window, grab);
            DragState::Moving { original, grab }
        } else {
            let edges = edges.expect("resize hit carries an edge set");
            debug!("resize drag on {:?}, edges {:?}", self.window, edges);
            DragState::Resizing { original, edges }
        };
        FilterStatus::Remove
    }

    fn track(&mut self, platform: &dyn Platform, pos: Point) {
        match self.state {
            DragState::Moving { original, grab } => self.track_move(platform, pos, original, grab),
            DragState::Resizing { original, edges } => {
                self.track_resize(platform, pos, original, edges)
            }
            DragState::Idle => {}
        }
    }

    fn track_move(&mut self, platform: &dyn Platform, pos: Point, original: Rect, grab: Point) {
        let mut pt = platform.window_to_screen(self.window, pos);
        // Work area of the monitor under the pointer; a pointer outside every
        // monitor is pulled into the nearest one before the offset math.
        let work_area = match platform.monitor_work_area(pt) {
            Some(wa) => wa,
            None => {
                let wa = platform.nearest_work_area(pt);
                pt = wa.clamp_point(pt);
                wa
            }
        };

        let candidate = Rect::new(pt.x - grab.x, pt.y - grab.y, original.width, original.height);
        let gap = self.ctx.stick_gap();
        let screen = self.stick_to_screen.then_some(work_area);
        let anchors = if self.stick_to_other {
            self.ctx.anchor_bounds(platform, self.window)
        } else {
            Vec::new()
        };
        let (dx, dy) = snap::move_offsets(candidate, gap, screen, &anchors);
        self.commit(platform, candidate.translate(dx, dy));
    }

    fn track_resize(&mut self, platform: &dyn Platform, pos: Point, original: Rect, edges: Edges) {
        let pt = platform.window_to_screen(self.window, pos);
        let mut left = original.left();
        let mut top = original.top();
        let mut right = original.right();
        let mut bottom = original.bottom();

        // Only the grabbed edges track the pointer; the opposite edges are
        // pinned.
        if edges.contains(Edges::LEFT) {
            left = pt.x;
        }
        if edges.contains(Edges::RIGHT) {
            right = pt.x;
        }
        if edges.contains(Edges::TOP) {
            top = pt.y;
        }
        if edges.contains(Edges::BOTTOM) {
            bottom = pt.y;
        }

        let candidate = Rect::from_edges(left, top, right, bottom);
        let gap = self.ctx.stick_gap();
        let screen = if self.stick_to_screen {
            Some(
                platform
                    .monitor_work_area(pt)
                    .unwrap_or_else(|| platform.nearest_work_area(pt)),
            )
        } else {
            None
        };
        let anchors = if self.stick_to_other {
            self.ctx.anchor_bounds(platform, self.window)
        } else {
            Vec::new()
        };
        let offs = snap::resize_offsets(candidate, edges, gap, screen, &anchors);
        if edges.contains(Edges::LEFT) {
            left += offs.left;
        }
        if edges.contains(Edges::RIGHT) {
            right += offs.right;
        }
        if edges.contains(Edges::TOP) {
            top += offs.top;
        }
        if edges.contains(Edges::BOTTOM) {
            bottom += offs.bottom;
        }

        // Clamp to the window's declared limits and the platform's trackable
        // range. A clamp on a left/top edge moves that edge back, keeping the
        // opposite edge stationary.
        let limits = platform
            .window_size_limits(self.window)
            .intersect(&platform.track_size_limits());
        let width = clamp_dim(right - left, limits.min.width, limits.max.width);
        if edges.contains(Edges::LEFT) {
            left = right - width;
        } else {
            right = left + width;
        }
        let height = clamp_dim(bottom - top, limits.min.height, limits.max.height);
        if edges.contains(Edges::TOP) {
            top = bottom - height;
        } else {
            bottom = top + height;
        }

        self.commit(platform, Rect::from_edges(left, top, right, bottom));
    }

    fn commit(&self, platform: &dyn Platform, bounds: Rect) {
        match platform.set_window_bounds(self.window, bounds) {
            Ok(()) => self.ctx.commit_bounds(self.window, bounds),
            Err(e) => warn!("failed to apply {:?} to {:?}: {e:#}", bounds, self.window),
        }
    }

    /// Normal completion: release capture and raise the end notification.
    fn finish(&mut self, platform: &dyn Platform) {
        let state = mem::replace(&mut self.state, DragState::Idle);
        platform.release_pointer();
        let event = match state {
            DragState::Moving { original, .. } => {
                DragEvent::MoveEnded(platform.window_bounds(self.window).unwrap_or(original))
            }
            DragState::Resizing { original, .. } => {
                DragEvent::ResizeEnded(platform.window_bounds(self.window).unwrap_or(original))
            }
            DragState::Idle => return,
        };
        debug!("drag finished on {:?}: {:?}", self.window, event);
        if let Some(handler) = self.on_drag_end.as_mut() {
            handler(event);
        }
    }

    /// Escape: restore the pre-drag bounds exactly, raise nothing.
    fn cancel(&mut self, platform: &dyn Platform) {
        let state = mem::replace(&mut self.state, DragState::Idle);
        if let DragState::Moving { original, .. } | DragState::Resizing { original, .. } = state {
            debug!("drag cancelled on {:?}, restoring {:?}", self.window, original);
            self.commit(platform, original);
        }
        platform.release_pointer();
    }
}

impl Drop for StickyWindowController {
    fn drop(&mut self) {
        self.ctx.release(self.window);
    }
}

fn clamp_dim(value: i32, min: i32, max: i32) -> i32 {
    value.max(min).min(max.max(min))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use crate::shared::{Size, SizeLimits};
    use std::cell::RefCell;

    fn window(raw: i64) -> WindowId {
        WindowId::from_raw(raw)
    }

    /// Press the caption at `at` (screen coords, cursor agreeing with the
    /// message) so a move drag starts.
    fn grab_caption(
        c: &mut StickyWindowController,
        platform: &FakePlatform,
        at: Point,
    ) -> FilterStatus {
        platform.set_cursor(at);
        c.handle_message(
            platform,
            &WindowMessage::NcButtonDown {
                hit: HitTest::Caption,
                screen_pos: at,
            },
        )
    }

    /// Move the captured pointer to the given screen position.
    fn drag_to(c: &mut StickyWindowController, platform: &FakePlatform, screen: Point) {
        let origin = platform.bounds(c.window()).origin();
        let local = Point::new(screen.x - origin.x, screen.y - origin.y);
        c.handle_message(platform, &WindowMessage::PointerMove { pos: local });
    }

    #[test]
    fn snaps_to_sibling_at_gap_and_not_past_it() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let a = window(1);
        let b = window(2);
        platform.add_window(a, Rect::new(0, 0, 200, 200));
        platform.add_window(b, Rect::new(400, 100, 100, 100));
        let _anchor = StickyWindowController::attach(&ctx, &platform, a);
        let mut mover = StickyWindowController::attach(&ctx, &platform, b);

        assert_eq!(
            grab_caption(&mut mover, &platform, Point::new(450, 150)),
            FilterStatus::Remove
        );
        // Grab offset is (50, 50); pointer at x=260 puts the left edge at 210,
        // exactly one gap from the anchor's right edge at 200.
        drag_to(&mut mover, &platform, Point::new(260, 150));
        assert_eq!(platform.bounds(b).x, 200);

        // One pixel past the gap: no snap.
        drag_to(&mut mover, &platform, Point::new(261, 150));
        assert_eq!(platform.bounds(b).x, 211);
    }

    #[test]
    fn resize_from_top_left_keeps_opposite_edges() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let w = window(1);
        platform.add_window(w, Rect::new(100, 100, 300, 200));
        let mut c = StickyWindowController::attach(&ctx, &platform, w);

        platform.set_cursor(Point::new(100, 100));
        let status = c.handle_message(
            &platform,
            &WindowMessage::NcButtonDown {
                hit: HitTest::TopLeft,
                screen_pos: Point::new(100, 100),
            },
        );
        assert_eq!(status, FilterStatus::Remove);

        // Pointer to (120, 150): far from any snap anchor.
        c.handle_message(&platform, &WindowMessage::PointerMove { pos: Point::new(20, 50) });
        assert_eq!(platform.bounds(w), Rect::new(120, 150, 280, 150));
    }

    #[test]
    fn resize_clamp_on_left_edge_keeps_right_edge_fixed() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let w = window(1);
        platform.add_window(w, Rect::new(100, 100, 300, 200));
        platform.set_window_limits(w, SizeLimits::new(Size::new(250, 100), Size::new(800, 800)));
        let mut c = StickyWindowController::attach(&ctx, &platform, w);

        platform.set_cursor(Point::new(100, 200));
        c.handle_message(
            &platform,
            &WindowMessage::NcButtonDown {
                hit: HitTest::Left,
                screen_pos: Point::new(100, 200),
            },
        );
        // Dragging the left edge to x=300 would leave 100px of width; the
        // 250px minimum pushes the edge back while the right edge stays put.
        c.handle_message(&platform, &WindowMessage::PointerMove { pos: Point::new(200, 100) });
        let bounds = platform.bounds(w);
        assert_eq!(bounds.right(), 400);
        assert_eq!(bounds.width, 250);
        assert_eq!(bounds.x, 150);
    }

    #[test]
    fn escape_restores_exact_original_bounds_without_event() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let w = window(1);
        let original = Rect::new(50, 50, 300, 200);
        platform.add_window(w, original);
        let mut c = StickyWindowController::attach(&ctx, &platform, w);
        let events = std::rc::Rc::new(RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&events);
        c.on_drag_end(move |e| sink.borrow_mut().push(e));

        grab_caption(&mut c, &platform, Point::new(60, 60));
        drag_to(&mut c, &platform, Point::new(700, 500));
        assert_ne!(platform.bounds(w), original);

        c.handle_message(&platform, &WindowMessage::KeyDown { key: Key::Escape });
        assert_eq!(platform.bounds(w), original);
        assert!(!c.is_dragging());
        assert!(events.borrow().is_empty());
        assert_eq!(platform.captured(), None);
    }

    #[test]
    fn move_ended_carries_final_bounds() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let w = window(1);
        platform.add_window(w, Rect::new(50, 50, 300, 200));
        let mut c = StickyWindowController::attach(&ctx, &platform, w);
        let events = std::rc::Rc::new(RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&events);
        c.on_drag_end(move |e| sink.borrow_mut().push(e));

        grab_caption(&mut c, &platform, Point::new(60, 60));
        drag_to(&mut c, &platform, Point::new(500, 400));
        c.handle_message(&platform, &WindowMessage::ButtonUp);

        let final_bounds = platform.bounds(w);
        assert_eq!(events.borrow().as_slice(), &[DragEvent::MoveEnded(final_bounds)]);
        assert_eq!(platform.captured(), None);
    }

    #[test]
    fn off_screen_pointer_is_clamped_to_nearest_work_area() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let w = window(1);
        platform.add_window(w, Rect::new(100, 100, 300, 200));
        let mut c = StickyWindowController::attach(&ctx, &platform, w);

        grab_caption(&mut c, &platform, Point::new(110, 110));
        // Far outside every monitor; the reference point clamps into the
        // work area before the grab offset is subtracted.
        drag_to(&mut c, &platform, Point::new(5000, 3000));
        let bounds = platform.bounds(w);
        assert_eq!(bounds.origin(), Point::new(1919 - 10, 1039 - 10));
    }

    #[test]
    fn snaps_to_work_area_of_monitor_under_pointer() {
        let platform = FakePlatform::new();
        platform.add_monitor(Rect::new(1920, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1040));
        let ctx = StickyContext::new();
        let w = window(1);
        platform.add_window(w, Rect::new(100, 100, 300, 200));
        let mut c = StickyWindowController::attach(&ctx, &platform, w);

        grab_caption(&mut c, &platform, Point::new(110, 110));
        // Pointer over the second monitor, 4px past its left work-area edge.
        drag_to(&mut c, &platform, Point::new(1926, 500));
        assert_eq!(platform.bounds(w).origin(), Point::new(1920, 490));
    }

    #[test]
    fn disposed_controller_stops_anchoring() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let a = window(1);
        let b = window(2);
        platform.add_window(a, Rect::new(0, 0, 200, 200));
        platform.add_window(b, Rect::new(400, 100, 100, 100));
        let anchor = StickyWindowController::attach(&ctx, &platform, a);
        let mut mover = StickyWindowController::attach(&ctx, &platform, b);

        drop(anchor);
        assert_eq!(ctx.tracked_count(), 1);

        grab_caption(&mut mover, &platform, Point::new(450, 150));
        // Would snap to x=200 if the anchor were still tracked.
        drag_to(&mut mover, &platform, Point::new(260, 150));
        assert_eq!(platform.bounds(b).x, 210);
    }

    #[test]
    fn gap_change_applies_to_subsequent_motion_in_same_drag() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let a = window(1);
        let b = window(2);
        platform.add_window(a, Rect::new(0, 0, 200, 200));
        platform.add_window(b, Rect::new(400, 100, 100, 100));
        let _anchor = StickyWindowController::attach(&ctx, &platform, a);
        let mut mover = StickyWindowController::attach(&ctx, &platform, b);

        grab_caption(&mut mover, &platform, Point::new(450, 150));
        drag_to(&mut mover, &platform, Point::new(260, 150));
        assert_eq!(platform.bounds(b).x, 200);

        // Tightening the gap mid-drag affects the next motion only; the
        // already-committed snap stays.
        ctx.set_stick_gap(2);
        drag_to(&mut mover, &platform, Point::new(260, 150));
        assert_eq!(platform.bounds(b).x, 210);
    }

    #[test]
    fn failed_capture_leaves_controller_idle() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let w = window(1);
        platform.add_window(w, Rect::new(100, 100, 300, 200));
        let mut c = StickyWindowController::attach(&ctx, &platform, w);

        platform.fail_capture(true);
        let status = grab_caption(&mut c, &platform, Point::new(110, 110));
        assert_eq!(status, FilterStatus::Pass);
        assert!(!c.is_dragging());
    }

    #[test]
    fn capture_loss_abandons_at_last_committed_bounds() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let w = window(1);
        platform.add_window(w, Rect::new(100, 100, 300, 200));
        let mut c = StickyWindowController::attach(&ctx, &platform, w);
        let events = std::rc::Rc::new(RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&events);
        c.on_drag_end(move |e| sink.borrow_mut().push(e));

        grab_caption(&mut c, &platform, Point::new(110, 110));
        drag_to(&mut c, &platform, Point::new(600, 400));
        let committed = platform.bounds(w);

        c.handle_message(&platform, &WindowMessage::CaptureLost);
        assert!(!c.is_dragging());
        assert_eq!(platform.bounds(w), committed);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn disabled_move_flag_passes_caption_hits_through() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let w = window(1);
        platform.add_window(w, Rect::new(100, 100, 300, 200));
        let mut c = StickyWindowController::attach(&ctx, &platform, w);
        c.stick_on_move = false;

        let status = grab_caption(&mut c, &platform, Point::new(110, 110));
        assert_eq!(status, FilterStatus::Pass);
        assert_eq!(platform.captured(), None);
    }

    #[test]
    #[should_panic(expected = "live window handle")]
    fn attaching_to_null_window_panics() {
        let platform = FakePlatform::new();
        let ctx = StickyContext::new();
        let _ = StickyWindowController::attach(&ctx, &platform, WindowId::from_raw(0));
    }
}
