//! Win32 Platform Backend
//!
//! Maps the platform capability surface onto the Win32 windowing API. All
//! calls are thin and stateless; failures surface as `anyhow` errors for the
//! callers to log and swallow.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use windows::Win32::Foundation::{HWND, POINT, RECT};
use windows::Win32::Graphics::Dwm::{DWMWA_EXCLUDED_FROM_PEEK, DwmSetWindowAttribute};
use windows::Win32::Graphics::Gdi::{
    ClientToScreen, GetMonitorInfoW, MONITOR_DEFAULTTONEAREST, MONITOR_DEFAULTTONULL, MONITORINFO,
    MonitorFromPoint,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, ReleaseCapture, SetCapture, VK_LWIN, VK_RWIN,
};
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowExW, GetCursorPos, GetSystemMetrics, GetWindowRect, HTBOTTOM, HTBOTTOMLEFT,
    HTBOTTOMRIGHT, HTCAPTION, HTCLIENT, HTLEFT, HTRIGHT, HTTOP, HTTOPLEFT, HTTOPRIGHT, HWND_BOTTOM,
    HWND_TOP, SM_CXMAXTRACK, SM_CXMINTRACK, SM_CXSCREEN, SM_CYMAXTRACK, SM_CYMINTRACK, SM_CYSCREEN,
    SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER, SetWindowPos,
};

use crate::shared::{Point, Rect, Size, SizeLimits};

use super::{HitTest, Key, Platform, WindowId};

/// Virtual-key code for the show-desktop letter ('D').
const VK_D: u16 = 0x44;

pub fn hwnd(window: WindowId) -> HWND {
    HWND(window.raw() as isize as *mut core::ffi::c_void)
}

pub fn window_id(handle: HWND) -> WindowId {
    WindowId::from_raw(handle.0 as i64)
}

/// Translate a non-client hit-test code from `WM_NCLBUTTONDOWN`.
pub fn hit_test_from_code(code: u32) -> HitTest {
    match code {
        _ if code == HTCAPTION => HitTest::Caption,
        _ if code == HTLEFT => HitTest::Left,
        _ if code == HTRIGHT => HitTest::Right,
        _ if code == HTTOP => HitTest::Top,
        _ if code == HTTOPLEFT => HitTest::TopLeft,
        _ if code == HTTOPRIGHT => HitTest::TopRight,
        _ if code == HTBOTTOM => HitTest::Bottom,
        _ if code == HTBOTTOMLEFT => HitTest::BottomLeft,
        _ if code == HTBOTTOMRIGHT => HitTest::BottomRight,
        _ if code == HTCLIENT as u32 => HitTest::Client,
        other => HitTest::Other(other as i32),
    }
}

fn rect_from(r: RECT) -> Rect {
    Rect::from_edges(r.left, r.top, r.right, r.bottom)
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn monitor_info(pt: Point, flags: windows::Win32::Graphics::Gdi::MONITOR_FROM_FLAGS) -> Option<MONITORINFO> {
    unsafe {
        let monitor = MonitorFromPoint(POINT { x: pt.x, y: pt.y }, flags);
        if monitor.is_invalid() {
            return None;
        }
        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        if GetMonitorInfoW(monitor, &mut info).as_bool() {
            Some(info)
        } else {
            None
        }
    }
}

/// Stateless Win32 implementation of the platform surface.
pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Win32Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for Win32Platform {
    fn window_bounds(&self, window: WindowId) -> Result<Rect> {
        let mut rect = RECT::default();
        unsafe {
            GetWindowRect(hwnd(window), &mut rect).context("GetWindowRect failed")?;
        }
        Ok(rect_from(rect))
    }

    fn set_window_bounds(&self, window: WindowId, bounds: Rect) -> Result<()> {
        unsafe {
            SetWindowPos(
                hwnd(window),
                None,
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
                SWP_NOACTIVATE | SWP_NOZORDER,
            )
            .context("SetWindowPos failed")?;
        }
        Ok(())
    }

    fn window_size_limits(&self, _window: WindowId) -> SizeLimits {
        // Popup instance windows declare no limits of their own; the global
        // trackable range below is what constrains them.
        SizeLimits::unbounded()
    }

    fn track_size_limits(&self) -> SizeLimits {
        unsafe {
            SizeLimits::new(
                Size::new(
                    GetSystemMetrics(SM_CXMINTRACK),
                    GetSystemMetrics(SM_CYMINTRACK),
                ),
                Size::new(
                    GetSystemMetrics(SM_CXMAXTRACK),
                    GetSystemMetrics(SM_CYMAXTRACK),
                ),
            )
        }
    }

    fn monitor_work_area(&self, point: Point) -> Option<Rect> {
        monitor_info(point, MONITOR_DEFAULTTONULL).map(|info| rect_from(info.rcWork))
    }

    fn nearest_work_area(&self, point: Point) -> Rect {
        match monitor_info(point, MONITOR_DEFAULTTONEAREST) {
            Some(info) => rect_from(info.rcWork),
            // No monitor info at all; fall back to the primary display size.
            None => unsafe {
                Rect::new(
                    0,
                    0,
                    GetSystemMetrics(SM_CXSCREEN),
                    GetSystemMetrics(SM_CYSCREEN),
                )
            },
        }
    }

    fn window_to_screen(&self, window: WindowId, point: Point) -> Point {
        let mut pt = POINT {
            x: point.x,
            y: point.y,
        };
        unsafe {
            let _ = ClientToScreen(hwnd(window), &mut pt);
        }
        Point::new(pt.x, pt.y)
    }

    fn cursor_pos(&self) -> Point {
        let mut pt = POINT::default();
        unsafe {
            let _ = GetCursorPos(&mut pt);
        }
        Point::new(pt.x, pt.y)
    }

    fn capture_pointer(&self, window: WindowId) -> Result<()> {
        let handle = hwnd(window);
        if handle.is_invalid() {
            return Err(anyhow!("cannot capture pointer for an invalid window"));
        }
        unsafe {
            SetCapture(handle);
        }
        Ok(())
    }

    fn release_pointer(&self) {
        unsafe {
            let _ = ReleaseCapture();
        }
    }

    fn place_bottom(&self, window: WindowId) -> Result<()> {
        unsafe {
            SetWindowPos(
                hwnd(window),
                HWND_BOTTOM,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )
            .context("SetWindowPos(HWND_BOTTOM) failed")?;
        }
        Ok(())
    }

    fn place_top(&self, window: WindowId) -> Result<()> {
        unsafe {
            SetWindowPos(
                hwnd(window),
                HWND_TOP,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )
            .context("SetWindowPos(HWND_TOP) failed")?;
        }
        Ok(())
    }

    fn exclude_from_peek(&self, window: WindowId) -> Result<()> {
        // Version-gated: fails harmlessly where DWM peek does not exist.
        let exclude: i32 = 1;
        unsafe {
            DwmSetWindowAttribute(
                hwnd(window),
                DWMWA_EXCLUDED_FROM_PEEK,
                &exclude as *const i32 as *const core::ffi::c_void,
                std::mem::size_of::<i32>() as u32,
            )
            .context("DwmSetWindowAttribute(EXCLUDED_FROM_PEEK) failed")?;
        }
        Ok(())
    }

    fn key_held(&self, key: Key) -> bool {
        let vk = match key {
            Key::MetaLeft => VK_LWIN.0,
            Key::MetaRight => VK_RWIN.0,
            Key::D => VK_D,
            Key::Escape => windows::Win32::UI::Input::KeyboardAndMouse::VK_ESCAPE.0,
            Key::Other(code) => code as u16,
        };
        unsafe { (GetAsyncKeyState(vk as i32) as u16 & 0x8000) != 0 }
    }

    fn find_child_by_class(&self, parent: WindowId, class: &str) -> Option<WindowId> {
        let class_w = wide(class);
        unsafe {
            match FindWindowExW(
                hwnd(parent),
                None,
                windows::core::PCWSTR(class_w.as_ptr()),
                None,
            ) {
                Ok(child) if !child.is_invalid() => Some(window_id(child)),
                _ => None,
            }
        }
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
