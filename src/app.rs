//! Application Host Shell (Windows)
//!
//! Creates one frameless layered window per configured instance, wires the
//! window procedure into the sticky controllers and the desktop pinner, and
//! runs the message pump. Global hooks feed the show-desktop watcher (low
//! level keyboard filter) and the pinner's foreground tracking (win-event
//! hook).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Accessibility::{HWINEVENTHOOK, SetWinEventHook, UnhookWinEvent};
use windows::Win32::UI::Input::KeyboardAndMouse::{VK_ESCAPE, VK_LWIN, VK_RWIN};
use windows::Win32::UI::WindowsAndMessaging::{
    CS_HREDRAW, CS_VREDRAW, CallNextHookEx, CreateWindowExW, DefWindowProcW, DispatchMessageW,
    EVENT_SYSTEM_FOREGROUND, GetClassNameW, GetMessageW, HTBOTTOM, HTBOTTOMLEFT, HTBOTTOMRIGHT,
    HTCAPTION, HTLEFT, HTRIGHT, HTTOP, HTTOPLEFT, HTTOPRIGHT, IDC_ARROW, KBDLLHOOKSTRUCT,
    LWA_ALPHA, LoadCursorW, MSG, PostQuitMessage, RegisterClassW, SWP_NOZORDER,
    SetLayeredWindowAttributes, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx,
    WH_KEYBOARD_LL, WINDOWPOS, WINEVENT_OUTOFCONTEXT, WM_CAPTURECHANGED, WM_DESTROY, WM_KEYDOWN,
    WM_LBUTTONUP, WM_MOUSEMOVE, WM_NCACTIVATE, WM_NCHITTEST, WM_NCLBUTTONDOWN, WM_PARENTNOTIFY,
    WM_RBUTTONDOWN, WM_SYSKEYDOWN, WM_WINDOWPOSCHANGING, WNDCLASSW, WS_EX_LAYERED,
    WS_EX_TOOLWINDOW, WS_POPUP, WS_VISIBLE,
};
use windows::core::PCWSTR;

use crate::config::{Config, InstanceConfig};
use crate::pin::{DesktopPinner, ShowDesktopWatcher};
use crate::platform::win32::{self, Win32Platform};
use crate::platform::{
    FilterStatus, Key, PendingPlacement, PlacementFlags, Platform, WindowId, WindowMessage,
};
use crate::shared::{Point, Rect};
use crate::stick::{DragEvent, StickyContext, StickyWindowController};

/// Width of the invisible resize border around each instance window.
const RESIZE_BORDER: i32 = 6;

thread_local! {
    static APP: RefCell<Option<AppState>> = const { RefCell::new(None) };
}

struct AppState {
    platform: Win32Platform,
    pinner: DesktopPinner,
    watcher: ShowDesktopWatcher,
    ctx: Rc<StickyContext>,
    controllers: HashMap<i64, StickyWindowController>,
    names: HashMap<i64, String>,
    config: Rc<RefCell<Config>>,
}

impl AppState {
    fn new(config: Rc<RefCell<Config>>) -> Self {
        let ctx = StickyContext::new();
        let cooldown;
        {
            let cfg = config.borrow();
            ctx.set_stick_gap(cfg.snap.stick_gap);
            cooldown = Duration::from_millis(cfg.pin.show_desktop_cooldown_ms);
        }
        Self {
            platform: Win32Platform::new(),
            pinner: DesktopPinner::new(),
            watcher: ShowDesktopWatcher::with_cooldown(cooldown),
            ctx,
            controllers: HashMap::new(),
            names: HashMap::new(),
            config,
        }
    }

    /// Take ownership of a freshly created instance window: pin it to the
    /// desktop and attach a sticky controller.
    fn adopt(&mut self, hwnd: HWND, instance: &InstanceConfig) {
        let window = win32::window_id(hwnd);
        self.pinner.attach(&self.platform, window);

        let mut controller = StickyWindowController::attach(&self.ctx, &self.platform, window);
        {
            let snap = &self.config.borrow().snap;
            controller.stick_on_move = snap.stick_on_move;
            controller.stick_on_resize = snap.stick_on_resize;
            controller.stick_to_screen = snap.stick_to_screen;
            controller.stick_to_other = snap.stick_to_other;
        }

        // Persist geometry whenever a drag completes.
        let config = Rc::clone(&self.config);
        let name = instance.name.clone();
        controller.on_drag_end(move |event| {
            let (DragEvent::MoveEnded(bounds) | DragEvent::ResizeEnded(bounds)) = event;
            let mut cfg = config.borrow_mut();
            if cfg.update_instance_bounds(&name, bounds) {
                if let Err(e) = cfg.save() {
                    warn!("failed to persist geometry for '{}': {e:#}", name);
                }
            }
        });

        self.controllers.insert(window.raw(), controller);
        self.names.insert(window.raw(), instance.name.clone());
        info!("instance '{}' pinned as {:?}", instance.name, window);
    }

    fn forget(&mut self, window: WindowId) {
        self.pinner.detach(window);
        self.controllers.remove(&window.raw());
        if let Some(name) = self.names.remove(&window.raw()) {
            debug!("instance '{}' closed", name);
        }
    }

    fn route_sticky(&mut self, window: WindowId, msg: &WindowMessage) -> Option<LRESULT> {
        let controller = self.controllers.get_mut(&window.raw())?;
        match controller.handle_message(&self.platform, msg) {
            FilterStatus::Remove => Some(LRESULT(0)),
            FilterStatus::Pass => None,
        }
    }

    /// Borderless windows report no chrome, so classify hits ourselves: a
    /// thin band along each edge resizes, everything else drags as caption.
    fn hit_test(&self, window: WindowId, pt: Point) -> u32 {
        let Ok(bounds) = self.platform.window_bounds(window) else {
            return HTCAPTION;
        };
        let left = pt.x < bounds.left() + RESIZE_BORDER;
        let right = pt.x >= bounds.right() - RESIZE_BORDER;
        let top = pt.y < bounds.top() + RESIZE_BORDER;
        let bottom = pt.y >= bounds.bottom() - RESIZE_BORDER;
        match (left, right, top, bottom) {
            (true, _, true, _) => HTTOPLEFT,
            (_, true, true, _) => HTTOPRIGHT,
            (true, _, _, true) => HTBOTTOMLEFT,
            (_, true, _, true) => HTBOTTOMRIGHT,
            (true, ..) => HTLEFT,
            (_, true, ..) => HTRIGHT,
            (_, _, true, _) => HTTOP,
            (_, _, _, true) => HTBOTTOM,
            _ => HTCAPTION,
        }
    }

    fn dispatch(&mut self, hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> Option<LRESULT> {
        let window = win32::window_id(hwnd);
        match msg {
            WM_NCHITTEST => {
                let code = self.hit_test(window, signed_point(lparam));
                Some(LRESULT(code as isize))
            }
            WM_NCLBUTTONDOWN => {
                let hit = win32::hit_test_from_code(wparam.0 as u32);
                let screen_pos = signed_point(lparam);
                self.route_sticky(window, &WindowMessage::NcButtonDown { hit, screen_pos })
            }
            WM_MOUSEMOVE => {
                let pos = signed_point(lparam);
                self.route_sticky(window, &WindowMessage::PointerMove { pos })
            }
            WM_LBUTTONUP => self.route_sticky(window, &WindowMessage::ButtonUp),
            WM_KEYDOWN if wparam.0 == VK_ESCAPE.0 as usize => {
                self.route_sticky(window, &WindowMessage::KeyDown { key: Key::Escape })
            }
            WM_CAPTURECHANGED => self.route_sticky(window, &WindowMessage::CaptureLost),
            WM_PARENTNOTIFY if (wparam.0 & 0xffff) as u32 == WM_RBUTTONDOWN => {
                match self.pinner.on_context_menu_opening(&self.platform, window) {
                    FilterStatus::Remove => Some(LRESULT(0)),
                    FilterStatus::Pass => None,
                }
            }
            WM_NCACTIVATE => match self.pinner.on_activation_settled(&self.platform, window) {
                FilterStatus::Remove => Some(LRESULT(1)),
                FilterStatus::Pass => None,
            },
            WM_WINDOWPOSCHANGING => {
                let wp = unsafe { &mut *(lparam.0 as *mut WINDOWPOS) };
                let mut placement = PendingPlacement {
                    bounds: Rect::new(wp.x, wp.y, wp.cx, wp.cy),
                    flags: PlacementFlags::empty(),
                };
                let dragging = self
                    .controllers
                    .get(&window.raw())
                    .is_some_and(|c| c.is_dragging());
                let status = self.pinner.on_position_changing(
                    &self.platform,
                    window,
                    &mut placement,
                    dragging,
                );
                if placement.flags.contains(PlacementFlags::NO_ZORDER) {
                    wp.flags |= SWP_NOZORDER;
                }
                match status {
                    FilterStatus::Remove => Some(LRESULT(0)),
                    FilterStatus::Pass => None,
                }
            }
            WM_DESTROY => {
                self.forget(window);
                if self.controllers.is_empty() {
                    unsafe { PostQuitMessage(0) };
                }
                Some(LRESULT(0))
            }
            _ => None,
        }
    }
}

/// `WM_NCHITTEST`/mouse lparam carries packed signed 16-bit coordinates.
fn signed_point(lparam: LPARAM) -> Point {
    let x = (lparam.0 & 0xffff) as u16 as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xffff) as u16 as i16 as i32;
    Point::new(x, y)
}

fn key_from_vk(vk: u32) -> Key {
    match vk as u16 {
        0x44 => Key::D,
        v if v == VK_LWIN.0 => Key::MetaLeft,
        v if v == VK_RWIN.0 => Key::MetaRight,
        v if v == VK_ESCAPE.0 => Key::Escape,
        _ => Key::Other(vk),
    }
}

unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    // Z-order calls from inside a handler re-enter the wndproc synchronously;
    // nested messages take the default path.
    let handled = APP.with(|cell| {
        let mut guard = cell.try_borrow_mut().ok()?;
        let app = guard.as_mut()?;
        app.dispatch(hwnd, msg, wparam, lparam)
    });
    match handled {
        Some(result) => result,
        None => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

unsafe extern "system" fn keyboard_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let message = wparam.0 as u32;
        if message == WM_KEYDOWN || message == WM_SYSKEYDOWN {
            let kb = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
            let key = key_from_vk(kb.vkCode);
            APP.with(|cell| {
                if let Ok(mut guard) = cell.try_borrow_mut() {
                    if let Some(app) = guard.as_mut() {
                        if app.watcher.observe(&app.platform, key, true) {
                            app.pinner.on_show_desktop_requested(&app.platform);
                        }
                    }
                }
            });
        }
    }
    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

unsafe extern "system" fn foreground_changed(
    _hook: HWINEVENTHOOK,
    _event: u32,
    hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _id_event_thread: u32,
    _time: u32,
) {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    if len <= 0 {
        return;
    }
    let class = String::from_utf16_lossy(&buf[..len as usize]);
    APP.with(|cell| {
        if let Ok(mut guard) = cell.try_borrow_mut() {
            if let Some(app) = guard.as_mut() {
                app.pinner
                    .on_foreground_changed(&app.platform, win32::window_id(hwnd), &class);
            }
        }
    });
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn create_instance_window(class_name: PCWSTR, instance: &InstanceConfig) -> Result<HWND> {
    let title = wide(&instance.name);
    let bounds = instance.bounds();
    let hwnd = unsafe {
        CreateWindowExW(
            WS_EX_TOOLWINDOW | WS_EX_LAYERED,
            class_name,
            PCWSTR(title.as_ptr()),
            WS_POPUP | WS_VISIBLE,
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height,
            None,
            None,
            None,
            None,
        )
        .with_context(|| format!("failed to create window for instance '{}'", instance.name))?
    };

    let alpha = (instance.opacity.clamp(10, 100) as u32 * 255 / 100) as u8;
    unsafe {
        if let Err(e) = SetLayeredWindowAttributes(hwnd, COLORREF(0), alpha, LWA_ALPHA) {
            warn!("opacity not applied to '{}': {e}", instance.name);
        }
    }
    Ok(hwnd)
}

/// Create all configured instance windows and run the message loop until the
/// last one closes.
pub fn run(config: Config) -> Result<()> {
    ensure!(
        !config.instances.is_empty(),
        "no instances configured; add an [[instance]] block to the config file"
    );

    let class_w = wide("DeskstickInstance");
    let class_name = PCWSTR(class_w.as_ptr());
    unsafe {
        let hinst = GetModuleHandleW(None).context("GetModuleHandleW failed")?;
        let wc = WNDCLASSW {
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(wndproc),
            hInstance: hinst.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            lpszClassName: class_name,
            ..Default::default()
        };
        ensure!(RegisterClassW(&wc) != 0, "window class registration failed");
    }

    let instances = config.instances.clone();
    let shared_config = Rc::new(RefCell::new(config));
    APP.with(|cell| {
        *cell.borrow_mut() = Some(AppState::new(Rc::clone(&shared_config)));
    });

    for instance in &instances {
        let hwnd = create_instance_window(class_name, instance)?;
        APP.with(|cell| {
            if let Some(app) = cell.borrow_mut().as_mut() {
                app.adopt(hwnd, instance);
            }
        });
    }

    // Global hooks: show-desktop gesture and shell-foreground tracking.
    let kb_hook = unsafe {
        SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook), None, 0)
            .context("keyboard hook installation failed")?
    };
    let fg_hook = unsafe {
        SetWinEventHook(
            EVENT_SYSTEM_FOREGROUND,
            EVENT_SYSTEM_FOREGROUND,
            None,
            Some(foreground_changed),
            0,
            0,
            WINEVENT_OUTOFCONTEXT,
        )
    };
    if fg_hook.is_invalid() {
        warn!("foreground win-event hook unavailable; show-desktop restore disabled");
    }

    info!("deskstick running with {} instance(s)", instances.len());
    let mut msg = MSG::default();
    unsafe {
        loop {
            let result = GetMessageW(&mut msg, None, 0, 0);
            if result.0 == 0 || result.0 == -1 {
                break;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    unsafe {
        let _ = UnhookWindowsHookEx(kb_hook);
        if !fg_hook.is_invalid() {
            let _ = UnhookWinEvent(fg_hook);
        }
    }
    APP.with(|cell| cell.borrow_mut().take());
    info!("deskstick shut down");
    Ok(())
}
