/*
 * Win32 window service.
 *
 * Every control window shares one window procedure. Notifications Windows sends
 * synchronously (position changes, focus, capture, destruction) are queued as
 * sent messages and handed to the core after the call that caused them.
 * Queued input and paint for our windows are returned from
 * `take_posted_message` instead of being dispatched, so the core's own
 * dispatcher sees them; everything else goes through `DispatchMessageW`.
 *
 * Paint surfaces are display lists replayed onto the paint DC in `end_paint`.
 */
use super::{
    AsyncMethodChannel, CreateParams, ExWindowStyle, NativeHandle, PlatformWindowService,
    WindowStyle, ZOrderPosition,
};
use crate::error::{PlatformError, PlatformResult};
use crate::graphics::{DisplayList, DrawCommand, Graphics};
use crate::message::{Message, MessageKind, WM_APP_INVOKE_MARSHALED};
use crate::types::{Color, Cursor, Keys, Rect, Region, Size};

use windows::{
    Win32::{
        Foundation::{COLORREF, GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM},
        Graphics::Gdi::{
            BeginPaint, CombineRgn, CreateRectRgn, CreateSolidBrush, DeleteObject, EndPaint,
            FillRect, FrameRect, HDC, InvalidateRect, MapWindowPoints, PAINTSTRUCT, RGN_OR,
            SetBkMode, SetTextColor, SetWindowRgn, TRANSPARENT, TextOutW, UpdateWindow,
        },
        System::LibraryLoader::GetModuleHandleW,
        UI::Input::KeyboardAndMouse::{
            EnableWindow, GetKeyState, ReleaseCapture, SetCapture, SetFocus, VK_CONTROL, VK_MENU,
            VK_SHIFT,
        },
        UI::Shell::DragAcceptFiles,
        UI::WindowsAndMessaging::*,
    },
    core::{HSTRING, PCWSTR},
};

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard};

const HTCLIENT: u16 = 1;

#[derive(Default)]
struct Win32State {
    sent: Vec<Message>,
    windows: HashSet<u64>,
    cursors: HashMap<u64, Cursor>,
    registered_classes: HashSet<String>,
}

/// State reachable from the window procedure through `GWLP_USERDATA`.
#[derive(Default)]
struct Win32Shared {
    state: Mutex<Win32State>,
}

impl Win32Shared {
    fn state(&self) -> MutexGuard<'_, Win32State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct PaintSession {
    hdc: isize,
    rc_paint: RECT,
}

pub struct Win32Platform {
    shared: Arc<Win32Shared>,
    h_instance: isize,
    painting: HashMap<u64, PaintSession>,
}

struct Win32Channel;

impl AsyncMethodChannel for Win32Channel {
    fn post(&self, target: NativeHandle) -> PlatformResult<()> {
        unsafe {
            PostMessageW(
                Some(to_hwnd(target)),
                WM_APP_INVOKE_MARSHALED,
                WPARAM(0),
                LPARAM(0),
            )?;
        }
        Ok(())
    }
}

fn to_hwnd(handle: NativeHandle) -> HWND {
    HWND(handle.0 as usize as *mut c_void)
}

fn from_hwnd(hwnd: HWND) -> NativeHandle {
    NativeHandle(hwnd.0 as usize as u64)
}

fn to_rect(rect: Rect) -> RECT {
    RECT {
        left: rect.x,
        top: rect.y,
        right: rect.right(),
        bottom: rect.bottom(),
    }
}

fn from_rect(rect: &RECT) -> Rect {
    Rect::new(
        rect.left,
        rect.top,
        rect.right - rect.left,
        rect.bottom - rect.top,
    )
}

fn color_to_colorref(color: Color) -> COLORREF {
    COLORREF((color.r as u32) | ((color.g as u32) << 8) | ((color.b as u32) << 16))
}

impl Win32Platform {
    pub fn new() -> PlatformResult<Self> {
        let module = unsafe { GetModuleHandleW(None) }.map_err(|err| {
            PlatformError::InitializationFailed(format!("GetModuleHandleW failed: {err}"))
        })?;
        log::debug!("Platform: Win32 window service ready");
        Ok(Self {
            shared: Arc::new(Win32Shared::default()),
            h_instance: module.0 as isize,
            painting: HashMap::new(),
        })
    }

    fn h_instance(&self) -> HINSTANCE {
        HINSTANCE(self.h_instance as *mut c_void)
    }

    /*
     * Registers `class_name` with the shared window procedure, once per
     * process.
     */
    fn register_window_class(&self, class_name: &str) -> PlatformResult<()> {
        if self.shared.state().registered_classes.contains(class_name) {
            return Ok(());
        }
        let class_name_hstring = HSTRING::from(class_name);
        let class_name_pcwstr = PCWSTR(class_name_hstring.as_ptr());

        unsafe {
            let mut existing = WNDCLASSEXW::default();
            if GetClassInfoExW(Some(self.h_instance()), class_name_pcwstr, &mut existing).is_ok() {
                log::debug!("Platform: window class '{class_name}' already registered");
                self.shared
                    .state()
                    .registered_classes
                    .insert(class_name.to_string());
                return Ok(());
            }

            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_DBLCLKS,
                lpfnWndProc: Some(control_wnd_proc),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: self.h_instance(),
                hCursor: LoadCursorW(None, IDC_ARROW)?,
                lpszClassName: class_name_pcwstr,
                ..Default::default()
            };
            if RegisterClassExW(&wc) == 0 {
                let error = GetLastError();
                log::error!("Platform: RegisterClassExW for '{class_name}' failed: {error:?}");
                return Err(PlatformError::InitializationFailed(format!(
                    "RegisterClassExW failed: {error:?}"
                )));
            }
        }
        log::debug!("Platform: window class '{class_name}' registered");
        self.shared
            .state()
            .registered_classes
            .insert(class_name.to_string());
        Ok(())
    }

    fn owns(&self, hwnd: HWND) -> bool {
        self.shared.state().windows.contains(&from_hwnd(hwnd).0)
    }
}

/// Window rectangle relative to the parent's client area (screen for top-level windows).
fn window_rect_in_parent(hwnd: HWND) -> PlatformResult<Rect> {
    let mut rect = RECT::default();
    unsafe {
        GetWindowRect(hwnd, &mut rect)?;
        if let Ok(parent) = GetParent(hwnd) {
            let mut corners = [
                POINT {
                    x: rect.left,
                    y: rect.top,
                },
                POINT {
                    x: rect.right,
                    y: rect.bottom,
                },
            ];
            MapWindowPoints(None, Some(parent), &mut corners);
            rect = RECT {
                left: corners[0].x,
                top: corners[0].y,
                right: corners[1].x,
                bottom: corners[1].y,
            };
        }
    }
    Ok(from_rect(&rect))
}

fn native_cursor(cursor: Cursor) -> PCWSTR {
    match cursor {
        Cursor::Default | Cursor::Arrow => IDC_ARROW,
        Cursor::IBeam => IDC_IBEAM,
        Cursor::Hand => IDC_HAND,
        Cursor::Wait => IDC_WAIT,
        Cursor::Cross => IDC_CROSS,
        Cursor::SizeWE => IDC_SIZEWE,
        Cursor::SizeNS => IDC_SIZENS,
        Cursor::No => IDC_NO,
    }
}

/*
 * Window procedure of every control window. `lpCreateParams` carries a
 * borrowed `Win32Shared` pointer; the window takes its own strong count on
 * `WM_NCCREATE`, keeps it in `GWLP_USERDATA` and gives it back on
 * `WM_NCDESTROY`.
 */
unsafe extern "system" fn control_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let shared_ptr = if msg == WM_NCCREATE {
        let create_struct = unsafe { &*(lparam.0 as *const CREATESTRUCTW) };
        let raw = create_struct.lpCreateParams as *const Win32Shared;
        if !raw.is_null() {
            unsafe { Arc::increment_strong_count(raw) };
            unsafe { SetWindowLongPtrW(hwnd, GWLP_USERDATA, raw as isize) };
        }
        raw
    } else {
        unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const Win32Shared }
    };
    if shared_ptr.is_null() {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    }
    let shared = unsafe { &*shared_ptr };
    let handle = from_hwnd(hwnd);

    match msg {
        // Children receive it before their parent, which is the order the core expects.
        WM_NCDESTROY => {
            {
                let mut state = shared.state();
                state.windows.remove(&handle.0);
                state.cursors.remove(&handle.0);
                state
                    .sent
                    .push(Message::simple(handle, MessageKind::Destroy));
            }
            unsafe { SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0) };
            drop(unsafe { Arc::from_raw(shared_ptr) });
            return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
        }
        WM_WINDOWPOSCHANGED => {
            if let Ok(rect) = window_rect_in_parent(hwnd) {
                shared
                    .state()
                    .sent
                    .push(Message::window_pos_changed(handle, rect));
            }
        }
        WM_PAINT => {
            shared
                .state()
                .sent
                .push(Message::simple(handle, MessageKind::Paint));
            return LRESULT(0);
        }
        WM_ERASEBKGND => return LRESULT(1),
        WM_SETCURSOR => {
            let cursor = shared.state().cursors.get(&handle.0).copied();
            if (lparam.0 & 0xFFFF) as u16 == HTCLIENT
                && let Some(cursor) = cursor
                && let Ok(native) = unsafe { LoadCursorW(None, native_cursor(cursor)) }
            {
                unsafe { SetCursor(Some(native)) };
                return LRESULT(1);
            }
        }
        WM_SETFOCUS | WM_KILLFOCUS | WM_CAPTURECHANGED | WM_SHOWWINDOW => {
            shared.state().sent.push(Message::new(
                handle,
                MessageKind::from_native(msg),
                wparam.0,
                lparam.0,
            ));
        }
        _ => {}
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

impl PlatformWindowService for Win32Platform {
    fn create_window(&mut self, params: &CreateParams) -> PlatformResult<NativeHandle> {
        self.register_window_class(&params.class_name)?;
        let context_ptr = Arc::as_ptr(&self.shared);
        let bounds = params.bounds;

        let created = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(params.ex_style.bits()),
                &HSTRING::from(params.class_name.as_str()),
                &HSTRING::from(params.caption.as_str()),
                WINDOW_STYLE(params.style.bits()),
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
                params.parent.map(to_hwnd),
                None,
                Some(self.h_instance()),
                Some(context_ptr as *mut c_void),
            )
        };
        let hwnd = match created {
            Ok(hwnd) => hwnd,
            Err(err) => {
                log::error!(
                    "Platform: CreateWindowExW for class '{}' failed: {err}",
                    params.class_name
                );
                return Err(err.into());
            }
        };
        let handle = from_hwnd(hwnd);
        self.shared.state().windows.insert(handle.0);
        log::trace!("Platform: created {handle:?} ({})", params.class_name);
        Ok(handle)
    }

    fn destroy_window(&mut self, handle: NativeHandle) -> PlatformResult<()> {
        unsafe { DestroyWindow(to_hwnd(handle))? };
        Ok(())
    }

    fn set_window_pos(&mut self, handle: NativeHandle, bounds: Rect) -> PlatformResult<()> {
        unsafe {
            SetWindowPos(
                to_hwnd(handle),
                None,
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
                SWP_NOZORDER | SWP_NOACTIVATE,
            )?;
        }
        Ok(())
    }

    fn show_window(&mut self, handle: NativeHandle, visible: bool) -> PlatformResult<()> {
        let cmd = if visible { SW_SHOWNA } else { SW_HIDE };
        unsafe { _ = ShowWindow(to_hwnd(handle), cmd) };
        Ok(())
    }

    fn enable_window(&mut self, handle: NativeHandle, enabled: bool) -> PlatformResult<()> {
        unsafe { _ = EnableWindow(to_hwnd(handle), enabled) };
        Ok(())
    }

    fn set_parent(
        &mut self,
        handle: NativeHandle,
        parent: Option<NativeHandle>,
    ) -> PlatformResult<()> {
        unsafe { SetParent(to_hwnd(handle), parent.map(to_hwnd))? };
        Ok(())
    }

    fn set_z_order(
        &mut self,
        handle: NativeHandle,
        position: ZOrderPosition,
    ) -> PlatformResult<()> {
        let insert_after = match position {
            ZOrderPosition::Top => HWND_TOP,
            ZOrderPosition::Bottom => HWND_BOTTOM,
            ZOrderPosition::After(previous) => to_hwnd(previous),
        };
        unsafe {
            SetWindowPos(
                to_hwnd(handle),
                Some(insert_after),
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )?;
        }
        Ok(())
    }

    fn set_capture(&mut self, handle: NativeHandle) -> PlatformResult<()> {
        unsafe { _ = SetCapture(to_hwnd(handle)) };
        Ok(())
    }

    fn release_capture(&mut self) -> PlatformResult<()> {
        unsafe { ReleaseCapture()? };
        Ok(())
    }

    fn set_cursor(&mut self, handle: NativeHandle, cursor: Cursor) -> PlatformResult<()> {
        let mut state = self.shared.state();
        if cursor == Cursor::Default {
            state.cursors.remove(&handle.0);
        } else {
            state.cursors.insert(handle.0, cursor);
        }
        Ok(())
    }

    fn set_focus(&mut self, handle: NativeHandle) -> PlatformResult<()> {
        unsafe { SetFocus(Some(to_hwnd(handle)))? };
        Ok(())
    }

    fn get_window_rect(&self, handle: NativeHandle) -> PlatformResult<Rect> {
        window_rect_in_parent(to_hwnd(handle))
    }

    fn adjust_window_rect(
        &self,
        client: Size,
        style: WindowStyle,
        ex_style: ExWindowStyle,
    ) -> PlatformResult<Size> {
        let mut rect = to_rect(Rect::from_size(client));
        unsafe {
            AdjustWindowRectEx(
                &mut rect,
                WINDOW_STYLE(style.bits()),
                false,
                WINDOW_EX_STYLE(ex_style.bits()),
            )?;
        }
        let adjusted = from_rect(&rect);
        Ok(Size::new(adjusted.width, adjusted.height))
    }

    fn invalidate(&mut self, handle: NativeHandle, rect: Rect) -> PlatformResult<()> {
        let native = to_rect(rect);
        if !unsafe { InvalidateRect(Some(to_hwnd(handle)), Some(&native), false) }.as_bool() {
            return Err(PlatformError::OperationFailed(format!(
                "InvalidateRect on {handle:?} failed"
            )));
        }
        Ok(())
    }

    fn update(&mut self, handle: NativeHandle) -> PlatformResult<()> {
        unsafe { _ = UpdateWindow(to_hwnd(handle)) };
        Ok(())
    }

    fn begin_paint(&mut self, handle: NativeHandle) -> PlatformResult<(Box<dyn Graphics>, Rect)> {
        let hwnd = to_hwnd(handle);
        let mut ps = PAINTSTRUCT::default();
        let hdc = unsafe { BeginPaint(hwnd, &mut ps) };
        if hdc.is_invalid() {
            return Err(PlatformError::OperationFailed(format!(
                "BeginPaint on {handle:?} failed"
            )));
        }
        let mut client = RECT::default();
        unsafe { GetClientRect(hwnd, &mut client)? };
        let clip = from_rect(&ps.rcPaint);
        let client = from_rect(&client);

        let mut surface = DisplayList::new(Size::new(client.width, client.height));
        surface.set_clip(clip);
        self.painting.insert(
            handle.0,
            PaintSession {
                hdc: hdc.0 as isize,
                rc_paint: ps.rcPaint,
            },
        );
        Ok((Box::new(surface), clip))
    }

    fn end_paint(
        &mut self,
        handle: NativeHandle,
        graphics: Box<dyn Graphics>,
    ) -> PlatformResult<()> {
        let Some(session) = self.painting.remove(&handle.0) else {
            return Err(PlatformError::InvalidHandle(format!(
                "{handle:?} is not painting"
            )));
        };
        let hdc = HDC(session.hdc as *mut c_void);
        if let Some(surface) = graphics.into_display_list() {
            replay(hdc, &surface);
        }
        let ps = PAINTSTRUCT {
            hdc,
            rcPaint: session.rc_paint,
            ..Default::default()
        };
        unsafe { _ = EndPaint(to_hwnd(handle), &ps) };
        Ok(())
    }

    fn set_clip_region(
        &mut self,
        handle: NativeHandle,
        region: Option<&Region>,
    ) -> PlatformResult<()> {
        let hwnd = to_hwnd(handle);
        let Some(region) = region else {
            unsafe { SetWindowRgn(hwnd, None, true) };
            return Ok(());
        };
        let mut rects = region.rects().iter();
        let Some(first) = rects.next() else {
            return Err(PlatformError::OperationFailed(
                "empty clip region".to_string(),
            ));
        };
        unsafe {
            let combined = CreateRectRgn(first.x, first.y, first.right(), first.bottom());
            for rect in rects {
                let part = CreateRectRgn(rect.x, rect.y, rect.right(), rect.bottom());
                CombineRgn(Some(combined), Some(combined), Some(part), RGN_OR);
                let _ = DeleteObject(part.into());
            }
            // The window owns the region from here on.
            SetWindowRgn(hwnd, Some(combined), true);
        }
        Ok(())
    }

    fn set_allow_drop(&mut self, handle: NativeHandle, allow: bool) -> PlatformResult<()> {
        unsafe { DragAcceptFiles(to_hwnd(handle), allow) };
        Ok(())
    }

    fn async_channel(&self) -> Arc<dyn AsyncMethodChannel> {
        Arc::new(Win32Channel)
    }

    fn drain_sent_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.shared.state().sent)
    }

    fn take_posted_message(&mut self) -> Option<Message> {
        loop {
            let mut msg = MSG::default();
            if !unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
                return None;
            }
            if msg.message == WM_QUIT {
                log::debug!("Platform: WM_QUIT received");
                return None;
            }
            unsafe { _ = TranslateMessage(&msg) };
            let kind = MessageKind::from_native(msg.message);
            if self.owns(msg.hwnd) && !matches!(kind, MessageKind::Other(_)) {
                return Some(Message::new(
                    from_hwnd(msg.hwnd),
                    kind,
                    msg.wParam.0,
                    msg.lParam.0,
                ));
            }
            unsafe { DispatchMessageW(&msg) };
        }
    }

    fn modifier_keys(&self) -> Keys {
        let held = |key: i32| unsafe { GetKeyState(key) } < 0;
        let mut modifiers = Keys::NONE;
        if held(VK_SHIFT.0 as i32) {
            modifiers = modifiers.with(Keys::SHIFT);
        }
        if held(VK_CONTROL.0 as i32) {
            modifiers = modifiers.with(Keys::CONTROL);
        }
        if held(VK_MENU.0 as i32) {
            modifiers = modifiers.with(Keys::ALT);
        }
        modifiers
    }

    fn default_proc(&mut self, msg: &mut Message) {
        if msg.kind == MessageKind::Destroy || !self.owns(to_hwnd(msg.handle)) {
            return;
        }
        let result = unsafe {
            DefWindowProcW(
                to_hwnd(msg.handle),
                msg.kind.to_native(),
                WPARAM(msg.wparam),
                LPARAM(msg.lparam),
            )
        };
        msg.result = result.0 as isize;
    }
}

fn replay(hdc: HDC, surface: &DisplayList) {
    unsafe { SetBkMode(hdc, TRANSPARENT) };
    for command in surface.commands() {
        match command {
            DrawCommand::FillRect { rect, color } if color.is_opaque() => {
                let brush = unsafe { CreateSolidBrush(color_to_colorref(*color)) };
                unsafe { FillRect(hdc, &to_rect(*rect), brush) };
                let _ = unsafe { DeleteObject(brush.into()) };
            }
            DrawCommand::DrawRect { rect, color } => {
                let brush = unsafe { CreateSolidBrush(color_to_colorref(*color)) };
                unsafe { FrameRect(hdc, &to_rect(*rect), brush) };
                let _ = unsafe { DeleteObject(brush.into()) };
            }
            DrawCommand::DrawText {
                text, at, color, ..
            } => {
                let wide: Vec<u16> = text.encode_utf16().collect();
                unsafe { SetTextColor(hdc, color_to_colorref(*color)) };
                let _ = unsafe { TextOutW(hdc, at.x, at.y, &wide) };
            }
            DrawCommand::FillRect { .. } => {}
        }
    }
}
