/*
 * Decoded platform messages.
 *
 * A `Message` is the unit the dispatch state machine consumes: the native handle
 * it targets, a `MessageKind` tag and two opaque parameter words whose packing
 * follows the native windowing convention (coordinates in the low/high words of
 * `lparam`, button state and wheel delta in `wparam`). The `result` slot is what
 * the window procedure hands back to the platform.
 */
use crate::platform::NativeHandle;
use crate::types::{Keys, MouseButtons, Point, Rect};

/*
 * Native message numbers. The Win32 backend passes them straight through; the
 * headless backend uses the same numbering so both produce identical traffic.
 */
pub(crate) const WM_CREATE: u32 = 0x0001;
pub(crate) const WM_DESTROY: u32 = 0x0002;
pub(crate) const WM_SETFOCUS: u32 = 0x0007;
pub(crate) const WM_KILLFOCUS: u32 = 0x0008;
pub(crate) const WM_PAINT: u32 = 0x000F;
pub(crate) const WM_ERASEBKGND: u32 = 0x0014;
pub(crate) const WM_SYSCOLORCHANGE: u32 = 0x0015;
pub(crate) const WM_SHOWWINDOW: u32 = 0x0018;
pub(crate) const WM_SETCURSOR: u32 = 0x0020;
pub(crate) const WM_WINDOWPOSCHANGED: u32 = 0x0047;
pub(crate) const WM_HELP: u32 = 0x0053;
pub(crate) const WM_CONTEXTMENU: u32 = 0x007B;
pub(crate) const WM_KEYDOWN: u32 = 0x0100;
pub(crate) const WM_KEYUP: u32 = 0x0101;
pub(crate) const WM_CHAR: u32 = 0x0102;
pub(crate) const WM_SYSKEYDOWN: u32 = 0x0104;
pub(crate) const WM_SYSKEYUP: u32 = 0x0105;
pub(crate) const WM_SYSCHAR: u32 = 0x0106;
pub(crate) const WM_UPDATEUISTATE: u32 = 0x0128;
pub(crate) const WM_QUERYUISTATE: u32 = 0x0129;
pub(crate) const WM_MOUSEMOVE: u32 = 0x0200;
pub(crate) const WM_LBUTTONDOWN: u32 = 0x0201;
pub(crate) const WM_LBUTTONUP: u32 = 0x0202;
pub(crate) const WM_LBUTTONDBLCLK: u32 = 0x0203;
pub(crate) const WM_RBUTTONDOWN: u32 = 0x0204;
pub(crate) const WM_RBUTTONUP: u32 = 0x0205;
pub(crate) const WM_RBUTTONDBLCLK: u32 = 0x0206;
pub(crate) const WM_MBUTTONDOWN: u32 = 0x0207;
pub(crate) const WM_MBUTTONUP: u32 = 0x0208;
pub(crate) const WM_MBUTTONDBLCLK: u32 = 0x0209;
pub(crate) const WM_MOUSEWHEEL: u32 = 0x020A;
pub(crate) const WM_CAPTURECHANGED: u32 = 0x0215;
pub(crate) const WM_MOUSEHOVER: u32 = 0x02A1;
pub(crate) const WM_MOUSELEAVE: u32 = 0x02A3;
pub(crate) const WM_APP: u32 = 0x8000;
/// Posted to a control's handle to drain its marshaled-call queue.
pub(crate) const WM_APP_INVOKE_MARSHALED: u32 = WM_APP + 0x200;

/* Mouse key-state bits carried in `wparam` of pointer messages. */
pub(crate) const MK_LBUTTON: usize = 0x0001;
pub(crate) const MK_RBUTTON: usize = 0x0002;
pub(crate) const MK_MBUTTON: usize = 0x0010;

/* UI-state actions in the low word of WM_UPDATEUISTATE's `wparam`. */
pub(crate) const UIS_SET: i32 = 1;
pub(crate) const UIS_CLEAR: i32 = 2;

/// Standard unit of one wheel notch.
pub const WHEEL_DELTA: i32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Create,
    Destroy,
    Paint,
    EraseBackground,
    LeftButtonDown,
    LeftButtonUp,
    LeftButtonDoubleClick,
    MiddleButtonDown,
    MiddleButtonUp,
    MiddleButtonDoubleClick,
    RightButtonDown,
    RightButtonUp,
    RightButtonDoubleClick,
    MouseMove,
    MouseLeave,
    MouseHover,
    MouseWheel,
    ContextMenu,
    ShowWindow,
    KeyDown,
    KeyUp,
    Char,
    SysKeyDown,
    SysKeyUp,
    SysChar,
    Help,
    SetFocus,
    KillFocus,
    SysColorChange,
    SetCursor,
    CaptureChanged,
    UpdateUiState,
    QueryUiState,
    WindowPosChanged,
    InvokeMarshaled,
    Other(u32),
}

impl MessageKind {
    pub fn from_native(msg: u32) -> Self {
        match msg {
            WM_CREATE => MessageKind::Create,
            WM_DESTROY => MessageKind::Destroy,
            WM_PAINT => MessageKind::Paint,
            WM_ERASEBKGND => MessageKind::EraseBackground,
            WM_LBUTTONDOWN => MessageKind::LeftButtonDown,
            WM_LBUTTONUP => MessageKind::LeftButtonUp,
            WM_LBUTTONDBLCLK => MessageKind::LeftButtonDoubleClick,
            WM_MBUTTONDOWN => MessageKind::MiddleButtonDown,
            WM_MBUTTONUP => MessageKind::MiddleButtonUp,
            WM_MBUTTONDBLCLK => MessageKind::MiddleButtonDoubleClick,
            WM_RBUTTONDOWN => MessageKind::RightButtonDown,
            WM_RBUTTONUP => MessageKind::RightButtonUp,
            WM_RBUTTONDBLCLK => MessageKind::RightButtonDoubleClick,
            WM_MOUSEMOVE => MessageKind::MouseMove,
            WM_MOUSELEAVE => MessageKind::MouseLeave,
            WM_MOUSEHOVER => MessageKind::MouseHover,
            WM_MOUSEWHEEL => MessageKind::MouseWheel,
            WM_CONTEXTMENU => MessageKind::ContextMenu,
            WM_SHOWWINDOW => MessageKind::ShowWindow,
            WM_KEYDOWN => MessageKind::KeyDown,
            WM_KEYUP => MessageKind::KeyUp,
            WM_CHAR => MessageKind::Char,
            WM_SYSKEYDOWN => MessageKind::SysKeyDown,
            WM_SYSKEYUP => MessageKind::SysKeyUp,
            WM_SYSCHAR => MessageKind::SysChar,
            WM_HELP => MessageKind::Help,
            WM_SETFOCUS => MessageKind::SetFocus,
            WM_KILLFOCUS => MessageKind::KillFocus,
            WM_SYSCOLORCHANGE => MessageKind::SysColorChange,
            WM_SETCURSOR => MessageKind::SetCursor,
            WM_CAPTURECHANGED => MessageKind::CaptureChanged,
            WM_UPDATEUISTATE => MessageKind::UpdateUiState,
            WM_QUERYUISTATE => MessageKind::QueryUiState,
            WM_WINDOWPOSCHANGED => MessageKind::WindowPosChanged,
            WM_APP_INVOKE_MARSHALED => MessageKind::InvokeMarshaled,
            other => MessageKind::Other(other),
        }
    }

    pub fn to_native(self) -> u32 {
        match self {
            MessageKind::Create => WM_CREATE,
            MessageKind::Destroy => WM_DESTROY,
            MessageKind::Paint => WM_PAINT,
            MessageKind::EraseBackground => WM_ERASEBKGND,
            MessageKind::LeftButtonDown => WM_LBUTTONDOWN,
            MessageKind::LeftButtonUp => WM_LBUTTONUP,
            MessageKind::LeftButtonDoubleClick => WM_LBUTTONDBLCLK,
            MessageKind::MiddleButtonDown => WM_MBUTTONDOWN,
            MessageKind::MiddleButtonUp => WM_MBUTTONUP,
            MessageKind::MiddleButtonDoubleClick => WM_MBUTTONDBLCLK,
            MessageKind::RightButtonDown => WM_RBUTTONDOWN,
            MessageKind::RightButtonUp => WM_RBUTTONUP,
            MessageKind::RightButtonDoubleClick => WM_RBUTTONDBLCLK,
            MessageKind::MouseMove => WM_MOUSEMOVE,
            MessageKind::MouseLeave => WM_MOUSELEAVE,
            MessageKind::MouseHover => WM_MOUSEHOVER,
            MessageKind::MouseWheel => WM_MOUSEWHEEL,
            MessageKind::ContextMenu => WM_CONTEXTMENU,
            MessageKind::ShowWindow => WM_SHOWWINDOW,
            MessageKind::KeyDown => WM_KEYDOWN,
            MessageKind::KeyUp => WM_KEYUP,
            MessageKind::Char => WM_CHAR,
            MessageKind::SysKeyDown => WM_SYSKEYDOWN,
            MessageKind::SysKeyUp => WM_SYSKEYUP,
            MessageKind::SysChar => WM_SYSCHAR,
            MessageKind::Help => WM_HELP,
            MessageKind::SetFocus => WM_SETFOCUS,
            MessageKind::KillFocus => WM_KILLFOCUS,
            MessageKind::SysColorChange => WM_SYSCOLORCHANGE,
            MessageKind::SetCursor => WM_SETCURSOR,
            MessageKind::CaptureChanged => WM_CAPTURECHANGED,
            MessageKind::UpdateUiState => WM_UPDATEUISTATE,
            MessageKind::QueryUiState => WM_QUERYUISTATE,
            MessageKind::WindowPosChanged => WM_WINDOWPOSCHANGED,
            MessageKind::InvokeMarshaled => WM_APP_INVOKE_MARSHALED,
            MessageKind::Other(raw) => raw,
        }
    }

    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            MessageKind::LeftButtonDown
                | MessageKind::LeftButtonUp
                | MessageKind::LeftButtonDoubleClick
                | MessageKind::MiddleButtonDown
                | MessageKind::MiddleButtonUp
                | MessageKind::MiddleButtonDoubleClick
                | MessageKind::RightButtonDown
                | MessageKind::RightButtonUp
                | MessageKind::RightButtonDoubleClick
                | MessageKind::MouseMove
                | MessageKind::MouseWheel
        )
    }

    pub fn is_keyboard(self) -> bool {
        matches!(
            self,
            MessageKind::KeyDown
                | MessageKind::KeyUp
                | MessageKind::Char
                | MessageKind::SysKeyDown
                | MessageKind::SysKeyUp
                | MessageKind::SysChar
        )
    }

    /// The button a press/release/double-click message refers to.
    pub fn button(self) -> Option<MouseButtons> {
        match self {
            MessageKind::LeftButtonDown
            | MessageKind::LeftButtonUp
            | MessageKind::LeftButtonDoubleClick => Some(MouseButtons::LEFT),
            MessageKind::MiddleButtonDown
            | MessageKind::MiddleButtonUp
            | MessageKind::MiddleButtonDoubleClick => Some(MouseButtons::MIDDLE),
            MessageKind::RightButtonDown
            | MessageKind::RightButtonUp
            | MessageKind::RightButtonDoubleClick => Some(MouseButtons::RIGHT),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub handle: NativeHandle,
    pub kind: MessageKind,
    pub wparam: usize,
    pub lparam: isize,
    pub result: isize,
}

impl Message {
    pub fn new(handle: NativeHandle, kind: MessageKind, wparam: usize, lparam: isize) -> Self {
        Self {
            handle,
            kind,
            wparam,
            lparam,
            result: 0,
        }
    }

    pub fn simple(handle: NativeHandle, kind: MessageKind) -> Self {
        Self::new(handle, kind, 0, 0)
    }

    /// A pointer message at client coordinates `at` with `buttons` held.
    pub fn mouse(
        handle: NativeHandle,
        kind: MessageKind,
        at: Point,
        buttons: MouseButtons,
    ) -> Self {
        Self::new(handle, kind, buttons_to_wparam(buttons), pack_point(at))
    }

    /// A wheel notification; `at` is in screen coordinates.
    pub fn wheel(handle: NativeHandle, at: Point, delta: i32, buttons: MouseButtons) -> Self {
        let wparam = buttons_to_wparam(buttons) | (((delta as i16) as u16 as usize) << 16);
        Self::new(handle, MessageKind::MouseWheel, wparam, pack_point(at))
    }

    pub fn key(handle: NativeHandle, kind: MessageKind, key: Keys) -> Self {
        Self::new(handle, kind, key.key_code().0 as usize, 0)
    }

    pub fn character(handle: NativeHandle, ch: char) -> Self {
        Self::new(handle, MessageKind::Char, ch as usize, 0)
    }

    /*
     * Position-changed notifications carry the new window rectangle (relative
     * to the parent's client area): size in `wparam`, location in `lparam`.
     */
    pub fn window_pos_changed(handle: NativeHandle, rect: Rect) -> Self {
        let wparam = ((rect.height as u16 as usize) << 16) | (rect.width as u16 as usize);
        Self::new(
            handle,
            MessageKind::WindowPosChanged,
            wparam,
            pack_point(rect.location()),
        )
    }

    pub fn window_pos_rect(&self) -> Rect {
        let at = self.point();
        Rect::new(
            at.x,
            at.y,
            loword(self.wparam as isize),
            hiword(self.wparam as isize),
        )
    }

    /// Client coordinates carried by pointer messages.
    pub fn point(&self) -> Point {
        Point::new(loword(self.lparam), hiword(self.lparam))
    }

    pub fn buttons(&self) -> MouseButtons {
        let mut buttons = MouseButtons::empty();
        if self.wparam & MK_LBUTTON != 0 {
            buttons |= MouseButtons::LEFT;
        }
        if self.wparam & MK_RBUTTON != 0 {
            buttons |= MouseButtons::RIGHT;
        }
        if self.wparam & MK_MBUTTON != 0 {
            buttons |= MouseButtons::MIDDLE;
        }
        buttons
    }

    pub fn wheel_delta(&self) -> i32 {
        ((self.wparam >> 16) & 0xFFFF) as u16 as i16 as i32
    }

    pub fn key_code(&self) -> Keys {
        Keys((self.wparam & 0xFFFF) as u32)
    }

    pub fn char_code(&self) -> Option<char> {
        char::from_u32(self.wparam as u32)
    }
}

fn buttons_to_wparam(buttons: MouseButtons) -> usize {
    let mut wparam = 0;
    if buttons.contains(MouseButtons::LEFT) {
        wparam |= MK_LBUTTON;
    }
    if buttons.contains(MouseButtons::RIGHT) {
        wparam |= MK_RBUTTON;
    }
    if buttons.contains(MouseButtons::MIDDLE) {
        wparam |= MK_MBUTTON;
    }
    wparam
}

pub(crate) fn pack_point(at: Point) -> isize {
    (((at.y as u16 as u32) << 16) | (at.x as u16 as u32)) as i32 as isize
}

/// Signed low word, as coordinates in pointer messages are signed 16-bit.
#[inline]
pub(crate) fn loword(value: isize) -> i32 {
    (value & 0xFFFF) as u16 as i16 as i32
}

#[inline]
pub(crate) fn hiword(value: isize) -> i32 {
    ((value >> 16) & 0xFFFF) as u16 as i16 as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_numbers_map_back_to_the_same_kind() {
        for raw in [WM_CREATE, WM_LBUTTONDBLCLK, WM_MOUSELEAVE, WM_APP_INVOKE_MARSHALED] {
            assert_eq!(MessageKind::from_native(raw).to_native(), raw);
        }
        assert_eq!(MessageKind::from_native(0x7777), MessageKind::Other(0x7777));
    }

    #[test]
    fn pointer_coordinates_keep_their_sign() {
        let msg = Message::mouse(
            NativeHandle(1),
            MessageKind::MouseMove,
            Point::new(-5, 300),
            MouseButtons::LEFT,
        );
        assert_eq!(msg.point(), Point::new(-5, 300));
        assert_eq!(msg.buttons(), MouseButtons::LEFT);
    }

    #[test]
    fn wheel_delta_is_signed() {
        let msg = Message::wheel(NativeHandle(1), Point::new(1, 1), -WHEEL_DELTA, MouseButtons::empty());
        assert_eq!(msg.wheel_delta(), -120);
    }

    #[test]
    fn modifier_bits_do_not_decode_as_buttons() {
        // MK_LBUTTON | MK_SHIFT | MK_CONTROL
        let msg = Message::new(NativeHandle(1), MessageKind::MouseMove, 0x0001 | 0x0004 | 0x0008, 0);
        assert_eq!(msg.buttons(), MouseButtons::LEFT);
    }

    #[test]
    fn window_pos_changed_carries_the_rect() {
        let rect = Rect::new(10, -4, 200, 80);
        let msg = Message::window_pos_changed(NativeHandle(7), rect);
        assert_eq!(msg.window_pos_rect(), rect);
    }
}
