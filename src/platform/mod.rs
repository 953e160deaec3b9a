/*
 * Boundary to the native windowing system.
 *
 * The control core never talks to a windowing API directly; it goes through a
 * `PlatformWindowService`. Native notifications come back as `Message`s on two
 * queues, mirroring how real windowing systems deliver them:
 *
 * - *sent* notifications (create, destroy, position-changed, show, capture- and
 *   focus-changed) are produced synchronously by the call that caused them. The
 *   core drains and dispatches them before that call returns.
 * - *posted* notifications (input, paint, marshaled calls) wait in the message
 *   queue until the owning thread pumps.
 */
use crate::error::PlatformResult;
use crate::graphics::Graphics;
use crate::message::Message;
use crate::types::{Cursor, Keys, Rect, Region, Size};
use bitflags::bitflags;
use std::sync::Arc;

pub mod headless;
#[cfg(target_os = "windows")]
pub mod win32;

/// Opaque identifier of a native window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(pub u64);

bitflags! {
    /// Native creation style bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WindowStyle: u32 {
        const POPUP = 0x8000_0000;
        const CHILD = 0x4000_0000;
        const VISIBLE = 0x1000_0000;
        const DISABLED = 0x0800_0000;
        const CLIP_SIBLINGS = 0x0400_0000;
        const CLIP_CHILDREN = 0x0200_0000;
        const CAPTION = 0x00C0_0000;
        const BORDER = 0x0080_0000;
        const THICK_FRAME = 0x0004_0000;
        const TAB_STOP = 0x0001_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExWindowStyle: u32 {
        const ACCEPT_FILES = 0x0000_0010;
        const MDI_CHILD = 0x0000_0040;
        const CLIENT_EDGE = 0x0000_0200;
        const CONTROL_PARENT = 0x0001_0000;
    }
}

/// Everything the platform needs to create a native window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateParams {
    pub class_name: String,
    pub caption: String,
    pub style: WindowStyle,
    pub ex_style: ExWindowStyle,
    /// Requested window rectangle, relative to the parent's client area.
    pub bounds: Rect,
    pub parent: Option<NativeHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrderPosition {
    Top,
    Bottom,
    After(NativeHandle),
}

/*
 * Thread-safe half of the platform: lets any thread wake the owning thread's
 * pump with a marshaled-call notification for `target`.
 */
pub trait AsyncMethodChannel: Send + Sync {
    fn post(&self, target: NativeHandle) -> PlatformResult<()>;
}

pub trait PlatformWindowService: Send {
    fn create_window(&mut self, params: &CreateParams) -> PlatformResult<NativeHandle>;
    fn destroy_window(&mut self, handle: NativeHandle) -> PlatformResult<()>;
    fn set_window_pos(&mut self, handle: NativeHandle, bounds: Rect) -> PlatformResult<()>;
    fn show_window(&mut self, handle: NativeHandle, visible: bool) -> PlatformResult<()>;
    fn enable_window(&mut self, handle: NativeHandle, enabled: bool) -> PlatformResult<()>;
    fn set_parent(
        &mut self,
        handle: NativeHandle,
        parent: Option<NativeHandle>,
    ) -> PlatformResult<()>;
    fn set_z_order(&mut self, handle: NativeHandle, position: ZOrderPosition)
    -> PlatformResult<()>;

    fn set_capture(&mut self, handle: NativeHandle) -> PlatformResult<()>;
    fn release_capture(&mut self) -> PlatformResult<()>;
    fn set_cursor(&mut self, handle: NativeHandle, cursor: Cursor) -> PlatformResult<()>;
    fn set_focus(&mut self, handle: NativeHandle) -> PlatformResult<()>;

    /// Window rectangle relative to the parent's client area.
    fn get_window_rect(&self, handle: NativeHandle) -> PlatformResult<Rect>;
    /// Window size needed for a client area of `client` with the given styles.
    fn adjust_window_rect(
        &self,
        client: Size,
        style: WindowStyle,
        ex_style: ExWindowStyle,
    ) -> PlatformResult<Size>;

    fn invalidate(&mut self, handle: NativeHandle, rect: Rect) -> PlatformResult<()>;
    /// Delivers any pending paint for `handle` as a sent notification.
    fn update(&mut self, handle: NativeHandle) -> PlatformResult<()>;
    /// Opens the window surface for painting; returns it with the update rectangle.
    fn begin_paint(&mut self, handle: NativeHandle) -> PlatformResult<(Box<dyn Graphics>, Rect)>;
    fn end_paint(&mut self, handle: NativeHandle, graphics: Box<dyn Graphics>)
    -> PlatformResult<()>;

    fn set_clip_region(
        &mut self,
        handle: NativeHandle,
        region: Option<&Region>,
    ) -> PlatformResult<()>;
    fn set_allow_drop(&mut self, handle: NativeHandle, allow: bool) -> PlatformResult<()>;

    fn async_channel(&self) -> Arc<dyn AsyncMethodChannel>;

    /// Sent notifications produced by the preceding calls, oldest first.
    fn drain_sent_messages(&mut self) -> Vec<Message>;
    /// Next posted notification; `None` when the queue is empty.
    fn take_posted_message(&mut self) -> Option<Message>;

    /// Modifier keys currently held, as `Keys` modifier bits.
    fn modifier_keys(&self) -> Keys;

    /// Native handling for messages the core does not consume.
    fn default_proc(&mut self, msg: &mut Message);
}
