/*
 * Control core of a native-window GUI toolkit.
 *
 * `ControlTree` owns every control of one UI thread and implements the shared
 * behavior of all of them: native handle lifecycle, the parent/child tree,
 * suspendable layout, invalidation and double-buffered painting, message
 * dispatch and input state, focus and tab order, and cross-thread marshaling.
 * Native windows are reached only through a `PlatformWindowService`; the
 * headless implementation runs on every platform, the Win32 one on Windows.
 */
pub mod accessibility;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod graphics;
pub mod layout;
pub mod message;
pub mod platform;
pub mod theme;
pub mod types;

pub use config::ToolkitConfig;
pub use control::invoke::AmbientContext;
pub use control::{
    AsyncResult, ControlOptions, ControlTree, CreationState, HandleState, Marshaler,
    PaintContext, Paintable,
};
pub use error::{ControlError, PlatformError, PlatformResult, Result};
pub use layout::{DefaultLayout, LayoutEngine};
pub use platform::headless::HeadlessPlatform;
#[cfg(target_os = "windows")]
pub use platform::win32::Win32Platform;
pub use platform::{NativeHandle, PlatformWindowService};
pub use types::{Color, ControlId, ControlStyles, Point, Rect, Region, Size};
