/*
 * Message dispatch.
 *
 * Sent notifications (produced synchronously by platform calls) are drained
 * and dispatched right after the call that produced them. Posted messages are
 * pumped: pointer messages are redirected to the capture owner, keyboard
 * messages go through pre-processing first, then `wnd_proc` maps the message
 * to the control's reaction and events.
 */
use super::ControlTree;
use crate::error::Result;
use crate::message::{Message, MessageKind};
use crate::types::ControlId;

impl ControlTree {
    /// Dispatches every pending sent notification, including ones produced meanwhile.
    pub(crate) fn dispatch_sent(&mut self) {
        loop {
            let batch = self.platform.drain_sent_messages();
            if batch.is_empty() {
                break;
            }
            for mut msg in batch {
                self.route(&mut msg);
            }
        }
    }

    fn route(&mut self, msg: &mut Message) {
        match self.from_handle(msg.handle) {
            Some(id) => {
                if let Err(err) = self.wnd_proc(id, msg) {
                    log::error!("Platform: {:?} for {id:?} failed: {err}", msg.kind);
                }
            }
            None => self.platform.default_proc(msg),
        }
    }

    /// Dispatches posted messages until the queue runs dry; returns how many ran.
    pub fn pump(&mut self) -> usize {
        self.dispatch_sent();
        let mut handled = 0;
        while self.pump_one() {
            handled += 1;
        }
        handled
    }

    /// Dispatches at most one posted message.
    pub fn pump_one(&mut self) -> bool {
        let Some(msg) = self.platform.take_posted_message() else {
            return false;
        };
        self.dispatch_posted(msg);
        true
    }

    fn dispatch_posted(&mut self, mut msg: Message) {
        let Some(mut target) = self.from_handle(msg.handle) else {
            log::trace!("Platform: {:?} for unmapped {:?}", msg.kind, msg.handle);
            self.platform.default_proc(&mut msg);
            return;
        };
        if msg.kind.is_pointer() {
            target = self.retarget_to_capture(target, &mut msg);
        }
        if msg.kind.is_keyboard() && self.pre_process_message(target, &mut msg) {
            log::trace!("Input: {:?} consumed by pre-processing", msg.kind);
            self.dispatch_sent();
            return;
        }
        if let Err(err) = self.wnd_proc(target, &mut msg) {
            log::error!("Platform: {:?} for {target:?} failed: {err}", msg.kind);
        }
        self.dispatch_sent();
    }

    /// Sends pointer input to the capture owner, translating its coordinates.
    fn retarget_to_capture(&self, target: ControlId, msg: &mut Message) -> ControlId {
        let Some(owner) = self.capture.filter(|owner| *owner != target) else {
            return target;
        };
        let Some(owner_handle) = self.try_handle(owner) else {
            return target;
        };
        // Wheel positions are already in screen coordinates.
        if msg.kind == MessageKind::MouseWheel {
            msg.handle = owner_handle;
            return owner;
        }
        let Some(local) = self
            .point_to_screen(target, msg.point())
            .and_then(|screen| self.point_to_client(owner, screen))
        else {
            return target;
        };
        msg.handle = owner_handle;
        msg.lparam = crate::message::pack_point(local);
        owner
    }

    /// Window procedure of every control: one message, one control.
    pub fn wnd_proc(&mut self, id: ControlId, msg: &mut Message) -> Result<()> {
        match msg.kind {
            MessageKind::Create => {
                log::trace!("Platform: {id:?} received its create notification");
                self.platform.default_proc(msg);
            }
            MessageKind::ShowWindow => {
                // A layout deferred while hidden runs once the window is shown.
                if msg.wparam != 0 && self.layout_pending(id) && !self.layout_suspended(id) {
                    self.perform_layout(id, None, Some("Visible"))?;
                }
                self.platform.default_proc(msg);
            }
            MessageKind::Destroy => {
                self.wm_destroy(id, msg.handle);
                self.platform.default_proc(msg);
            }
            MessageKind::WindowPosChanged => self.update_bounds(id, msg.window_pos_rect())?,
            MessageKind::Paint => self.wm_paint(id, msg.handle),
            MessageKind::EraseBackground => {
                if self.suppresses_erase_background(id) {
                    msg.result = 1;
                } else {
                    self.platform.default_proc(msg);
                }
            }
            MessageKind::SetFocus => self.wm_set_focus(id)?,
            MessageKind::KillFocus => self.wm_kill_focus(id, msg.wparam),
            MessageKind::CaptureChanged => self.wm_capture_changed(id),
            kind if kind.is_pointer() => self.wm_mouse(id, msg)?,
            MessageKind::MouseLeave => self.wm_mouse_leave(id),
            MessageKind::MouseHover => self.raise(id, |e| &mut e.mouse_hover, &mut ()),
            kind if kind.is_keyboard() => self.wm_key(id, msg),
            MessageKind::Help => self.wm_help(id, msg),
            MessageKind::ContextMenu => self.wm_context_menu(id, msg),
            MessageKind::SetCursor => self.wm_set_cursor(id, msg),
            MessageKind::SysColorChange => self.wm_sys_color_change(id),
            MessageKind::UpdateUiState => self.wm_update_ui_state(id, msg),
            MessageKind::QueryUiState => {
                msg.result = self
                    .controls
                    .get(&id)
                    .map_or(0, |d| d.ui_state.bits() as isize);
            }
            MessageKind::InvokeMarshaled => self.invoke_marshaled_callbacks(msg.handle),
            _ => self.platform.default_proc(msg),
        }
        Ok(())
    }
}
