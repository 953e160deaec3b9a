/*
 * Pointer input, capture and the smaller notifications (help, context menu,
 * cursor, system colors, keyboard cues).
 *
 * Click synthesis: a press marks the control pressed and captures the pointer;
 * the release inside the client area raises click (or double-click after a
 * double-click press), then `mouse_up`, then gives the capture back. A
 * cancelled validation in the enclosing container swallows the click.
 */
use super::{ControlTree, DragTracker};
use crate::error::Result;
use crate::events::{HelpEventArgs, MouseEventArgs, UiCuesEventArgs};
use crate::message::{Message, MessageKind, UIS_CLEAR, UIS_SET, hiword, loword};
use crate::types::{ControlId, ControlStyles, Cursor, MouseButtons, Point, UiState};

impl ControlTree {
    /// Takes (`true`) or releases (`false`) pointer capture for `id`.
    pub fn set_capture(&mut self, id: ControlId, value: bool) -> Result<()> {
        self.check_thread(id)?;
        if value {
            if self.capture == Some(id) {
                return Ok(());
            }
            let handle = self.ensure_handle(id)?;
            let previous = self.capture.replace(id);
            if let Err(err) = self.platform.set_capture(handle) {
                self.capture = previous;
                return Err(err.into());
            }
            log::trace!("Input: capture {previous:?} -> {id:?}");
        } else {
            if self.capture != Some(id) {
                return Ok(());
            }
            self.capture = None;
            self.platform.release_capture()?;
            log::trace!("Input: capture released by {id:?}");
        }
        self.dispatch_sent();
        Ok(())
    }

    pub fn capture(&self, id: ControlId) -> bool {
        self.capture == Some(id)
    }

    /// The single control holding pointer capture, if any.
    pub fn capture_owner(&self) -> Option<ControlId> {
        self.capture
    }

    pub(crate) fn wm_capture_changed(&mut self, id: ControlId) {
        if self.capture == Some(id) {
            self.capture = None;
        }
        self.raise(id, |e| &mut e.mouse_capture_changed, &mut ());
    }

    fn validation_cancelled(&self, id: ControlId) -> bool {
        self.causes_validation(id)
            && self
                .container_control(id)
                .and_then(|c| self.controls.get(&c))
                .and_then(|d| d.container.as_ref())
                .is_some_and(|c| c.validation_cancelled)
    }

    fn ensure_entered(&mut self, id: ControlId) {
        let Some(data) = self.controls.get_mut(&id) else {
            return;
        };
        if !data.mouse.entered {
            data.mouse.entered = true;
            self.raise(id, |e| &mut e.mouse_enter, &mut ());
        }
    }

    pub(crate) fn wm_mouse(&mut self, id: ControlId, msg: &Message) -> Result<()> {
        let at = msg.point();
        match msg.kind {
            MessageKind::MouseMove => self.wm_mouse_move(id, at, msg.buttons()),
            MessageKind::MouseWheel => {
                let mut args = MouseEventArgs {
                    button: msg.buttons(),
                    clicks: 0,
                    location: self.point_to_client(id, at).unwrap_or(at),
                    delta: msg.wheel_delta(),
                };
                self.raise(id, |e| &mut e.mouse_wheel, &mut args);
                Ok(())
            }
            MessageKind::LeftButtonUp | MessageKind::MiddleButtonUp | MessageKind::RightButtonUp => {
                let button = msg.kind.button().unwrap_or_default();
                self.wm_mouse_up(id, at, button)
            }
            kind => {
                let button = kind.button().unwrap_or_default();
                let double = matches!(
                    kind,
                    MessageKind::LeftButtonDoubleClick
                        | MessageKind::MiddleButtonDoubleClick
                        | MessageKind::RightButtonDoubleClick
                );
                self.wm_mouse_down(id, at, button, double)
            }
        }
    }

    fn wm_mouse_down(
        &mut self,
        id: ControlId,
        at: Point,
        button: MouseButtons,
        double: bool,
    ) -> Result<()> {
        let styles = self.data(id)?.styles;
        let data = self.data_mut(id)?;
        data.mouse.pressed = true;
        data.mouse.click_count = if double { 2 } else { 1 };
        data.mouse.double_click_fired =
            double && styles.contains(ControlStyles::STANDARD_DOUBLE_CLICK);
        if button == MouseButtons::LEFT {
            data.mouse.drag = Some(DragTracker {
                origin: at,
                dragging: false,
            });
        }

        if button == MouseButtons::LEFT
            && styles.contains(ControlStyles::SELECTABLE)
            && self.focused != Some(id)
            && self.can_focus(id)
        {
            self.focus(id)?;
        }
        self.set_capture(id, true)?;

        if self.is_enabled_effectively(id) {
            let mut args = MouseEventArgs {
                button,
                clicks: if double { 2 } else { 1 },
                location: at,
                delta: 0,
            };
            self.raise(id, |e| &mut e.mouse_down, &mut args);
        }
        Ok(())
    }

    fn wm_mouse_up(&mut self, id: ControlId, at: Point, button: MouseButtons) -> Result<()> {
        let data = self.data(id)?;
        let styles = data.styles;
        let pressed = data.mouse.pressed;
        let double_fired = data.mouse.double_click_fired;
        let clicks = data.mouse.click_count;
        let inside = self.client_rectangle(id).is_some_and(|c| c.contains(at));

        let data = self.data_mut(id)?;
        data.mouse.pressed = false;
        data.mouse.double_click_fired = false;
        data.mouse.drag = None;

        let mut args = MouseEventArgs {
            button,
            clicks,
            location: at,
            delta: 0,
        };
        if pressed
            && inside
            && styles.contains(ControlStyles::STANDARD_CLICK)
            && !self.validation_cancelled(id)
        {
            if double_fired {
                self.raise(id, |e| &mut e.double_click, &mut ());
                self.raise(id, |e| &mut e.mouse_double_click, &mut args);
            } else {
                self.raise(id, |e| &mut e.click, &mut ());
                self.raise(id, |e| &mut e.mouse_click, &mut args);
            }
        }
        if !self.exists(id) {
            return Ok(());
        }
        self.raise(id, |e| &mut e.mouse_up, &mut args);
        self.set_capture(id, false)
    }

    fn wm_mouse_move(&mut self, id: ControlId, at: Point, buttons: MouseButtons) -> Result<()> {
        self.ensure_entered(id);
        let mut args = MouseEventArgs {
            button: buttons,
            clicks: 0,
            location: at,
            delta: 0,
        };
        self.raise(id, |e| &mut e.mouse_move, &mut args);

        let threshold = self.config.drag_size;
        let Some(data) = self.controls.get_mut(&id) else {
            return Ok(());
        };
        let Some(tracker) = data.mouse.drag.as_mut() else {
            return Ok(());
        };
        if !tracker.dragging
            && ((at.x - tracker.origin.x).abs() > threshold.width / 2
                || (at.y - tracker.origin.y).abs() > threshold.height / 2)
        {
            tracker.dragging = true;
            log::trace!("Input: drag started on {id:?} at {at:?}");
        }
        if tracker.dragging {
            self.raise(id, |e| &mut e.drag_moved, &mut args);
        }
        Ok(())
    }

    pub(crate) fn wm_mouse_leave(&mut self, id: ControlId) {
        let Some(data) = self.controls.get_mut(&id) else {
            return;
        };
        data.mouse.entered = false;
        self.raise(id, |e| &mut e.mouse_leave, &mut ());
    }

    /// Help goes to the control first, then up the chain until someone handles it.
    pub(crate) fn wm_help(&mut self, id: ControlId, msg: &mut Message) {
        let mut args = HelpEventArgs {
            mouse_pos: msg.point(),
            handled: false,
        };
        let mut current = Some(id);
        while let Some(control) = current {
            self.raise(control, |e| &mut e.help_requested, &mut args);
            if args.handled {
                msg.result = 1;
                return;
            }
            current = self.parent(control);
        }
        self.platform.default_proc(msg);
    }

    /*
     * Context menu requests carry screen coordinates, or -1 when raised from the
     * keyboard. Unclaimed requests bubble to the parent.
     */
    pub(crate) fn wm_context_menu(&mut self, id: ControlId, msg: &mut Message) {
        let from_keyboard = msg.lparam == -1;
        let mut current = Some(id);
        while let Some(control) = current {
            let claimed = self
                .controls
                .get(&control)
                .is_some_and(|d| !d.events.context_menu_requested.is_empty());
            if claimed {
                let mut at = if from_keyboard {
                    Point::default()
                } else {
                    self.point_to_client(control, msg.point())
                        .unwrap_or_default()
                };
                self.raise(control, |e| &mut e.context_menu_requested, &mut at);
                msg.result = 1;
                return;
            }
            current = self.parent(control);
        }
        self.platform.default_proc(msg);
    }

    /// The cursor shown over `id`; inherited from the parent when unset.
    pub fn cursor(&self, id: ControlId) -> Cursor {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|c| self.controls.get(&c))
            .map(|d| d.cursor)
            .find(|cursor| *cursor != Cursor::Default)
            .unwrap_or_default()
    }

    pub fn set_cursor(&mut self, id: ControlId, cursor: Cursor) -> Result<()> {
        self.check_thread(id)?;
        self.data_mut(id)?.cursor = cursor;
        for control in self.subtree(id) {
            if let Some(handle) = self.try_handle(control) {
                let effective = self.cursor(control);
                if let Err(err) = self.platform.set_cursor(handle, effective) {
                    log::warn!("Input: cursor for {control:?} not applied: {err}");
                }
            }
        }
        Ok(())
    }

    pub(crate) fn wm_set_cursor(&mut self, id: ControlId, msg: &mut Message) {
        let cursor = self.cursor(id);
        if let Err(err) = self.platform.set_cursor(msg.handle, cursor) {
            log::warn!("Input: setting cursor for {id:?} failed: {err}");
            self.platform.default_proc(msg);
            return;
        }
        msg.result = 1;
    }

    pub(crate) fn wm_sys_color_change(&mut self, id: ControlId) {
        self.raise(id, |e| &mut e.system_colors_changed, &mut ());
        if let Err(err) = self.invalidate(id, None, false) {
            log::warn!("[Paint] invalidating {id:?} after a color change failed: {err}");
        }
        for child in self.all_controls(id) {
            self.wm_sys_color_change(child);
        }
    }

    pub fn ui_state(&self, id: ControlId) -> UiState {
        self.controls.get(&id).map_or(UiState::empty(), |d| d.ui_state)
    }

    pub fn show_focus_cues(&self, id: ControlId) -> bool {
        !self.ui_state(id).contains(UiState::HIDE_FOCUS)
    }

    pub fn show_keyboard_cues(&self, id: ControlId) -> bool {
        !self.ui_state(id).contains(UiState::HIDE_ACCEL)
    }

    /// Applies a keyboard-cue change to `id` and, like the platform does, its descendants.
    pub(crate) fn wm_update_ui_state(&mut self, id: ControlId, msg: &mut Message) {
        let action = loword(msg.wparam as isize);
        let flags = UiState::from_bits_truncate(hiword(msg.wparam as isize) as u16);
        for control in self.subtree(id) {
            let Some(data) = self.controls.get_mut(&control) else {
                continue;
            };
            let old = data.ui_state;
            let new = match action {
                UIS_SET => old | flags,
                UIS_CLEAR => old - flags,
                _ => old,
            };
            if new == old {
                continue;
            }
            data.ui_state = new;
            let mut args = UiCuesEventArgs {
                changed: old ^ new,
                state: new,
            };
            self.raise(control, |e| &mut e.change_ui_cues, &mut args);
            if let Err(err) = self.invalidate(control, None, false) {
                log::warn!("[Paint] invalidating {control:?} after a cue change failed: {err}");
            }
        }
        msg.result = 0;
    }
}

#[cfg(test)]
mod tests {
    use crate::control::test_support::*;
    use crate::message::{Message, MessageKind};
    use crate::types::{Cursor, MouseButtons, Point, Rect};
    use std::sync::{Arc, Mutex};

    fn record(
        tree: &mut crate::control::ControlTree,
        id: crate::types::ControlId,
        log: &Arc<Mutex<Vec<String>>>,
    ) {
        let events = tree.events_mut(id).unwrap();
        let l = Arc::clone(log);
        events.click.add(move |_, _, _| l.lock().unwrap().push("click".into()));
        let l = Arc::clone(log);
        events
            .double_click
            .add(move |_, _, _| l.lock().unwrap().push("double".into()));
        let l = Arc::clone(log);
        events
            .mouse_up
            .add(move |_, _, _| l.lock().unwrap().push("up".into()));
        let l = Arc::clone(log);
        events
            .mouse_capture_changed
            .add(move |_, _, _| l.lock().unwrap().push("capture lost".into()));
    }

    #[test]
    fn capture_is_exclusive_and_the_loser_is_told() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let a = tree.new_control("a");
        let b = tree.new_control("b");
        tree.add(root, a).unwrap();
        tree.add(root, b).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&mut tree, a, &log);
        tree.set_capture(a, true).unwrap();

        // Act
        tree.set_capture(b, true).unwrap();

        // Assert
        assert!(!tree.capture(a));
        assert!(tree.capture(b));
        assert_eq!(tree.capture_owner(), Some(b));
        assert_eq!(platform.capture(), tree.try_handle(b));
        assert_eq!(*log.lock().unwrap(), vec!["capture lost"]);
    }

    #[test]
    fn press_and_release_inside_raise_click_then_mouse_up() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let button = tree.new_control("button");
        tree.set_bounds(button, Rect::new(10, 10, 20, 20)).unwrap();
        tree.add(root, button).unwrap();
        let handle = tree.try_handle(button).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&mut tree, button, &log);

        let at = Point::new(5, 5);
        platform.post_message(Message::mouse(handle, MessageKind::LeftButtonDown, at, MouseButtons::LEFT));
        platform.post_message(Message::mouse(handle, MessageKind::LeftButtonUp, at, MouseButtons::empty()));
        tree.pump();

        assert_eq!(*log.lock().unwrap(), vec!["click", "up", "capture lost"]);
        assert_eq!(tree.focused(), Some(button));
        assert_eq!(tree.capture_owner(), None);
    }

    #[test]
    fn double_click_press_raises_double_click_on_release() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let handle = tree.try_handle(root).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&mut tree, root, &log);

        let at = Point::new(5, 5);
        for kind in [
            MessageKind::LeftButtonDown,
            MessageKind::LeftButtonUp,
            MessageKind::LeftButtonDoubleClick,
            MessageKind::LeftButtonUp,
        ] {
            platform.post_message(Message::mouse(handle, kind, at, MouseButtons::LEFT));
        }
        tree.pump();

        let clicks: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == "click" || *e == "double")
            .cloned()
            .collect();
        assert_eq!(clicks, vec!["click", "double"]);
    }

    #[test]
    fn release_outside_the_client_area_is_not_a_click() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let handle = tree.try_handle(root).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&mut tree, root, &log);

        platform.post_message(Message::mouse(handle, MessageKind::LeftButtonDown, Point::new(5, 5), MouseButtons::LEFT));
        platform.post_message(Message::mouse(handle, MessageKind::LeftButtonUp, Point::new(80, 5), MouseButtons::empty()));
        tree.pump();

        assert!(!log.lock().unwrap().contains(&"click".to_string()));
    }

    #[test]
    fn pointer_input_goes_to_the_capture_owner_in_its_coordinates() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 200, 200));
        let a = tree.new_control("a");
        tree.set_bounds(a, Rect::new(10, 10, 20, 20)).unwrap();
        let b = tree.new_control("b");
        tree.set_bounds(b, Rect::new(100, 100, 20, 20)).unwrap();
        tree.add(root, a).unwrap();
        tree.add(root, b).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tree.events_mut(a).unwrap().mouse_move.add(move |_, _, args| {
            sink.lock().unwrap().push(args.location);
        });
        tree.set_capture(a, true).unwrap();

        let hb = tree.try_handle(b).unwrap();
        platform.post_message(Message::mouse(hb, MessageKind::MouseMove, Point::new(1, 2), MouseButtons::empty()));
        tree.pump();

        assert_eq!(*seen.lock().unwrap(), vec![Point::new(91, 92)]);
    }

    #[test]
    fn captured_wheel_input_arrives_in_owner_coordinates() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 200, 200));
        let a = tree.new_control("a");
        tree.set_bounds(a, Rect::new(10, 10, 20, 20)).unwrap();
        let b = tree.new_control("b");
        tree.set_bounds(b, Rect::new(100, 100, 20, 20)).unwrap();
        tree.add(root, a).unwrap();
        tree.add(root, b).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tree.events_mut(a).unwrap().mouse_wheel.add(move |_, _, args| {
            sink.lock().unwrap().push((args.location, args.delta));
        });
        tree.set_capture(a, true).unwrap();
        let screen = tree.point_to_screen(b, Point::new(1, 2)).unwrap();

        // Act
        let hb = tree.try_handle(b).unwrap();
        platform.post_message(Message::wheel(hb, screen, -120, MouseButtons::empty()));
        tree.pump();

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec![(Point::new(91, 92), -120)]);
    }

    #[test]
    fn drag_starts_past_half_the_drag_size() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let handle = tree.try_handle(root).unwrap();
        let drags = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&drags);
        tree.events_mut(root).unwrap().drag_moved.add(move |_, _, _| {
            *counter.lock().unwrap() += 1;
        });

        platform.post_message(Message::mouse(handle, MessageKind::LeftButtonDown, Point::new(10, 10), MouseButtons::LEFT));
        platform.post_message(Message::mouse(handle, MessageKind::MouseMove, Point::new(11, 11), MouseButtons::LEFT));
        platform.post_message(Message::mouse(handle, MessageKind::MouseMove, Point::new(13, 10), MouseButtons::LEFT));
        platform.post_message(Message::mouse(handle, MessageKind::MouseMove, Point::new(14, 10), MouseButtons::LEFT));
        tree.pump();

        assert_eq!(*drags.lock().unwrap(), 2);
    }

    #[test]
    fn unhandled_help_bubbles_to_the_parent() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let child = tree.new_control("child");
        tree.add(root, child).unwrap();
        let asked = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&asked);
        tree.events_mut(root).unwrap().help_requested.add(move |_, id, args| {
            sink.lock().unwrap().push(id);
            args.handled = true;
        });

        platform.post_message(Message::simple(tree.try_handle(child).unwrap(), MessageKind::Help));
        tree.pump();

        assert_eq!(*asked.lock().unwrap(), vec![root]);
    }

    #[test]
    fn cursor_is_inherited_and_pushed_to_the_platform() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let child = tree.new_control("child");
        tree.add(root, child).unwrap();

        tree.set_cursor(root, Cursor::Hand).unwrap();

        assert_eq!(tree.cursor(child), Cursor::Hand);
        assert_eq!(platform.cursor(tree.try_handle(child).unwrap()), Some(Cursor::Hand));
    }
}
