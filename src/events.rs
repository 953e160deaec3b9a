/*
 * Typed per-instance observer lists.
 *
 * Every control owns one `EventList` per event. Handlers receive the tree, the
 * id of the control raising the event and the event arguments, so they can
 * mutate the tree freely while the event is being raised. Handlers added while
 * their list is being raised take effect from the next raise; handlers removed
 * while it is being raised are dropped once the raise completes.
 */
use crate::control::ControlTree;
use crate::error::HandlerError;
use crate::graphics::Graphics;
use crate::types::{ControlId, DragDropEffects, Keys, MouseButtons, Point, Rect, UiState};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Token returned by `EventList::add`, used to remove the handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type Handler<A, R> = Box<dyn FnMut(&mut ControlTree, ControlId, &mut A) -> R + Send>;

pub struct EventList<A, R = ()> {
    handlers: Vec<(HandlerId, Handler<A, R>)>,
    /// Handlers currently detached for raising.
    detached: Vec<HandlerId>,
    /// Removals of detached handlers requested while they were raised.
    detached_removals: Vec<HandlerId>,
}

impl<A, R> Default for EventList<A, R> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            detached: Vec::new(),
            detached_removals: Vec::new(),
        }
    }
}

impl<A, R> fmt::Debug for EventList<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventList")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<A, R> EventList<A, R> {
    pub fn add<F>(&mut self, handler: F) -> HandlerId
    where
        F: FnMut(&mut ControlTree, ControlId, &mut A) -> R + Send + 'static,
    {
        let id = HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed));
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        if self.handlers.len() != before {
            return true;
        }
        if self.detached.contains(&id) && !self.detached_removals.contains(&id) {
            self.detached_removals.push(id);
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Invokes every handler in registration order and collects the results.
    pub(crate) fn invoke(
        &mut self,
        tree: &mut ControlTree,
        source: ControlId,
        args: &mut A,
    ) -> Vec<R> {
        self.handlers
            .iter_mut()
            .map(|(_, handler)| handler(tree, source, args))
            .collect()
    }

    /// Takes the handlers out for raising; the list keeps only their ids.
    pub(crate) fn detach(&mut self) -> EventList<A, R> {
        let detached = EventList {
            handlers: std::mem::take(&mut self.handlers),
            detached: Vec::new(),
            detached_removals: Vec::new(),
        };
        self.detached = detached.handlers.iter().map(|(id, _)| *id).collect();
        detached
    }

    /*
     * Puts the handlers that were detached for raising back in front of the
     * ones registered meanwhile (`self`), honoring removals requested meanwhile.
     */
    pub(crate) fn reattach(&mut self, mut detached: EventList<A, R>) {
        self.detached.clear();
        let removals = std::mem::take(&mut self.detached_removals);
        detached.handlers.retain(|(id, _)| !removals.contains(id));
        detached.handlers.append(&mut self.handlers);
        self.handlers = detached.handlers;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEventArgs {
    pub control: ControlId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutEventArgs {
    pub affected_control: Option<ControlId>,
    pub affected_property: Option<String>,
}

impl LayoutEventArgs {
    pub fn new(affected_control: Option<ControlId>, affected_property: Option<&str>) -> Self {
        Self {
            affected_control,
            affected_property: affected_property.map(str::to_string),
        }
    }
}

pub struct PaintEventArgs {
    pub graphics: Box<dyn Graphics>,
    pub clip: Rect,
}

impl fmt::Debug for PaintEventArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaintEventArgs")
            .field("clip", &self.clip)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseEventArgs {
    pub button: MouseButtons,
    pub clicks: u32,
    pub location: Point,
    pub delta: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyEventArgs {
    pub key_data: Keys,
    pub handled: bool,
    pub suppress_key_press: bool,
}

impl KeyEventArgs {
    pub fn new(key_data: Keys) -> Self {
        Self {
            key_data,
            handled: false,
            suppress_key_press: false,
        }
    }

    pub fn key_code(&self) -> Keys {
        self.key_data.key_code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPressEventArgs {
    pub key_char: char,
    pub handled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CancelEventArgs {
    pub cancel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HelpEventArgs {
    pub mouse_pos: Point,
    pub handled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UiCuesEventArgs {
    pub changed: UiState,
    pub state: UiState,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DragEventArgs {
    pub data: Vec<String>,
    pub key_state: u32,
    pub location: Point,
    pub allowed_effect: DragDropEffects,
    pub effect: DragDropEffects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GiveFeedbackEventArgs {
    pub effect: DragDropEffects,
    pub use_default_cursors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragAction {
    #[default]
    Continue,
    Drop,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryContinueDragEventArgs {
    pub key_state: u32,
    pub escape_pressed: bool,
    pub action: DragAction,
}

pub type DragResult = std::result::Result<(), HandlerError>;

/// Every observer list a control owns.
#[derive(Debug, Default)]
pub struct ControlEvents {
    pub handle_created: EventList<()>,
    pub handle_destroyed: EventList<()>,
    pub disposed: EventList<()>,
    pub control_added: EventList<ControlEventArgs>,
    pub control_removed: EventList<ControlEventArgs>,
    pub parent_changed: EventList<()>,
    pub layout: EventList<LayoutEventArgs>,
    pub resize: EventList<()>,
    pub moved: EventList<()>,
    pub visible_changed: EventList<()>,
    pub enabled_changed: EventList<()>,
    pub text_changed: EventList<()>,
    pub back_color_changed: EventList<()>,
    pub paint_background: EventList<PaintEventArgs>,
    pub paint: EventList<PaintEventArgs>,
    pub mouse_down: EventList<MouseEventArgs>,
    pub mouse_up: EventList<MouseEventArgs>,
    pub mouse_move: EventList<MouseEventArgs>,
    pub mouse_wheel: EventList<MouseEventArgs>,
    pub mouse_enter: EventList<()>,
    pub mouse_leave: EventList<()>,
    pub mouse_hover: EventList<()>,
    pub mouse_capture_changed: EventList<()>,
    pub click: EventList<()>,
    pub mouse_click: EventList<MouseEventArgs>,
    pub double_click: EventList<()>,
    pub mouse_double_click: EventList<MouseEventArgs>,
    pub drag_moved: EventList<MouseEventArgs>,
    pub context_menu_requested: EventList<Point>,
    pub key_down: EventList<KeyEventArgs>,
    pub key_up: EventList<KeyEventArgs>,
    pub key_press: EventList<KeyPressEventArgs>,
    pub got_focus: EventList<()>,
    pub lost_focus: EventList<()>,
    pub enter: EventList<()>,
    pub leave: EventList<()>,
    pub validating: EventList<CancelEventArgs>,
    pub validated: EventList<()>,
    pub help_requested: EventList<HelpEventArgs>,
    pub system_colors_changed: EventList<()>,
    pub change_ui_cues: EventList<UiCuesEventArgs>,
    pub drag_enter: EventList<DragEventArgs, DragResult>,
    pub drag_over: EventList<DragEventArgs, DragResult>,
    pub drag_leave: EventList<(), DragResult>,
    pub drag_drop: EventList<DragEventArgs, DragResult>,
    pub give_feedback: EventList<GiveFeedbackEventArgs, DragResult>,
    pub query_continue_drag: EventList<QueryContinueDragEventArgs, DragResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_of_a_detached_handler_applies_on_reattach() {
        let mut list: EventList<()> = EventList::default();
        let first = list.add(|_, _, _| {});
        list.add(|_, _, _| {});
        let detached = list.detach();

        assert!(!list.remove(first));
        list.add(|_, _, _| {});
        list.reattach(detached);

        assert_eq!(list.len(), 2);
    }

    #[test]
    fn removing_unknown_handlers_while_detached_queues_nothing() {
        // Arrange
        let mut list: EventList<()> = EventList::default();
        let attached = list.add(|_, _, _| {});
        let mut other: EventList<()> = EventList::default();
        let stranger = other.add(|_, _, _| {});
        let detached = list.detach();

        // Act
        for _ in 0..3 {
            assert!(!list.remove(stranger));
            assert!(!list.remove(attached));
        }

        // Assert
        assert_eq!(list.detached_removals, vec![attached]);
        list.reattach(detached);
        assert!(list.is_empty());
        assert!(list.detached_removals.is_empty());
    }
}
