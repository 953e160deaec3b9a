/*
 * Keyboard routing.
 *
 * Before a key message reaches the focused control it is pre-processed:
 * command keys are offered up the parent chain, then (unless the control wants
 * the key as input) dialog keys are, with focus containers handling Tab and
 * the arrow keys as navigation. Characters with Alt held are matched against
 * mnemonics. Whatever survives is delivered, first to key-preview ancestors,
 * then as key events on the control.
 */
use super::ControlTree;
use crate::error::Result;
use crate::events::{ControlEvents, EventList, KeyEventArgs, KeyPressEventArgs};
use crate::message::{Message, MessageKind};
use crate::types::{ControlId, Keys};

impl ControlTree {
    /// Returns `true` when the message was consumed and must not be dispatched.
    pub fn pre_process_message(&mut self, id: ControlId, msg: &mut Message) -> bool {
        let modifiers = self.platform.modifier_keys();
        match msg.kind {
            MessageKind::KeyDown | MessageKind::SysKeyDown => {
                let key = msg.key_code().with(modifiers);
                if self.process_cmd_key(id, key) {
                    return true;
                }
                if self.is_input_key(id, key) {
                    return false;
                }
                self.process_dialog_key(id, key)
            }
            MessageKind::Char | MessageKind::SysChar => {
                let Some(ch) = msg.char_code() else {
                    return false;
                };
                if msg.kind == MessageKind::Char && self.is_input_char(id, ch) {
                    return false;
                }
                let alt = msg.kind == MessageKind::SysChar || modifiers.has(Keys::ALT);
                alt && self.process_mnemonic(id, ch)
            }
            _ => false,
        }
    }

    pub fn is_input_key(&self, id: ControlId, key: Keys) -> bool {
        self.controls
            .get(&id)
            .and_then(|d| d.focus_behavior.as_ref())
            .is_some_and(|b| b.is_input_key(key))
    }

    pub fn is_input_char(&self, id: ControlId, ch: char) -> bool {
        self.controls
            .get(&id)
            .and_then(|d| d.focus_behavior.as_ref())
            .is_some_and(|b| b.is_input_char(ch))
    }

    /// Offers a command key to `id` and each ancestor, nearest first.
    pub fn process_cmd_key(&mut self, id: ControlId, key: Keys) -> bool {
        for control in std::iter::once(id).chain(self.ancestors(id)) {
            let handled = self
                .controls
                .get_mut(&control)
                .and_then(|d| d.container_behavior.as_mut())
                .is_some_and(|b| b.process_cmd_key(key));
            if handled {
                log::trace!("Input: command key {key:?} handled by {control:?}");
                return true;
            }
        }
        false
    }

    /// Offers a dialog key up the chain; focus containers navigate on Tab and arrows.
    pub fn process_dialog_key(&mut self, id: ControlId, key: Keys) -> bool {
        for control in std::iter::once(id).chain(self.ancestors(id)) {
            let handled = self
                .controls
                .get_mut(&control)
                .and_then(|d| d.container_behavior.as_mut())
                .is_some_and(|b| b.process_dialog_key(key));
            if handled || (self.is_focus_container(control) && self.navigate(control, key)) {
                log::trace!("Input: dialog key {key:?} handled by {control:?}");
                return true;
            }
        }
        false
    }

    fn navigate(&mut self, container: ControlId, key: Keys) -> bool {
        if key.has(Keys::ALT) || key.has(Keys::CONTROL) {
            return false;
        }
        let result = match key.key_code() {
            Keys::TAB => self.process_tab_key(container, !key.has(Keys::SHIFT)),
            Keys::LEFT | Keys::UP => self.process_arrow_key(container, false),
            Keys::RIGHT | Keys::DOWN => self.process_arrow_key(container, true),
            _ => return false,
        };
        result.unwrap_or_else(|err| {
            log::warn!("Focus: keyboard navigation in {container:?} failed: {err}");
            false
        })
    }

    /// The control inside `container` that navigation starts from.
    fn navigation_start(&self, container: ControlId) -> Option<ControlId> {
        self.focused
            .filter(|f| self.is_ancestor_of(container, *f))
            .or_else(|| self.active_control(container))
    }

    fn process_tab_key(&mut self, container: ControlId, forward: bool) -> Result<bool> {
        let start = self.navigation_start(container);
        let wrap = self.is_top_level(container);
        self.select_next_control(container, start, forward, true, true, wrap)
    }

    /// Arrows move within the group of the active control, wrapping around.
    fn process_arrow_key(&mut self, container: ControlId, forward: bool) -> Result<bool> {
        let Some(start) = self.navigation_start(container) else {
            return Ok(false);
        };
        let group = self.parent(start).unwrap_or(container);
        self.select_next_control(group, Some(start), forward, false, false, true)
    }

    /*
     * Finds the control in `id`'s window whose caption marks `ch` as its
     * mnemonic. A selectable match gets focus; otherwise the next control in
     * tab order after it does, the way a label leads to its field.
     */
    fn process_mnemonic(&mut self, id: ControlId, ch: char) -> bool {
        let Some(root) = self.top_level_control(id) else {
            return false;
        };
        let wanted = ch.to_lowercase().collect::<String>();
        let target = self.subtree(root).into_iter().find(|c| {
            *c != root
                && self.is_shown(*c)
                && self.is_enabled_effectively(*c)
                && self
                    .text(*c)
                    .and_then(mnemonic_of)
                    .is_some_and(|m| m.to_lowercase().collect::<String>() == wanted)
        });
        let Some(target) = target else {
            return false;
        };
        log::trace!("Input: mnemonic '{ch}' matched {target:?}");
        let result = if self.can_select(target) {
            self.select(target)
        } else {
            let container = self.container_control(target).unwrap_or(root);
            self.select_next_control(container, Some(target), true, true, true, true)
        };
        result.unwrap_or_else(|err| {
            log::warn!("Focus: mnemonic selection failed: {err}");
            false
        })
    }

    /// Delivers a key message that survived pre-processing.
    pub(crate) fn wm_key(&mut self, id: ControlId, msg: &mut Message) {
        let modifiers = self.platform.modifier_keys();
        let handled = match msg.kind {
            MessageKind::KeyDown | MessageKind::SysKeyDown => {
                let mut args = KeyEventArgs::new(msg.key_code().with(modifiers));
                self.deliver_key(id, |e| &mut e.key_down, &mut args);
                if args.suppress_key_press {
                    args.handled = true;
                }
                if let Some(data) = self.controls.get_mut(&id) {
                    data.suppress_key_press = args.suppress_key_press;
                }
                args.handled
            }
            MessageKind::KeyUp | MessageKind::SysKeyUp => {
                let mut args = KeyEventArgs::new(msg.key_code().with(modifiers));
                self.deliver_key(id, |e| &mut e.key_up, &mut args);
                args.handled
            }
            _ => {
                let suppressed = self
                    .controls
                    .get_mut(&id)
                    .is_some_and(|d| std::mem::take(&mut d.suppress_key_press));
                match msg.char_code() {
                    Some(_) if suppressed => true,
                    Some(key_char) => {
                        let mut args = KeyPressEventArgs {
                            key_char,
                            handled: false,
                        };
                        self.deliver_key(id, |e| &mut e.key_press, &mut args);
                        args.handled
                    }
                    None => false,
                }
            }
        };
        if !handled {
            self.platform.default_proc(msg);
        }
    }

    /// Key-preview ancestors, nearest first, then the control itself.
    fn deliver_key<A: KeyArgs>(
        &mut self,
        id: ControlId,
        select: fn(&mut ControlEvents) -> &mut EventList<A>,
        args: &mut A,
    ) {
        let previewers: Vec<ControlId> = self
            .ancestors(id)
            .into_iter()
            .filter(|a| self.controls.get(a).is_some_and(|d| d.key_preview))
            .collect();
        for previewer in previewers {
            self.raise(previewer, select, args);
            if args.handled() {
                log::trace!("Input: key handled by preview on {previewer:?}");
                return;
            }
        }
        self.raise(id, select, args);
    }
}

trait KeyArgs {
    fn handled(&self) -> bool;
}

impl KeyArgs for KeyEventArgs {
    fn handled(&self) -> bool {
        self.handled || self.suppress_key_press
    }
}

impl KeyArgs for KeyPressEventArgs {
    fn handled(&self) -> bool {
        self.handled
    }
}

/// The character following the first single '&' of a caption.
fn mnemonic_of(text: &str) -> Option<char> {
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '&' {
            match chars.next() {
                Some('&') => continue,
                next => return next,
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::mnemonic_of;
    use crate::control::Containerish;
    use crate::control::Focusable;
    use crate::control::test_support::*;
    use crate::message::{Message, MessageKind};
    use crate::types::{Keys, Rect};
    use std::sync::{Arc, Mutex};

    #[test]
    fn mnemonic_skips_escaped_ampersands() {
        assert_eq!(mnemonic_of("&File"), Some('F'));
        assert_eq!(mnemonic_of("Save && E&xit"), Some('x'));
        assert_eq!(mnemonic_of("Plain"), None);
    }

    #[test]
    fn tab_moves_focus_to_the_next_tab_stop() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let first = tree.new_control("first");
        let second = tree.new_control("second");
        tree.add(root, first).unwrap();
        tree.add(root, second).unwrap();
        tree.focus(first).unwrap();
        let handle = tree.try_handle(first).unwrap();

        // Act
        platform.post_message(Message::key(handle, MessageKind::KeyDown, Keys::TAB));
        tree.pump();

        // Assert
        assert_eq!(tree.focused(), Some(second));
    }

    #[test]
    fn input_keys_reach_the_control_instead_of_navigating() {
        struct WantsTab;
        impl Focusable for WantsTab {
            fn is_input_key(&self, key: Keys) -> bool {
                key.key_code() == Keys::TAB
            }
        }
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let editor = tree.new_control("editor");
        let other = tree.new_control("other");
        tree.add(root, editor).unwrap();
        tree.add(root, other).unwrap();
        tree.set_focus_behavior(editor, WantsTab).unwrap();
        tree.focus(editor).unwrap();
        let keys = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&keys);
        tree.events_mut(editor).unwrap().key_down.add(move |_, _, args| {
            sink.lock().unwrap().push(args.key_code());
        });

        let handle = tree.try_handle(editor).unwrap();
        platform.post_message(Message::key(handle, MessageKind::KeyDown, Keys::TAB));
        tree.pump();

        assert_eq!(tree.focused(), Some(editor));
        assert_eq!(*keys.lock().unwrap(), vec![Keys::TAB]);
    }

    #[test]
    fn command_keys_are_offered_to_ancestors_first() {
        struct Accelerators(Arc<Mutex<Vec<Keys>>>);
        impl Containerish for Accelerators {
            fn process_cmd_key(&mut self, key: Keys) -> bool {
                self.0.lock().unwrap().push(key);
                key == Keys(0x53).with(Keys::CONTROL)
            }
        }
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let field = tree.new_control("field");
        tree.add(root, field).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        tree.set_container_behavior(root, Accelerators(Arc::clone(&seen))).unwrap();
        let pressed = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&pressed);
        tree.events_mut(field).unwrap().key_down.add(move |_, _, _| {
            *counter.lock().unwrap() += 1;
        });

        platform.set_modifier_keys(Keys::CONTROL);
        let handle = tree.try_handle(field).unwrap();
        platform.post_message(Message::key(handle, MessageKind::KeyDown, Keys(0x53)));
        tree.pump();

        assert_eq!(*seen.lock().unwrap(), vec![Keys(0x53).with(Keys::CONTROL)]);
        assert_eq!(*pressed.lock().unwrap(), 0);
    }

    #[test]
    fn key_preview_sees_keys_before_the_control() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let field = tree.new_control("field");
        tree.add(root, field).unwrap();
        tree.set_key_preview(root, true).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (id, name) in [(root, "root"), (field, "field")] {
            let sink = Arc::clone(&order);
            tree.events_mut(id).unwrap().key_press.add(move |_, _, _| {
                sink.lock().unwrap().push(name);
            });
        }

        let handle = tree.try_handle(field).unwrap();
        platform.post_message(Message::character(handle, 'a'));
        tree.pump();

        assert_eq!(*order.lock().unwrap(), vec!["root", "field"]);
    }

    #[test]
    fn suppressed_key_down_swallows_the_key_press() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        tree.events_mut(root).unwrap().key_down.add(|_, _, args| {
            args.suppress_key_press = true;
        });
        let presses = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&presses);
        tree.events_mut(root).unwrap().key_press.add(move |_, _, _| {
            *counter.lock().unwrap() += 1;
        });

        let handle = tree.try_handle(root).unwrap();
        platform.post_message(Message::key(handle, MessageKind::KeyDown, Keys(0x41)));
        platform.post_message(Message::character(handle, 'a'));
        platform.post_message(Message::character(handle, 'b'));
        tree.pump();

        assert_eq!(*presses.lock().unwrap(), 1);
    }

    #[test]
    fn alt_mnemonic_on_a_label_focuses_the_following_field() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let label = tree.create(crate::control::ControlOptions::new("label").with_text("&Name"));
        tree.set_style(label, crate::types::ControlStyles::SELECTABLE, false).unwrap();
        let field = tree.new_control("field");
        let other = tree.new_control("other");
        for c in [other, label, field] {
            tree.add(root, c).unwrap();
        }
        let handle = tree.try_handle(other).unwrap();
        tree.focus(other).unwrap();

        platform.post_message(Message::new(handle, MessageKind::SysChar, 'n' as usize, 0));
        tree.pump();

        assert_eq!(tree.focused(), Some(field));
    }
}
