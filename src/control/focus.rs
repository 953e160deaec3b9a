/*
 * Focus, activation and tab order.
 *
 * Tab order is (tab index, child order) among public siblings. A search
 * descends into children first, except into focus containers, which are
 * stepped over as single stops and manage their own cycle once selected.
 */
use super::ControlTree;
use crate::accessibility::AccessibleEvent;
use crate::error::{ControlError, Result};
use crate::events::CancelEventArgs;
use crate::types::{ControlId, ControlStyles};

impl ControlTree {
    pub fn focused(&self) -> Option<ControlId> {
        self.focused
    }

    /// Whether `id` or one of its descendants has focus.
    pub fn contains_focus(&self, id: ControlId) -> bool {
        self.focused
            .is_some_and(|f| f == id || self.is_ancestor_of(id, f))
    }

    /// The control last activated inside focus container `container`.
    pub fn active_control(&self, container: ControlId) -> Option<ControlId> {
        self.controls
            .get(&container)
            .and_then(|d| d.container.as_ref())
            .and_then(|c| c.active_control)
    }

    /// Activates `id` inside `container`, moving focus to it.
    pub fn set_active_control(&mut self, container: ControlId, id: ControlId) -> Result<bool> {
        self.check_thread(container)?;
        if !self.is_focus_container(container) {
            return Err(ControlError::InvalidOperation(format!(
                "{container:?} does not manage focus"
            )));
        }
        if !self.is_ancestor_of(container, id) {
            return Err(ControlError::InvalidArgument(format!(
                "{id:?} is not inside {container:?}"
            )));
        }
        self.select_control(id, false, true)
    }

    /// Visible, enabled and selectable through the whole parent chain.
    pub fn can_select(&self, id: ControlId) -> bool {
        let Some(data) = self.controls.get(&id) else {
            return false;
        };
        if !data.styles.contains(ControlStyles::SELECTABLE) {
            return false;
        }
        if data.focus_behavior.as_ref().is_some_and(|b| !b.can_select()) {
            return false;
        }
        std::iter::once(id)
            .chain(self.ancestors(id))
            .all(|c| self.is_visible(c) && self.is_enabled(c))
    }

    /// Focus additionally needs a realized, shown and enabled window.
    pub fn can_focus(&self, id: ControlId) -> bool {
        self.is_handle_created(id) && self.is_shown(id) && self.is_enabled_effectively(id)
    }

    /*
     * Moves focus to `id`. When both the focused control and `id` cause
     * validation, the focused control is validated first; a cancelled
     * validation keeps focus where it is and returns `false`.
     */
    pub fn focus(&mut self, id: ControlId) -> Result<bool> {
        self.check_thread(id)?;
        if !self.can_focus(id) {
            log::trace!("Focus: {id:?} cannot take focus");
            return Ok(false);
        }
        if self.focused == Some(id) {
            return Ok(true);
        }
        if let Some(old) = self.focused
            && self.causes_validation(old)
            && self.causes_validation(id)
            && !self.validate_control(old)?
        {
            return Ok(false);
        }
        let Some(handle) = self.try_handle(id) else {
            return Ok(false);
        };
        self.platform.set_focus(handle)?;
        self.dispatch_sent();
        Ok(self.focused == Some(id))
    }

    /// Validates the focused control inside `container`.
    pub fn validate(&mut self, container: ControlId) -> Result<bool> {
        match self.focused.filter(|f| self.is_ancestor_of(container, *f)) {
            Some(active) => self.validate_control(active),
            None => Ok(true),
        }
    }

    fn validate_control(&mut self, id: ControlId) -> Result<bool> {
        let mut args = CancelEventArgs::default();
        self.raise(id, |e| &mut e.validating, &mut args);
        let containers: Vec<ControlId> = self
            .ancestors(id)
            .into_iter()
            .filter(|a| self.is_focus_container(*a))
            .collect();
        for container in &containers {
            if let Some(state) = self
                .controls
                .get_mut(container)
                .and_then(|d| d.container.as_mut())
            {
                state.validation_cancelled = args.cancel;
            }
        }
        if args.cancel {
            log::debug!("Focus: validation of {id:?} cancelled");
            return Ok(false);
        }
        self.raise(id, |e| &mut e.validated, &mut ());
        Ok(true)
    }

    pub(crate) fn wm_set_focus(&mut self, id: ControlId) -> Result<()> {
        let previous = self.focused;
        if previous == Some(id) {
            return Ok(());
        }
        self.focused = Some(id);
        log::trace!("Focus: {previous:?} -> {id:?}");

        let old_chain: Vec<ControlId> = previous
            .filter(|p| self.exists(*p))
            .map(|p| std::iter::once(p).chain(self.ancestors(p)).collect())
            .unwrap_or_default();
        let new_chain: Vec<ControlId> = std::iter::once(id).chain(self.ancestors(id)).collect();

        // Containers remember which of their descendants is active.
        let mut active = id;
        for ancestor in &new_chain[1..] {
            if let Some(state) = self
                .controls
                .get_mut(ancestor)
                .and_then(|d| d.container.as_mut())
            {
                state.active_control = Some(active);
                active = *ancestor;
            }
        }

        for leaving in old_chain.iter().filter(|c| !new_chain.contains(c)) {
            self.raise(*leaving, |e| &mut e.leave, &mut ());
        }
        for entering in new_chain.iter().rev().filter(|c| !old_chain.contains(c)) {
            self.raise(*entering, |e| &mut e.enter, &mut ());
        }
        self.raise(id, |e| &mut e.got_focus, &mut ());
        self.accessibility_notify_clients(id, AccessibleEvent::Focus, -1);
        Ok(())
    }

    /*
     * `new_focus` is the window receiving focus. When it is not one of ours,
     * focus left the tree and the whole chain is left.
     */
    pub(crate) fn wm_kill_focus(&mut self, id: ControlId, new_focus: usize) {
        self.raise(id, |e| &mut e.lost_focus, &mut ());
        let staying = self
            .handle_map
            .contains_key(&crate::platform::NativeHandle(new_focus as u64));
        if !staying && self.focused == Some(id) {
            self.focused = None;
            for leaving in std::iter::once(id).chain(self.ancestors(id)) {
                self.raise(leaving, |e| &mut e.leave, &mut ());
            }
        }
    }

    /// Selects `id` the way a click or an explicit call does.
    pub fn select(&mut self, id: ControlId) -> Result<bool> {
        self.select_control(id, false, true)
    }

    /*
     * Selecting a focus container selects inside it: its active control when it
     * still qualifies, otherwise the first (or last, going backwards) tab stop.
     */
    pub(crate) fn select_control(
        &mut self,
        id: ControlId,
        directed: bool,
        forward: bool,
    ) -> Result<bool> {
        if !self.can_select(id) {
            return Ok(false);
        }
        if self.is_focus_container(id) {
            if !directed
                && let Some(active) = self.active_control(id)
                && self.can_select(active)
            {
                return self.focus(active);
            }
            if self.select_next_control(id, None, forward, true, true, false)? {
                return Ok(true);
            }
        }
        self.focus(id)
    }

    fn first_child_in_tab_order(&self, id: ControlId, forward: bool) -> Option<ControlId> {
        let children = self.controls(id);
        let mut found: Option<(ControlId, i32)> = None;
        if forward {
            for child in children {
                let index = self.tab_index(child).unwrap_or(0);
                if found.is_none_or(|(_, f)| f > index) {
                    found = Some((child, index));
                }
            }
        } else {
            for child in children.into_iter().rev() {
                let index = self.tab_index(child).unwrap_or(0);
                if found.is_none_or(|(_, f)| f < index) {
                    found = Some((child, index));
                }
            }
        }
        found.map(|(child, _)| child)
    }

    /*
     * The control after (or before) `start` in `container`'s tab order, or
     * `None` at the end of the cycle. A `start` outside the container means
     * "from the beginning".
     */
    pub fn get_next_control(
        &self,
        container: ControlId,
        start: Option<ControlId>,
        forward: bool,
    ) -> Option<ControlId> {
        let mut ctl = start
            .filter(|s| self.is_ancestor_of(container, *s))
            .unwrap_or(container);

        if forward {
            if (ctl == container || !self.is_focus_container(ctl))
                && let Some(found) = self.first_child_in_tab_order(ctl, true)
            {
                return Some(found);
            }
            while ctl != container {
                let parent = self.parent(ctl)?;
                let target = self.tab_index(ctl).unwrap_or(0);
                let mut hit = false;
                let mut found: Option<(ControlId, i32)> = None;
                for sibling in self.controls(parent) {
                    if sibling == ctl {
                        hit = true;
                        continue;
                    }
                    let index = self.tab_index(sibling).unwrap_or(0);
                    if index >= target
                        && found.is_none_or(|(_, f)| f > index)
                        && (index != target || hit)
                    {
                        found = Some((sibling, index));
                    }
                }
                if let Some((sibling, _)) = found {
                    return Some(sibling);
                }
                ctl = parent;
            }
            return None;
        }

        if ctl != container {
            let parent = self.parent(ctl)?;
            let target = self.tab_index(ctl).unwrap_or(0);
            let mut hit = false;
            let mut found: Option<(ControlId, i32)> = None;
            for sibling in self.controls(parent).into_iter().rev() {
                if sibling == ctl {
                    hit = true;
                    continue;
                }
                let index = self.tab_index(sibling).unwrap_or(0);
                if index <= target
                    && found.is_none_or(|(_, f)| f < index)
                    && (index != target || hit)
                {
                    found = Some((sibling, index));
                }
            }
            match found {
                Some((sibling, _)) => ctl = sibling,
                None => return (parent != container).then_some(parent),
            }
        }
        while ctl == container || !self.is_focus_container(ctl) {
            match self.first_child_in_tab_order(ctl, false) {
                Some(last) => ctl = last,
                None => break,
            }
        }
        (ctl != container).then_some(ctl)
    }

    /*
     * Selects the next qualifying control after `start` inside `container`.
     * Returns whether one was found; with `wrap` the search restarts once from
     * the beginning.
     */
    pub fn select_next_control(
        &mut self,
        container: ControlId,
        start: Option<ControlId>,
        forward: bool,
        tab_stop_only: bool,
        nested: bool,
        wrap: bool,
    ) -> Result<bool> {
        self.check_thread(container)?;
        let start = start.filter(|s| {
            self.is_ancestor_of(container, *s) && (nested || self.parent(*s) == Some(container))
        });
        let mut ctl = start;
        let mut already_wrapped = false;
        loop {
            ctl = self.get_next_control(container, ctl, forward);
            match ctl {
                None => {
                    if !wrap {
                        break;
                    }
                    if already_wrapped {
                        return Ok(false);
                    }
                    already_wrapped = true;
                }
                Some(candidate) => {
                    if self.can_select(candidate)
                        && (!tab_stop_only || self.tab_stop(candidate))
                        && (nested || self.parent(candidate) == Some(container))
                    {
                        return self.select_control(candidate, true, forward);
                    }
                }
            }
            if ctl == start {
                break;
            }
        }
        Ok(false)
    }

    /// Moves focus away from `id`'s subtree when it is being hidden or disabled.
    pub(crate) fn select_next_if_focused(&mut self, id: ControlId) -> Result<()> {
        if !self.contains_focus(id) {
            return Ok(());
        }
        let Some(container) = self.container_control(id) else {
            return Ok(());
        };
        if !self.select_next_control(container, Some(id), true, true, true, true)? {
            log::debug!("Focus: nothing left to focus after {id:?}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::control::test_support::*;
    use crate::message::{Message, MessageKind};
    use crate::types::{ControlId, MouseButtons, Point, Rect};
    use std::sync::{Arc, Mutex};

    fn children_with_tab_indices(
        tree: &mut crate::control::ControlTree,
        parent: ControlId,
        indices: &[i32],
    ) -> Vec<ControlId> {
        indices
            .iter()
            .enumerate()
            .map(|(i, index)| {
                let child = tree.new_control(&format!("c{i}"));
                tree.add(parent, child).unwrap();
                tree.set_tab_index(child, *index).unwrap();
                child
            })
            .collect()
    }

    #[test]
    fn tab_order_breaks_ties_by_child_order_and_wraps() {
        // Arrange
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let c = children_with_tab_indices(&mut tree, root, &[2, 0, 0, 5]);

        // Act
        let mut visited = Vec::new();
        let mut current = None;
        for _ in 0..5 {
            assert!(
                tree.select_next_control(root, current, true, true, true, true)
                    .unwrap()
            );
            current = tree.focused();
            visited.push(current.unwrap());
        }

        // Assert
        assert_eq!(visited, vec![c[1], c[2], c[0], c[3], c[1]]);
    }

    #[test]
    fn backward_order_mirrors_forward_order() {
        let (mut tree, _platform) = tree();
        let root = tree.new_top_level("root");
        let c = children_with_tab_indices(&mut tree, root, &[2, 0, 0, 5]);

        let mut order = Vec::new();
        let mut current = None;
        while let Some(next) = tree.get_next_control(root, current, false) {
            order.push(next);
            current = Some(next);
        }

        assert_eq!(order, vec![c[3], c[0], c[2], c[1]]);
    }

    #[test]
    fn nested_focus_containers_are_single_stops() {
        let (mut tree, _platform) = tree();
        let root = tree.new_top_level("root");
        let before = tree.new_control("before");
        let group = tree.new_container("group");
        let inner = tree.new_control("inner");
        let after = tree.new_control("after");
        tree.add(root, before).unwrap();
        tree.add(root, group).unwrap();
        tree.add(group, inner).unwrap();
        tree.add(root, after).unwrap();

        assert_eq!(tree.get_next_control(root, Some(before), true), Some(group));
        assert_eq!(tree.get_next_control(root, Some(group), true), Some(after));
        assert_eq!(tree.get_next_control(root, Some(inner), true), Some(after));
    }

    #[test]
    fn plain_parents_are_descended_into() {
        let (mut tree, _platform) = tree();
        let root = tree.new_top_level("root");
        let panel = tree.new_control("panel");
        let inner = tree.new_control("inner");
        tree.add(root, panel).unwrap();
        tree.add(panel, inner).unwrap();

        assert_eq!(tree.get_next_control(root, Some(panel), true), Some(inner));
        assert_eq!(tree.get_next_control(root, Some(inner), true), None);
        assert_eq!(tree.get_next_control(root, None, false), Some(inner));
    }

    #[test]
    fn selecting_a_container_focuses_its_first_tab_stop() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let group = tree.new_container("group");
        tree.add(root, group).unwrap();
        let c = children_with_tab_indices(&mut tree, group, &[1, 0]);

        assert!(tree.select(group).unwrap());

        assert_eq!(tree.focused(), Some(c[1]));
        assert_eq!(tree.active_control(group), Some(c[1]));
        assert_eq!(tree.active_control(root), Some(group));
        assert!(tree.contains_focus(group));
    }

    #[test]
    fn cancelled_validation_keeps_focus_and_blocks_clicks() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let c = children_with_tab_indices(&mut tree, root, &[0, 1]);
        tree.focus(c[0]).unwrap();
        tree.events_mut(c[0]).unwrap().validating.add(|_, _, args| {
            args.cancel = true;
        });

        let moved = tree.focus(c[1]).unwrap();

        assert!(!moved);
        assert_eq!(tree.focused(), Some(c[0]));
        let handle = tree.try_handle(c[1]).unwrap();
        let clicks = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&clicks);
        tree.events_mut(c[1]).unwrap().click.add(move |_, _, _| {
            *counter.lock().unwrap() += 1;
        });
        let at = Point::new(1, 1);
        let mut down = Message::mouse(handle, MessageKind::LeftButtonDown, at, MouseButtons::LEFT);
        let mut up = Message::mouse(handle, MessageKind::LeftButtonUp, at, MouseButtons::empty());
        tree.wnd_proc(c[1], &mut down).unwrap();
        tree.wnd_proc(c[1], &mut up).unwrap();

        assert_eq!(*clicks.lock().unwrap(), 0);
    }

    #[test]
    fn focus_change_raises_leave_and_enter_along_the_chains() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let left = tree.new_container("left");
        let right = tree.new_container("right");
        tree.add(root, left).unwrap();
        tree.add(root, right).unwrap();
        let a = tree.new_control("a");
        let b = tree.new_control("b");
        tree.add(left, a).unwrap();
        tree.add(right, b).unwrap();
        tree.focus(a).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (id, name) in [(a, "a"), (left, "left"), (right, "right"), (b, "b")] {
            let sink = Arc::clone(&log);
            tree.events_mut(id).unwrap().leave.add(move |_, _, _| {
                sink.lock().unwrap().push(format!("leave {name}"));
            });
            let sink = Arc::clone(&log);
            tree.events_mut(id).unwrap().enter.add(move |_, _, _| {
                sink.lock().unwrap().push(format!("enter {name}"));
            });
        }

        tree.focus(b).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["leave a", "leave left", "enter right", "enter b"]
        );
    }

    #[test]
    fn hiding_the_focused_control_moves_focus_on() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let c = children_with_tab_indices(&mut tree, root, &[0, 1]);
        tree.focus(c[0]).unwrap();

        tree.hide(c[0]).unwrap();

        assert_eq!(tree.focused(), Some(c[1]));
    }

    #[test]
    fn disabling_the_focused_control_moves_focus_on() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let c = children_with_tab_indices(&mut tree, root, &[0, 1, 2]);
        tree.focus(c[1]).unwrap();

        // Act
        tree.set_enabled(c[1], false).unwrap();

        // Assert
        assert_eq!(tree.focused(), Some(c[2]));
        assert_eq!(platform.focus(), tree.try_handle(c[2]));
        assert!(!tree.can_focus(c[1]));
    }
}
