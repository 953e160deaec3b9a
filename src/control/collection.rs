/*
 * Composition tree: the ordered child collection of every control.
 *
 * Public children are what `controls()` returns and what tab order walks.
 * Implicit children are owned internals of a composite widget; they take part
 * in layout, painting and handle management but never in tab order.
 * Child order doubles as Z-order, index 0 topmost.
 */
use super::ControlTree;
use crate::error::{ControlError, Result};
use crate::events::ControlEventArgs;
use crate::platform::ZOrderPosition;
use crate::types::ControlId;

impl ControlTree {
    /// Public children of `id`, in Z-order.
    pub fn controls(&self, id: ControlId) -> Vec<ControlId> {
        self.controls
            .get(&id)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    /// Public children followed by implicit children.
    pub fn all_controls(&self, id: ControlId) -> Vec<ControlId> {
        self.controls
            .get(&id)
            .map(|d| {
                d.children
                    .iter()
                    .chain(d.implicit_children.iter())
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains(&self, parent: ControlId, child: ControlId) -> bool {
        self.controls
            .get(&parent)
            .is_some_and(|d| d.children.contains(&child) || d.implicit_children.contains(&child))
    }

    pub fn child_index(&self, parent: ControlId, child: ControlId) -> Option<usize> {
        self.controls
            .get(&parent)?
            .children
            .iter()
            .position(|c| *c == child)
    }

    pub fn tab_index(&self, id: ControlId) -> Option<i32> {
        self.controls.get(&id).map(|d| d.tab_index)
    }

    pub fn set_tab_index(&mut self, id: ControlId, index: i32) -> Result<()> {
        if index < 0 {
            return Err(ControlError::InvalidArgument(format!(
                "tab index {index} is negative"
            )));
        }
        self.data_mut(id)?.tab_index = index;
        Ok(())
    }

    pub fn tab_stop(&self, id: ControlId) -> bool {
        self.controls.get(&id).is_some_and(|d| d.tab_stop)
    }

    pub fn set_tab_stop(&mut self, id: ControlId, tab_stop: bool) -> Result<()> {
        self.data_mut(id)?.tab_stop = tab_stop;
        Ok(())
    }

    /// Appends `child` to the public children of `parent`.
    pub fn add(&mut self, parent: ControlId, child: ControlId) -> Result<()> {
        self.insert_child(parent, child, false)
    }

    /// Appends `child` as an implicit (internal) child of `parent`.
    pub fn add_implicit(&mut self, parent: ControlId, child: ControlId) -> Result<()> {
        self.insert_child(parent, child, true)
    }

    fn insert_child(&mut self, parent: ControlId, child: ControlId, implicit: bool) -> Result<()> {
        self.check_thread(parent)?;
        self.data(parent)?;
        if !self.exists(child) {
            return Err(ControlError::InvalidArgument(if self.is_disposed(child) {
                format!("cannot add disposed control {child:?}")
            } else {
                format!("unknown control {child:?}")
            }));
        }
        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(ControlError::InvalidOperation(format!(
                "adding {child:?} to {parent:?} would create a cycle"
            )));
        }
        if self.contains(parent, child) {
            return self.perform_layout(parent, Some(child), Some("Parent"));
        }
        let data = self.data(child)?;
        if data.top_level && !(data.mdi_child && self.is_mdi_host(parent)) {
            return Err(ControlError::InvalidArgument(format!(
                "top-level control {child:?} cannot be added to {parent:?}"
            )));
        }

        if !implicit && self.data(child)?.tab_index < 0 {
            let next = self
                .controls(parent)
                .iter()
                .filter_map(|c| self.tab_index(*c))
                .max()
                .map_or(0, |max| max + 1);
            self.data_mut(child)?.tab_index = next;
        }

        self.suspend_layout(parent)?;
        if let Some(old_parent) = self.parent(child) {
            self.remove(old_parent, child)?;
        }

        let parent_data = self.data_mut(parent)?;
        if implicit {
            parent_data.implicit_children.push(child);
        } else {
            parent_data.children.push(child);
        }
        let parent_handle = parent_data.handle;
        let parent_created = parent_data.creation == super::CreationState::Created;
        self.data_mut(child)?.parent = Some(parent);
        log::trace!("Tree: {child:?} added to {parent:?} (implicit: {implicit})");
        self.sync_route(child);
        self.raise(child, |e| &mut e.parent_changed, &mut ());
        self.update_anchor_info(child);

        // The native side follows: reparent an existing window, or drop it when
        // the new parent has none yet so it is recreated under the right parent.
        if let Some(child_handle) = self.try_handle(child) {
            match parent_handle {
                Some(parent_handle) => {
                    if let Err(err) = self.platform.set_parent(child_handle, Some(parent_handle)) {
                        log::warn!("Tree: reparenting {child:?} natively failed: {err}");
                    }
                }
                None => self.destroy_handle(child)?,
            }
        }
        if parent_created && self.is_shown(parent) && self.is_visible(child) {
            self.create_control(child)?;
        }
        self.update_z_order(parent);

        self.raise(
            parent,
            |e| &mut e.control_added,
            &mut ControlEventArgs { control: child },
        );
        self.resume_layout(parent, false)?;
        self.perform_layout(parent, Some(child), Some("Parent"))
    }

    /// Removes `child` from `parent`; the child survives, parentless.
    pub fn remove(&mut self, parent: ControlId, child: ControlId) -> Result<()> {
        if !self.contains(parent, child) {
            return Ok(());
        }
        self.check_thread(parent)?;

        self.raise(
            parent,
            |e| &mut e.control_removed,
            &mut ControlEventArgs { control: child },
        );

        let removed = self.subtree(child);
        // Containers up the chain forget an active control that is leaving.
        for ancestor in std::iter::once(parent).chain(self.ancestors(parent)) {
            let Some(data) = self.controls.get_mut(&ancestor) else {
                continue;
            };
            if let Some(container) = data.container.as_mut()
                && container.active_control.is_some_and(|a| removed.contains(&a))
            {
                container.active_control = None;
            }
            if let Some(behavior) = data.container_behavior.as_mut() {
                behavior.on_control_removed(child);
            }
        }
        if self.focused.is_some_and(|f| removed.contains(&f)) {
            self.focused = None;
        }
        if let Some(owner) = self.capture.filter(|c| removed.contains(c)) {
            self.set_capture(owner, false)?;
        }

        let parent_data = self.data_mut(parent)?;
        parent_data.children.retain(|c| *c != child);
        parent_data.implicit_children.retain(|c| *c != child);
        self.data_mut(child)?.parent = None;
        log::trace!("Tree: {child:?} removed from {parent:?}");
        self.sync_route(child);
        self.raise(child, |e| &mut e.parent_changed, &mut ());

        if let Some(handle) = self.try_handle(child)
            && let Err(err) = self.platform.set_parent(handle, None)
        {
            log::warn!("Tree: detaching {child:?} natively failed: {err}");
        }
        self.update_z_order(parent);
        self.perform_layout(parent, Some(child), Some("Parent"))
    }

    /// Removes every public child of `id`.
    pub fn clear(&mut self, id: ControlId) -> Result<()> {
        self.suspend_layout(id)?;
        for child in self.controls(id) {
            self.remove(id, child)?;
        }
        self.resume_layout(id, true)
    }

    /// Moves `child` to `index` among its siblings (clamped), changing Z-order.
    pub fn set_child_index(&mut self, parent: ControlId, child: ControlId, index: usize) -> Result<()> {
        self.check_thread(parent)?;
        let Some(current) = self.child_index(parent, child) else {
            return Err(ControlError::InvalidArgument(format!(
                "{child:?} is not a child of {parent:?}"
            )));
        };
        let data = self.data_mut(parent)?;
        let target = index.min(data.children.len() - 1);
        if target == current {
            return Ok(());
        }
        data.children.remove(current);
        data.children.insert(target, child);
        self.update_z_order(parent);
        self.perform_layout(parent, Some(child), Some("ChildIndex"))
    }

    pub fn bring_to_front(&mut self, id: ControlId) -> Result<()> {
        match self.parent(id) {
            Some(parent) => self.set_child_index(parent, id, 0),
            None => Ok(()),
        }
    }

    pub fn send_to_back(&mut self, id: ControlId) -> Result<()> {
        match self.parent(id) {
            Some(parent) => self.set_child_index(parent, id, usize::MAX),
            None => Ok(()),
        }
    }

    /// Makes the native stacking order of `parent`'s children match child order.
    pub(crate) fn update_z_order(&mut self, parent: ControlId) {
        let handles: Vec<(ControlId, crate::platform::NativeHandle)> = self
            .all_controls(parent)
            .into_iter()
            .filter_map(|c| self.try_handle(c).map(|h| (c, h)))
            .collect();
        let mut previous = None;
        for (child, handle) in handles {
            let position = match previous {
                None => ZOrderPosition::Top,
                Some(above) => ZOrderPosition::After(above),
            };
            if let Err(err) = self.platform.set_z_order(handle, position) {
                log::warn!("Tree: restacking {child:?} failed: {err}");
            }
            previous = Some(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::control::test_support::*;
    use crate::error::ControlError;
    use crate::types::Rect;
    use std::sync::{Arc, Mutex};

    #[test]
    fn children_get_increasing_tab_indices() {
        // Arrange
        let (mut tree, _platform) = tree();
        let parent = tree.new_container("p");
        let existing: Vec<_> = (0..4).map(|i| tree.new_control(&format!("c{i}"))).collect();
        for (i, c) in existing.iter().enumerate() {
            tree.add(parent, *c).unwrap();
            assert_eq!(tree.tab_index(*c), Some(i as i32));
        }
        let late = tree.new_control("late");

        // Act
        tree.add(parent, late).unwrap();

        // Assert
        assert_eq!(tree.tab_index(late), Some(4));
        assert_eq!(tree.controls(parent).len(), 5);
    }

    #[test]
    fn auto_tab_index_follows_the_highest_sibling() {
        let (mut tree, _platform) = tree();
        let parent = tree.new_container("p");
        let first = tree.new_control("first");
        let second = tree.new_control("second");
        tree.add(parent, first).unwrap();
        tree.add(parent, second).unwrap();
        tree.set_tab_index(second, 3).unwrap();
        let third = tree.new_control("third");

        tree.add(parent, third).unwrap();

        assert_eq!(tree.tab_index(third), Some(4));
    }

    #[test]
    fn re_adding_a_child_only_lays_out_again() {
        // Arrange
        let (mut tree, _platform) = tree();
        let parent = tree.new_container("p");
        let first = tree.new_control("first");
        let second = tree.new_control("second");
        tree.add(parent, first).unwrap();
        tree.add(parent, second).unwrap();
        let engine = Arc::new(CountingLayout::default());
        tree.set_layout_engine(parent, Some(engine.clone())).unwrap();
        let before = engine.count();
        let added = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&added);
        tree.events_mut(parent).unwrap().control_added.add(move |_, _, _| {
            *counter.lock().unwrap() += 1;
        });

        // Act
        tree.add(parent, first).unwrap();

        // Assert
        assert_eq!(engine.count(), before + 1);
        assert_eq!(tree.controls(parent), vec![first, second]);
        assert_eq!(tree.parent(first), Some(parent));
        assert_eq!(tree.tab_index(first), Some(0));
        assert_eq!(tree.tab_index(second), Some(1));
        assert_eq!(*added.lock().unwrap(), 0);
    }

    #[test]
    fn adding_an_ancestor_is_rejected() {
        let (mut tree, _platform) = tree();
        let a = tree.new_container("a");
        let b = tree.new_container("b");
        tree.add(a, b).unwrap();

        assert!(matches!(tree.add(b, a), Err(ControlError::InvalidOperation(_))));
        assert!(matches!(tree.add(a, a), Err(ControlError::InvalidOperation(_))));
    }

    #[test]
    fn top_level_controls_cannot_be_nested() {
        let (mut tree, _platform) = tree();
        let host = tree.new_container("host");
        let window = tree.new_top_level("window");

        let result = tree.add(host, window);

        assert!(matches!(result, Err(ControlError::InvalidArgument(_))));
        assert!(tree.controls(host).is_empty());
        assert_eq!(tree.parent(window), None);
    }

    #[test]
    fn mdi_children_go_into_mdi_hosts_only() {
        let (mut tree, _platform) = tree();
        let host = tree.new_mdi_host("host");
        let plain = tree.new_container("plain");
        let child = tree.new_mdi_child("doc");

        assert!(tree.add(plain, child).is_err());
        tree.add(host, child).unwrap();
        assert_eq!(tree.parent(child), Some(host));
    }

    #[test]
    fn adding_moves_the_child_between_parents() {
        let (mut tree, _platform) = tree();
        let first = tree.new_container("first");
        let second = tree.new_container("second");
        let child = tree.new_control("child");
        let removed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&removed);
        tree.events_mut(first).unwrap().control_removed.add(move |_, _, args| {
            seen.lock().unwrap().push(args.control);
        });
        tree.add(first, child).unwrap();

        tree.add(second, child).unwrap();

        assert!(tree.controls(first).is_empty());
        assert_eq!(tree.controls(second), vec![child]);
        assert_eq!(tree.parent(child), Some(second));
        assert_eq!(*removed.lock().unwrap(), vec![child]);
    }

    #[test]
    fn disposed_controls_cannot_be_added() {
        let (mut tree, _platform) = tree();
        let parent = tree.new_container("p");
        let child = tree.new_control("c");
        tree.dispose(child).unwrap();

        assert!(matches!(tree.add(parent, child), Err(ControlError::InvalidArgument(_))));
    }

    #[test]
    fn child_order_drives_native_z_order() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let a = tree.new_control("a");
        let b = tree.new_control("b");
        tree.add(root, a).unwrap();
        tree.add(root, b).unwrap();
        let (ha, hb) = (tree.try_handle(a).unwrap(), tree.try_handle(b).unwrap());
        let root_handle = tree.try_handle(root);
        assert_eq!(platform.z_order(root_handle), vec![ha, hb]);

        tree.set_child_index(root, b, 0).unwrap();

        assert_eq!(tree.controls(root), vec![b, a]);
        assert_eq!(platform.z_order(root_handle), vec![hb, ha]);
    }

    #[test]
    fn implicit_children_are_hidden_from_the_public_collection() {
        let (mut tree, _platform) = tree();
        let composite = tree.new_container("composite");
        let inner = tree.new_control("inner");

        tree.add_implicit(composite, inner).unwrap();

        assert!(tree.controls(composite).is_empty());
        assert_eq!(tree.all_controls(composite), vec![inner]);
        assert_eq!(tree.parent(inner), Some(composite));
        assert_eq!(tree.tab_index(inner), Some(-1));
    }

    #[test]
    fn removing_a_focused_child_clears_focus_and_active_control() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let child = tree.new_control("child");
        tree.add(root, child).unwrap();
        assert!(tree.focus(child).unwrap());

        tree.remove(root, child).unwrap();

        assert_eq!(tree.focused(), None);
        assert_eq!(tree.active_control(root), None);
        assert_eq!(tree.parent(child), None);
    }
}
