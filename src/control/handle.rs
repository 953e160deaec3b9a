/*
 * Native handle lifecycle.
 *
 * A handle is created lazily: the first time `handle()` is asked for, or when
 * a visible control is created under a created, shown parent. Creation goes
 * parent first. Destruction goes through the platform so that every window of
 * the subtree receives its destroy notification, children before parents;
 * the control-side cleanup happens in `wm_destroy`.
 *
 * Recreation destroys the subtree and, when the root's destroy notification
 * arrives, creates it again with the saved rectangles restored. Controls being
 * recreated record platform-reported rectangles without raising events.
 */
use super::{ControlData, ControlTree, CreationState, HandleState, MouseState, RecreateSnapshot};
use crate::accessibility::AccessibleEvent;
use crate::error::{ControlError, Result};
use crate::platform::{CreateParams, ExWindowStyle, NativeHandle, WindowStyle};
use crate::types::{BorderStyle, ControlId, Cursor, Rect};

impl ControlTree {
    /*
     * Thread affinity: the owning thread of the nearest ancestor-or-self with a
     * handle. Without any handle in the chain every thread is accepted.
     */
    pub(crate) fn check_thread(&self, id: ControlId) -> Result<()> {
        let Some(owner) = self.owning_thread(id) else {
            return Ok(());
        };
        let current = std::thread::current().id();
        if owner == current {
            return Ok(());
        }
        if self.config.check_for_illegal_cross_thread_calls {
            return Err(ControlError::InvalidOperation(format!(
                "control {id:?} accessed from {current:?}, but it is owned by {owner:?}"
            )));
        }
        log::warn!("Handle: cross-thread access to {id:?} from {current:?} (owner {owner:?})");
        Ok(())
    }

    fn owning_thread(&self, id: ControlId) -> Option<std::thread::ThreadId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|c| self.controls.get(&c).and_then(|d| d.owning_thread))
    }

    /// Whether a call about `id` has to be marshaled to another thread.
    pub fn invoke_required(&self, id: ControlId) -> bool {
        self.owning_thread(id)
            .is_some_and(|owner| owner != std::thread::current().id())
    }

    /// The native handle of `id`, creating it (and its parents' handles) on demand.
    pub fn handle(&mut self, id: ControlId) -> Result<NativeHandle> {
        self.check_thread(id)?;
        self.ensure_handle(id)
    }

    /// The native handle of `id` if it exists; never creates one.
    pub fn try_handle(&self, id: ControlId) -> Option<NativeHandle> {
        self.controls.get(&id).and_then(|d| d.handle)
    }

    pub fn is_handle_created(&self, id: ControlId) -> bool {
        self.try_handle(id).is_some()
    }

    pub fn handle_state(&self, id: ControlId) -> Option<HandleState> {
        self.controls.get(&id).map(|d| d.handle_state)
    }

    pub fn creation_state(&self, id: ControlId) -> CreationState {
        if self.disposed.contains(&id) {
            return CreationState::Disposed;
        }
        self.controls
            .get(&id)
            .map_or(CreationState::NotCreated, |d| d.creation)
    }

    pub fn is_created(&self, id: ControlId) -> bool {
        self.creation_state(id) == CreationState::Created
    }

    /// The control owning a native handle.
    pub fn from_handle(&self, handle: NativeHandle) -> Option<ControlId> {
        self.handle_map.get(&handle).copied()
    }

    /*
     * Realizes `id` if it is effectively visible: its handle, then every visible
     * child. Controls that are hidden, or under a hidden ancestor, stay
     * uncreated until shown.
     */
    pub fn create_control(&mut self, id: ControlId) -> Result<()> {
        self.check_thread(id)?;
        if self.data(id)?.creation == CreationState::Created {
            return Ok(());
        }
        if !self.is_shown(id) {
            log::trace!("Handle: {id:?} not shown, creation deferred");
            return Ok(());
        }
        self.ensure_handle(id)?;
        self.data_mut(id)?.creation = CreationState::Created;
        for child in self.all_controls(id) {
            if self.is_visible(child) {
                self.create_control(child)?;
            }
        }
        Ok(())
    }

    pub(crate) fn window_styles(&self, data: &ControlData) -> (WindowStyle, ExWindowStyle) {
        let mut style = WindowStyle::CLIP_SIBLINGS;
        if data.parent.is_some() {
            style |= WindowStyle::CHILD;
        } else {
            style |= WindowStyle::POPUP | WindowStyle::CLIP_CHILDREN;
        }
        if data.container.is_some() {
            style |= WindowStyle::CLIP_CHILDREN;
        }
        if data.visible {
            style |= WindowStyle::VISIBLE;
        }
        if !data.enabled {
            style |= WindowStyle::DISABLED;
        }
        if data.tab_stop {
            style |= WindowStyle::TAB_STOP;
        }

        let mut ex_style = ExWindowStyle::empty();
        match data.border_style {
            BorderStyle::None => {}
            BorderStyle::FixedSingle => style |= WindowStyle::BORDER,
            BorderStyle::Fixed3D => ex_style |= ExWindowStyle::CLIENT_EDGE,
        }
        if data.is_focus_container() {
            ex_style |= ExWindowStyle::CONTROL_PARENT;
        }
        if data.mdi_child {
            ex_style |= ExWindowStyle::MDI_CHILD;
        }
        if data.allow_drop {
            ex_style |= ExWindowStyle::ACCEPT_FILES;
        }
        (style, ex_style)
    }

    pub(crate) fn ensure_handle(&mut self, id: ControlId) -> Result<NativeHandle> {
        let data = self.data(id)?;
        if let Some(handle) = data.handle {
            return Ok(handle);
        }
        let parent = data.parent;
        let parent_handle = match parent {
            Some(p) => Some(self.ensure_handle(p)?),
            None => None,
        };

        let data = self.data(id)?;
        let (style, ex_style) = self.window_styles(data);
        let params = CreateParams {
            class_name: data.class_name.clone(),
            caption: data.text.clone(),
            style,
            ex_style,
            bounds: data.bounds,
            parent: parent_handle,
        };
        let handle = match self.platform.create_window(&params) {
            Ok(handle) => handle,
            Err(err) => {
                log::error!(
                    "Handle: creating window of class '{}' for {id:?} failed: {err}",
                    params.class_name
                );
                return Err(err.into());
            }
        };
        log::debug!("Handle: {id:?} created as {handle:?}");

        let data = self.data_mut(id)?;
        data.handle = Some(handle);
        data.handle_state = HandleState::HandleCreated;
        data.owning_thread = Some(std::thread::current().id());
        let clip_region = data.clip_region.clone();
        let cursor = data.cursor;
        self.handle_map.insert(handle, id);
        self.sync_route(id);

        if let Some(region) = clip_region
            && let Err(err) = self.platform.set_clip_region(handle, Some(&region))
        {
            log::warn!("Handle: clip region for {id:?} not applied: {err}");
        }
        if cursor != Cursor::Default
            && let Err(err) = self.platform.set_cursor(handle, cursor)
        {
            log::warn!("Handle: cursor for {id:?} not applied: {err}");
        }
        self.dispatch_sent();

        match self.platform.get_window_rect(handle) {
            Ok(actual) => self.update_bounds(id, actual)?,
            Err(err) => log::warn!("Handle: cannot read back the rectangle of {id:?}: {err}"),
        }
        self.raise(id, |e| &mut e.handle_created, &mut ());
        self.accessibility_notify_clients(id, AccessibleEvent::Create, -1);
        if let Some(parent) = parent {
            self.update_z_order(parent);
        }
        Ok(handle)
    }

    /// Destroys the native window of `id` and its descendants; the controls survive.
    pub fn destroy_handle(&mut self, id: ControlId) -> Result<()> {
        self.check_thread(id)?;
        let Some(handle) = self.data(id)?.handle else {
            return Ok(());
        };
        self.platform.destroy_window(handle)?;
        self.dispatch_sent();
        Ok(())
    }

    /*
     * Control-side reaction to a destroy notification. A stale notification
     * (the control already carries another handle) only unmaps the handle.
     */
    pub(crate) fn wm_destroy(&mut self, id: ControlId, handle: NativeHandle) {
        self.handle_map.remove(&handle);
        let recreating = self.recreating.contains(&id);
        let Some(data) = self.controls.get_mut(&id) else {
            return;
        };
        if data.handle != Some(handle) {
            return;
        }
        data.handle = None;
        data.buffer.discard();
        data.mouse = MouseState::default();
        if recreating {
            data.handle_state = HandleState::Recreating;
        } else {
            data.handle_state = HandleState::Destroyed;
            if data.creation == CreationState::Created {
                data.creation = CreationState::NotCreated;
            }
            if self.capture == Some(id) {
                self.capture = None;
            }
            if self.focused == Some(id) {
                self.focused = None;
            }
            self.marshal
                .fail_pending(handle, format!("handle of {id:?} was destroyed"));
        }
        self.sync_route(id);
        log::debug!("Handle: {id:?} lost {handle:?} (recreating: {recreating})");

        self.raise(id, |e| &mut e.handle_destroyed, &mut ());
        if !recreating {
            self.accessibility_notify_clients(id, AccessibleEvent::Destroy, -1);
        }
        if self.pending_recreates.contains_key(&id) {
            self.complete_recreate(id);
        }
    }

    /*
     * Destroys and recreates the native window of `id` and of every descendant
     * that had one. No-op for a control without a handle.
     */
    pub fn recreate_handle(&mut self, id: ControlId) -> Result<()> {
        self.check_thread(id)?;
        let Some(handle) = self.data(id)?.handle else {
            return Ok(());
        };
        if self.recreating.contains(&id) {
            return Ok(());
        }

        let members = self.subtree(id);
        let bounds: Vec<(ControlId, Rect)> = members
            .iter()
            .filter_map(|c| self.bounds(*c).map(|b| (*c, b)))
            .collect();
        let handles: Vec<(ControlId, NativeHandle)> = members
            .iter()
            .filter_map(|c| self.try_handle(*c).map(|h| (*c, h)))
            .collect();
        let focused = self.focused.filter(|f| members.contains(f));
        log::debug!(
            "Handle: recreating {id:?} ({} native window(s))",
            handles.len()
        );

        for member in &members {
            self.recreating.insert(*member);
        }
        for (_, old) in &handles {
            self.marshal.set_recreating(*old, true);
        }
        self.pending_recreates.insert(
            id,
            RecreateSnapshot {
                bounds,
                handles,
                focused,
            },
        );

        if let Err(err) = self.platform.destroy_window(handle) {
            log::error!("Handle: destroying {handle:?} for recreation failed: {err}");
            if let Some(snapshot) = self.pending_recreates.remove(&id) {
                for (member, _) in &snapshot.bounds {
                    self.recreating.remove(member);
                }
                for (_, old) in &snapshot.handles {
                    self.marshal.set_recreating(*old, false);
                }
            }
            return Err(err.into());
        }
        self.dispatch_sent();
        Ok(())
    }

    fn complete_recreate(&mut self, root: ControlId) {
        let Some(snapshot) = self.pending_recreates.remove(&root) else {
            return;
        };

        for (member, _) in &snapshot.handles {
            if !self.exists(*member) {
                continue;
            }
            if let Err(err) = self.ensure_handle(*member) {
                log::error!("Handle: recreating {member:?} failed: {err}");
            }
        }

        // The platform may have adjusted the new windows; put the saved rectangles back.
        for (member, rect) in &snapshot.bounds {
            let Some(handle) = self.try_handle(*member) else {
                continue;
            };
            let actual = self.platform.get_window_rect(handle).ok();
            if actual != Some(*rect)
                && let Err(err) = self.platform.set_window_pos(handle, *rect)
            {
                log::warn!("Handle: restoring {rect:?} on {member:?} failed: {err}");
            }
        }
        self.dispatch_sent();

        for (member, old) in &snapshot.handles {
            match self.try_handle(*member) {
                Some(new) => {
                    if self.marshal.rekey(*old, new)
                        && let Err(err) = self.platform.async_channel().post(new)
                    {
                        log::warn!("Invoke: reposting marshaled calls to {new:?} failed: {err}");
                    }
                }
                None => {
                    self.marshal.set_recreating(*old, false);
                    self.marshal
                        .fail_pending(*old, format!("{member:?} was not recreated"));
                }
            }
        }
        for (member, _) in &snapshot.bounds {
            self.recreating.remove(member);
        }
        // Layout requested during the swap runs now, unless a suspension still holds it.
        for (member, _) in &snapshot.bounds {
            if self.layout_pending(*member)
                && !self.layout_suspended(*member)
                && let Err(err) = self.perform_layout(*member, None, None)
            {
                log::warn!("Layout: deferred pass on {member:?} after recreation failed: {err}");
            }
        }

        if let Some(focused) = snapshot.focused
            && let Some(handle) = self.try_handle(focused)
        {
            if let Err(err) = self.platform.set_focus(handle) {
                log::warn!("Focus: restoring focus to {focused:?} failed: {err}");
            }
            self.dispatch_sent();
        }
        log::debug!("Handle: recreation of {root:?} complete");
    }

    /*
     * Disposes `id` and its subtree: detached from the parent, native windows
     * destroyed, then a parent-first sweep raises `disposed` on each control and
     * removes it from the arena.
     * Disposing twice is a no-op.
     */
    pub fn dispose(&mut self, id: ControlId) -> Result<()> {
        if self.disposed.contains(&id) {
            return Ok(());
        }
        if !self.exists(id) {
            return Err(ControlError::InvalidArgument(format!(
                "unknown control {id:?}"
            )));
        }
        self.check_thread(id)?;

        if let Some(parent) = self.parent(id) {
            self.remove(parent, id)?;
        }
        if let Err(err) = self.destroy_handle(id) {
            log::warn!("Handle: destroying the windows of {id:?} during dispose failed: {err}");
        }

        let members = self.subtree(id);
        for member in &members {
            if let Some(data) = self.controls.get_mut(member) {
                data.creation = CreationState::Disposed;
            }
        }
        for member in &members {
            self.raise(*member, |e| &mut e.disposed, &mut ());
            if let Some(data) = self.controls.remove(member)
                && let Some(handle) = data.handle
            {
                self.handle_map.remove(&handle);
            }
            self.marshal.remove_route(*member);
            self.disposed.insert(*member);
            if self.capture == Some(*member) {
                self.capture = None;
            }
            if self.focused == Some(*member) {
                self.focused = None;
            }
        }
        log::debug!("Tree: disposed {id:?} ({} control(s))", members.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::control::test_support::*;
    use crate::control::{CreationState, HandleState};
    use crate::error::ControlError;
    use crate::platform::{ExWindowStyle, WindowStyle};
    use crate::types::{BorderStyle, Rect, Size};
    use std::sync::{Arc, Mutex};

    #[test]
    fn handle_is_created_lazily_parent_first() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = tree.new_top_level("root");
        let child = tree.new_control("child");
        tree.add(root, child).unwrap();
        assert_eq!(platform.window_count(), 0);

        // Act
        let child_handle = tree.handle(child).unwrap();

        // Assert
        let root_handle = tree.try_handle(root).unwrap();
        assert_eq!(platform.parent_of(child_handle), Some(root_handle));
        assert_eq!(tree.from_handle(child_handle), Some(child));
        assert_eq!(tree.creation_state(child), CreationState::NotCreated);
    }

    #[test]
    fn hidden_controls_stay_uncreated() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let hidden = tree.create(crate::control::ControlOptions::new("h").hidden());

        tree.add(root, hidden).unwrap();

        assert!(!tree.is_handle_created(hidden));
        assert_eq!(platform.window_count(), 1);
        tree.show(hidden).unwrap();
        assert!(tree.is_created(hidden));
    }

    #[test]
    fn creation_flags_follow_the_control_state() {
        let (mut tree, platform) = tree();
        let root = tree.new_top_level("root");
        let child = tree.new_control("child");
        tree.set_border_style(child, BorderStyle::Fixed3D).unwrap();
        tree.set_enabled(child, false).unwrap();
        tree.add(root, child).unwrap();

        let handle = tree.handle(child).unwrap();

        let style = platform.style(handle).unwrap();
        assert!(style.contains(WindowStyle::CHILD | WindowStyle::DISABLED));
        assert!(platform.ex_style(handle).unwrap().contains(ExWindowStyle::CLIENT_EDGE));
        let root_ex = platform.ex_style(tree.try_handle(root).unwrap()).unwrap();
        assert!(root_ex.contains(ExWindowStyle::CONTROL_PARENT));
    }

    #[test]
    fn recreation_restores_bounds_despite_platform_adjustments() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 200, 200));
        let child = tree.new_control("child");
        tree.set_bounds(child, Rect::new(10, 10, 30, 30)).unwrap();
        tree.add(root, child).unwrap();
        let old_root = tree.try_handle(root).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        for (id, name) in [(root, "root"), (child, "child")] {
            let created = Arc::clone(&events);
            tree.events_mut(id).unwrap().handle_created.add(move |_, _, _| {
                created.lock().unwrap().push(format!("{name} created"));
            });
            let destroyed = Arc::clone(&events);
            tree.events_mut(id).unwrap().handle_destroyed.add(move |_, _, _| {
                destroyed.lock().unwrap().push(format!("{name} destroyed"));
            });
        }
        platform.set_minimum_size(Size::new(50, 50));

        // Act
        tree.recreate_handle(root).unwrap();

        // Assert
        let new_root = tree.try_handle(root).unwrap();
        assert_ne!(new_root, old_root);
        assert_eq!(tree.bounds(root), Some(Rect::new(0, 0, 200, 200)));
        assert_eq!(tree.bounds(child), Some(Rect::new(10, 10, 30, 30)));
        let child_handle = tree.try_handle(child).unwrap();
        assert_eq!(platform.window_rect(child_handle), Some(Rect::new(10, 10, 30, 30)));
        assert_eq!(platform.parent_of(child_handle), Some(new_root));
        assert_eq!(tree.handle_state(root), Some(HandleState::HandleCreated));
        assert_eq!(
            *events.lock().unwrap(),
            vec!["child destroyed", "root destroyed", "root created", "child created"]
        );
    }

    #[test]
    fn recreating_without_a_handle_does_nothing() {
        let (mut tree, platform) = tree();
        let control = tree.new_control("c");

        tree.recreate_handle(control).unwrap();

        assert_eq!(platform.create_count(), 0);
        assert_eq!(tree.handle_state(control), Some(HandleState::NoHandle));
    }

    #[test]
    fn failed_creation_propagates_and_leaves_no_handle() {
        let (mut tree, platform) = tree();
        let root = tree.new_top_level("root");
        platform.fail_next_create();

        let result = tree.handle(root);

        assert!(matches!(result, Err(ControlError::Platform(_))));
        assert!(!tree.is_handle_created(root));
        assert!(tree.handle(root).is_ok());
    }

    #[test]
    fn dispose_sweeps_the_subtree_parent_first_and_is_idempotent() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let panel = tree.new_container("panel");
        let leaf = tree.new_control("leaf");
        tree.add(root, panel).unwrap();
        tree.add(panel, leaf).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for id in [panel, leaf] {
            let order = Arc::clone(&order);
            tree.events_mut(id).unwrap().disposed.add(move |_, id, _| {
                order.lock().unwrap().push(id);
            });
        }

        tree.dispose(panel).unwrap();
        tree.dispose(panel).unwrap();

        assert_eq!(*order.lock().unwrap(), vec![panel, leaf]);
        assert!(tree.controls(root).is_empty());
        assert_eq!(platform.window_count(), 1);
        assert_eq!(tree.creation_state(leaf), CreationState::Disposed);
        assert!(matches!(
            tree.set_text(leaf, "x"),
            Err(ControlError::ObjectDisposed(_))
        ));
    }

    #[test]
    fn handle_access_from_a_foreign_thread_is_rejected() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 10, 10));

        let result = std::thread::spawn(move || {
            let required = tree.invoke_required(root);
            (required, tree.handle(root).map(|_| ()))
        })
        .join()
        .unwrap();

        assert!(result.0);
        assert!(matches!(result.1, Err(ControlError::InvalidOperation(_))));
    }

    #[test]
    fn state_changes_from_a_foreign_thread_are_rejected() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let a = tree.new_control("a");
        let b = tree.new_control("b");
        tree.add(root, a).unwrap();
        tree.add(root, b).unwrap();
        tree.set_text(a, "home").unwrap();
        let handle = tree.try_handle(a).unwrap();

        // Act
        let (tree, outcomes) = std::thread::spawn(move || {
            let outcomes = vec![
                tree.set_visible(a, false),
                tree.set_enabled(a, false),
                tree.invalidate(a, None, false),
                tree.set_text(a, "moved"),
                tree.set_child_index(root, b, 0),
                tree.select_next_control(root, None, true, true, true, true).map(|_| ()),
            ];
            (tree, outcomes)
        })
        .join()
        .unwrap();

        // Assert
        for outcome in &outcomes {
            assert!(matches!(outcome, Err(ControlError::InvalidOperation(_))), "{outcome:?}");
        }
        assert!(tree.is_visible(a));
        assert!(tree.is_enabled(a));
        assert!(platform.is_visible(handle));
        assert!(platform.is_enabled(handle));
        assert_eq!(tree.text(a), Some("home"));
        assert_eq!(tree.controls(root), vec![a, b]);
    }

    #[test]
    fn foreign_thread_access_only_warns_when_checks_are_off() {
        let platform = crate::platform::headless::HeadlessPlatform::new();
        let config = crate::config::ToolkitConfig::default().with_cross_thread_checks(false);
        let mut tree = crate::control::ControlTree::new(Box::new(platform), config);
        let root = shown_root(&mut tree, Rect::new(0, 0, 10, 10));

        let result = std::thread::spawn(move || tree.handle(root).is_ok())
            .join()
            .unwrap();

        assert!(result);
    }
}
