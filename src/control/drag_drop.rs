/*
 * Drag-and-drop notifications and the native properties that go with them.
 *
 * Target-side events (enter, over, leave, drop) only reach controls that
 * accept drops. Handler failures during the drag are logged and ignored; a
 * failing drop handler is reported back to the caller.
 */
use super::ControlTree;
use crate::error::{ControlError, HandlerError, Result};
use crate::events::{
    ControlEvents, DragEventArgs, DragResult, EventList, GiveFeedbackEventArgs,
    QueryContinueDragEventArgs,
};
use crate::types::{ControlId, DragDropEffects, Region};

impl ControlTree {
    pub fn allow_drop(&self, id: ControlId) -> bool {
        self.controls.get(&id).is_some_and(|d| d.allow_drop)
    }

    pub fn set_allow_drop(&mut self, id: ControlId, allow: bool) -> Result<()> {
        self.check_thread(id)?;
        let data = self.data_mut(id)?;
        if data.allow_drop == allow {
            return Ok(());
        }
        data.allow_drop = allow;
        if let Some(handle) = data.handle
            && let Err(err) = self.platform.set_allow_drop(handle, allow)
        {
            log::warn!("Platform: set_allow_drop({allow}) on {id:?} failed: {err}");
        }
        Ok(())
    }

    pub fn clip_region(&self, id: ControlId) -> Option<Region> {
        self.controls.get(&id).and_then(|d| d.clip_region.clone())
    }

    /// Restricts the visible window area of `id`; `None` lifts the restriction.
    pub fn set_clip_region(&mut self, id: ControlId, region: Option<Region>) -> Result<()> {
        self.check_thread(id)?;
        let data = self.data_mut(id)?;
        if data.clip_region == region {
            return Ok(());
        }
        data.clip_region = region;
        if let Some(handle) = data.handle {
            let region = data.clip_region.clone();
            if let Err(err) = self.platform.set_clip_region(handle, region.as_ref()) {
                log::warn!("Platform: set_clip_region on {id:?} failed: {err}");
            }
            self.dispatch_sent();
        }
        self.invalidate(id, None, false)
    }

    fn raise_drag<A>(
        &mut self,
        id: ControlId,
        what: &str,
        select: fn(&mut ControlEvents) -> &mut EventList<A, DragResult>,
        args: &mut A,
    ) -> Option<HandlerError> {
        let failure = self
            .raise_with(id, select, args)
            .into_iter()
            .find_map(|outcome| outcome.err());
        if let Some(err) = &failure {
            log::debug!("Input: {what} handler on {id:?} failed: {err}");
        }
        failure
    }

    pub fn on_drag_enter(&mut self, id: ControlId, args: &mut DragEventArgs) {
        if !self.allow_drop(id) {
            args.effect = DragDropEffects::empty();
            return;
        }
        self.raise_drag(id, "drag enter", |e| &mut e.drag_enter, args);
    }

    pub fn on_drag_over(&mut self, id: ControlId, args: &mut DragEventArgs) {
        if !self.allow_drop(id) {
            args.effect = DragDropEffects::empty();
            return;
        }
        self.raise_drag(id, "drag over", |e| &mut e.drag_over, args);
    }

    pub fn on_drag_leave(&mut self, id: ControlId) {
        if !self.allow_drop(id) {
            return;
        }
        self.raise_drag(id, "drag leave", |e| &mut e.drag_leave, &mut ());
    }

    /// Source side: lets the dragged-from control pick the feedback cursor.
    pub fn on_give_feedback(&mut self, id: ControlId, args: &mut GiveFeedbackEventArgs) {
        self.raise_drag(id, "give feedback", |e| &mut e.give_feedback, args);
    }

    /// Source side: decides whether the drag continues, drops or is cancelled.
    pub fn on_query_continue_drag(&mut self, id: ControlId, args: &mut QueryContinueDragEventArgs) {
        self.raise_drag(id, "query continue drag", |e| &mut e.query_continue_drag, args);
    }

    pub fn on_drag_drop(&mut self, id: ControlId, args: &mut DragEventArgs) -> Result<()> {
        if !self.allow_drop(id) {
            args.effect = DragDropEffects::empty();
            return Ok(());
        }
        match self.raise_drag(id, "drop", |e| &mut e.drag_drop, args) {
            Some(err) => {
                log::error!("Input: drop on {id:?} failed: {err}");
                Err(ControlError::HandlerFailed(err.to_string()))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::control::test_support::*;
    use crate::error::ControlError;
    use crate::events::{DragAction, DragEventArgs, QueryContinueDragEventArgs};
    use crate::types::{DragDropEffects, Rect, Region};
    use std::sync::{Arc, Mutex};

    fn offer(effect: DragDropEffects) -> DragEventArgs {
        DragEventArgs {
            data: vec!["notes.txt".to_string()],
            allowed_effect: effect,
            effect,
            ..DragEventArgs::default()
        }
    }

    #[test]
    fn targets_that_refuse_drops_hear_nothing() {
        // Arrange
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        tree.events_mut(root).unwrap().drag_enter.add(move |_, _, _| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });
        let mut args = offer(DragDropEffects::COPY);

        // Act
        tree.on_drag_enter(root, &mut args);

        // Assert
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(args.effect.is_empty());
    }

    #[test]
    fn failing_drag_handlers_are_swallowed_but_drop_failures_surface() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        tree.set_allow_drop(root, true).unwrap();
        let events = tree.events_mut(root).unwrap();
        events.drag_over.add(|_, _, _| Err("over".into()));
        events.drag_drop.add(|_, _, args| {
            args.effect = DragDropEffects::MOVE;
            Err("disk full".into())
        });
        let mut args = offer(DragDropEffects::COPY | DragDropEffects::MOVE);

        tree.on_drag_over(root, &mut args);
        let dropped = tree.on_drag_drop(root, &mut args);

        assert_eq!(
            dropped,
            Err(ControlError::HandlerFailed("disk full".to_string()))
        );
        assert_eq!(args.effect, DragDropEffects::MOVE);
    }

    #[test]
    fn source_side_events_run_without_allow_drop() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        tree.events_mut(root)
            .unwrap()
            .query_continue_drag
            .add(|_, _, args| {
                if args.escape_pressed {
                    args.action = DragAction::Cancel;
                }
                Ok(())
            });
        let mut args = QueryContinueDragEventArgs {
            escape_pressed: true,
            ..QueryContinueDragEventArgs::default()
        };

        tree.on_query_continue_drag(root, &mut args);

        assert_eq!(args.action, DragAction::Cancel);
    }

    #[test]
    fn native_properties_follow_the_control() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let handle = tree.try_handle(root).unwrap();
        let region = Region::from_rect(Rect::new(0, 0, 20, 20));

        tree.set_allow_drop(root, true).unwrap();
        tree.set_clip_region(root, Some(region.clone())).unwrap();

        assert!(platform.allows_drop(handle));
        assert_eq!(platform.clip_region(handle), Some(region.clone()));

        tree.recreate_handle(root).unwrap();
        let recreated = tree.try_handle(root).unwrap();
        assert!(platform.allows_drop(recreated));
        assert_eq!(platform.clip_region(recreated), Some(region));
    }
}
