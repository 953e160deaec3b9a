/*
 * Geometry, visibility and enabled state.
 *
 * `bounds` is the control's current window rectangle relative to its parent's
 * client area. `explicit_bounds` is the last rectangle requested from outside a
 * layout pass. Once a handle exists the platform is the source of truth: the
 * rectangle it reports back through the position-changed notification is what
 * ends up in `bounds`.
 */
use super::{ControlTree, CreationState};
use crate::error::{ControlError, Result};
use crate::layout::{AnchorInfo, LayoutItem};
use crate::types::{AnchorStyles, BorderStyle, ControlId, DockStyle, Padding, Point, Rect, Size};

impl ControlTree {
    pub fn bounds(&self, id: ControlId) -> Option<Rect> {
        self.controls.get(&id).map(|d| d.bounds)
    }

    pub fn explicit_bounds(&self, id: ControlId) -> Option<Rect> {
        self.controls.get(&id).map(|d| d.explicit_bounds)
    }

    /// Bounds after layout and native adjustment; defined only once created.
    pub fn effective_bounds(&self, id: ControlId) -> Option<Rect> {
        self.controls
            .get(&id)
            .filter(|d| d.creation == CreationState::Created)
            .map(|d| d.bounds)
    }

    pub fn set_bounds(&mut self, id: ControlId, bounds: Rect) -> Result<()> {
        self.check_thread(id)?;
        if bounds.width < 0 || bounds.height < 0 {
            return Err(ControlError::InvalidArgument(format!(
                "negative size in {bounds:?}"
            )));
        }
        let in_parent_layout = self
            .parent(id)
            .and_then(|p| self.controls.get(&p))
            .is_some_and(|p| p.layout.in_engine);
        let data = self.data_mut(id)?;
        if !in_parent_layout {
            data.explicit_bounds = bounds;
            data.anchor_stale = true;
        }
        if data.bounds == bounds {
            return Ok(());
        }

        match data.handle {
            Some(handle) => {
                if let Err(err) = self.platform.set_window_pos(handle, bounds) {
                    log::warn!("Handle: positioning {id:?} at {bounds:?} failed: {err}");
                    return Ok(());
                }
                self.dispatch_sent();
            }
            None => self.update_bounds(id, bounds)?,
        }
        Ok(())
    }

    pub fn set_location(&mut self, id: ControlId, location: Point) -> Result<()> {
        let current = self.data(id)?.bounds;
        self.set_bounds(
            id,
            Rect::new(location.x, location.y, current.width, current.height),
        )
    }

    pub fn set_size(&mut self, id: ControlId, size: Size) -> Result<()> {
        let current = self.data(id)?.bounds;
        self.set_bounds(id, Rect::new(current.x, current.y, size.width, size.height))
    }

    /*
     * Records a new current rectangle and fans out the consequences: buffer
     * discard, resize/move events and layout on the control and its parent.
     * While the control is being recreated only the rectangle is recorded.
     */
    pub(crate) fn update_bounds(&mut self, id: ControlId, bounds: Rect) -> Result<()> {
        let recreating = self.recreating.contains(&id);
        let data = self.data_mut(id)?;
        let old = data.bounds;
        if old == bounds {
            return Ok(());
        }
        data.bounds = bounds;
        if recreating {
            log::trace!("Handle: {id:?} reported {bounds:?} while recreating");
            return Ok(());
        }

        let resized = old.size() != bounds.size();
        let moved = old.location() != bounds.location();
        if resized {
            data.buffer.discard();
            self.raise(id, |e| &mut e.resize, &mut ());
            if self.get_style(id, crate::types::ControlStyles::RESIZE_REDRAW) {
                self.invalidate(id, None, false)?;
            }
            self.perform_layout(id, Some(id), Some("Bounds"))?;
        }
        if moved {
            self.raise(id, |e| &mut e.moved, &mut ());
        }
        if let Some(parent) = self.parent(id) {
            self.perform_layout(parent, Some(id), Some("Bounds"))?;
        }
        Ok(())
    }

    /// Width of the non-client chrome on each side.
    fn chrome(&self, id: ControlId) -> i32 {
        self.controls
            .get(&id)
            .map_or(0, |d| d.border_style.thickness())
    }

    pub fn client_size(&self, id: ControlId) -> Option<Size> {
        let bounds = self.bounds(id)?;
        let chrome = self.chrome(id);
        Some(Size::new(
            (bounds.width - 2 * chrome).max(0),
            (bounds.height - 2 * chrome).max(0),
        ))
    }

    pub fn client_rectangle(&self, id: ControlId) -> Option<Rect> {
        self.client_size(id).map(Rect::from_size)
    }

    /// Client rectangle minus padding; where layout places children.
    pub fn display_rectangle(&self, id: ControlId) -> Option<Rect> {
        let client = self.client_rectangle(id)?;
        let padding = self.controls.get(&id)?.padding;
        Some(padding.deflate(client))
    }

    /*
     * Window size needed for a client area of `client`. Soft failure: when the
     * platform cannot compute it the result is `Size::default()`.
     */
    pub fn size_from_client_size(&self, id: ControlId, client: Size) -> Size {
        let Ok(data) = self.data(id) else {
            return Size::default();
        };
        let (style, ex_style) = self.window_styles(data);
        match self.platform.adjust_window_rect(client, style, ex_style) {
            Ok(size) => size,
            Err(err) => {
                log::warn!("Handle: adjusting {client:?} for {id:?} failed: {err}");
                Size::default()
            }
        }
    }

    pub fn set_client_size(&mut self, id: ControlId, client: Size) -> Result<()> {
        let size = self.size_from_client_size(id, client);
        if size == Size::default() && client != Size::default() {
            log::warn!("Handle: client size {client:?} for {id:?} left unchanged");
            return Ok(());
        }
        self.set_size(id, size)
    }

    /// Converts a point in `id`'s client coordinates to screen coordinates.
    pub fn point_to_screen(&self, id: ControlId, point: Point) -> Option<Point> {
        let mut result = point;
        let mut current = Some(id);
        while let Some(c) = current {
            let data = self.controls.get(&c)?;
            let chrome = data.border_style.thickness();
            result = result.offset(data.bounds.x + chrome, data.bounds.y + chrome);
            current = data.parent;
        }
        Some(result)
    }

    pub fn point_to_client(&self, id: ControlId, point: Point) -> Option<Point> {
        let origin = self.point_to_screen(id, Point::default())?;
        Some(point.offset(-origin.x, -origin.y))
    }

    /// A rectangle in `from`'s client coordinates, expressed in `to`'s.
    pub(crate) fn translate_rect(&self, from: ControlId, to: ControlId, rect: Rect) -> Option<Rect> {
        let from_origin = self.point_to_screen(from, Point::default())?;
        let to_origin = self.point_to_screen(to, Point::default())?;
        Some(rect.offset(from_origin.x - to_origin.x, from_origin.y - to_origin.y))
    }

    pub fn dock(&self, id: ControlId) -> Option<DockStyle> {
        self.controls.get(&id).map(|d| d.dock)
    }

    pub fn set_dock(&mut self, id: ControlId, dock: DockStyle) -> Result<()> {
        let data = self.data_mut(id)?;
        if data.dock == dock {
            return Ok(());
        }
        data.dock = dock;
        if let Some(parent) = self.parent(id) {
            self.perform_layout(parent, Some(id), Some("Dock"))?;
        }
        Ok(())
    }

    pub fn anchor(&self, id: ControlId) -> Option<AnchorStyles> {
        self.controls.get(&id).map(|d| d.anchor)
    }

    pub fn set_anchor(&mut self, id: ControlId, anchor: AnchorStyles) -> Result<()> {
        let data = self.data_mut(id)?;
        if data.anchor == anchor && data.dock == DockStyle::None {
            return Ok(());
        }
        data.anchor = anchor;
        data.dock = DockStyle::None;
        self.update_anchor_info(id);
        if let Some(parent) = self.parent(id) {
            self.perform_layout(parent, Some(id), Some("Anchor"))?;
        }
        Ok(())
    }

    pub fn anchor_info(&self, id: ControlId) -> Option<AnchorInfo> {
        self.controls.get(&id).and_then(|d| d.anchor_info)
    }

    pub fn set_margin(&mut self, id: ControlId, margin: Padding) -> Result<()> {
        self.data_mut(id)?.margin = margin;
        if let Some(parent) = self.parent(id) {
            self.perform_layout(parent, Some(id), Some("Margin"))?;
        }
        Ok(())
    }

    pub fn set_padding(&mut self, id: ControlId, padding: Padding) -> Result<()> {
        self.data_mut(id)?.padding = padding;
        self.perform_layout(id, Some(id), Some("Padding"))
    }

    pub(crate) fn layout_item(&self, id: ControlId) -> Option<LayoutItem> {
        let data = self.controls.get(&id)?;
        Some(LayoutItem {
            id,
            dock: data.dock,
            anchor: data.anchor,
            bounds: data.bounds,
            margin: data.margin,
            anchor_info: data.anchor_info,
        })
    }

    pub fn border_style(&self, id: ControlId) -> Option<BorderStyle> {
        self.controls.get(&id).map(|d| d.border_style)
    }

    /// Changing the border needs different creation flags, so the handle is recreated.
    pub fn set_border_style(&mut self, id: ControlId, border_style: BorderStyle) -> Result<()> {
        self.check_thread(id)?;
        let data = self.data_mut(id)?;
        if data.border_style == border_style {
            return Ok(());
        }
        data.border_style = border_style;
        self.recreate_handle(id)?;
        self.perform_layout(id, Some(id), Some("BorderStyle"))
    }

    /// The control's own visibility flag.
    pub fn is_visible(&self, id: ControlId) -> bool {
        self.controls.get(&id).is_some_and(|d| d.visible)
    }

    /// Visible itself and through every ancestor.
    pub fn is_shown(&self, id: ControlId) -> bool {
        self.is_visible(id) && self.ancestors(id).iter().all(|a| self.is_visible(*a))
    }

    pub fn show(&mut self, id: ControlId) -> Result<()> {
        self.set_visible(id, true)
    }

    pub fn hide(&mut self, id: ControlId) -> Result<()> {
        self.set_visible(id, false)
    }

    pub fn set_visible(&mut self, id: ControlId, visible: bool) -> Result<()> {
        self.check_thread(id)?;
        let data = self.data_mut(id)?;
        if data.visible == visible {
            return Ok(());
        }
        data.visible = visible;
        let handle = data.handle;
        let creation = data.creation;
        let parent = data.parent;

        if visible && creation == CreationState::NotCreated {
            let parent_ready = match parent {
                Some(p) => {
                    self.controls
                        .get(&p)
                        .is_some_and(|pd| pd.creation == CreationState::Created)
                        && self.is_shown(p)
                }
                None => true,
            };
            if parent_ready {
                self.create_control(id)?;
            }
        }
        if let Some(handle) = handle {
            if let Err(err) = self.platform.show_window(handle, visible) {
                log::warn!("Handle: show({visible}) on {id:?} failed: {err}");
            }
            self.dispatch_sent();
        }

        self.raise(id, |e| &mut e.visible_changed, &mut ());
        let event = if visible {
            crate::accessibility::AccessibleEvent::Show
        } else {
            crate::accessibility::AccessibleEvent::Hide
        };
        self.accessibility_notify_clients(id, event, -1);
        if !visible {
            self.select_next_if_focused(id)?;
        }
        if let Some(parent) = parent {
            self.perform_layout(parent, Some(id), Some("Visible"))?;
        }
        Ok(())
    }

    /// The control's own enabled flag.
    pub fn is_enabled(&self, id: ControlId) -> bool {
        self.controls.get(&id).is_some_and(|d| d.enabled)
    }

    /// Enabled itself and through every ancestor.
    pub fn is_enabled_effectively(&self, id: ControlId) -> bool {
        self.is_enabled(id) && self.ancestors(id).iter().all(|a| self.is_enabled(*a))
    }

    pub fn set_enabled(&mut self, id: ControlId, enabled: bool) -> Result<()> {
        self.check_thread(id)?;
        let data = self.data_mut(id)?;
        if data.enabled == enabled {
            return Ok(());
        }
        data.enabled = enabled;
        if let Some(handle) = data.handle
            && let Err(err) = self.platform.enable_window(handle, enabled)
        {
            log::warn!("Handle: enable({enabled}) on {id:?} failed: {err}");
        }

        // Descendants that are enabled themselves change effective state too.
        let affected: Vec<ControlId> = self
            .subtree(id)
            .into_iter()
            .filter(|c| *c == id || self.is_enabled(*c))
            .collect();
        for control in affected {
            self.raise(control, |e| &mut e.enabled_changed, &mut ());
        }
        self.invalidate(id, None, true)?;
        if !enabled {
            self.select_next_if_focused(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::control::test_support::*;
    use crate::types::{BorderStyle, Point, Rect, Size};

    #[test]
    fn effective_bounds_exist_only_once_created() {
        // Arrange
        let (mut tree, _platform) = tree();
        let root = tree.new_top_level("root");
        tree.set_bounds(root, Rect::new(0, 0, 100, 50)).unwrap();

        // Act / Assert
        assert_eq!(tree.effective_bounds(root), None);
        tree.create_control(root).unwrap();
        assert_eq!(tree.effective_bounds(root), Some(Rect::new(0, 0, 100, 50)));
    }

    #[test]
    fn platform_reported_rect_wins_once_a_handle_exists() {
        let (mut tree, platform) = tree();
        platform.set_minimum_size(Size::new(40, 40));
        let root = tree.new_top_level("root");
        tree.set_bounds(root, Rect::new(0, 0, 10, 10)).unwrap();

        tree.create_control(root).unwrap();

        assert_eq!(tree.bounds(root), Some(Rect::new(0, 0, 40, 40)));
        assert_eq!(tree.explicit_bounds(root), Some(Rect::new(0, 0, 10, 10)));
    }

    #[test]
    fn client_area_excludes_the_border() {
        let (mut tree, _platform) = tree();
        let control = tree.new_control("c");
        tree.set_bounds(control, Rect::new(5, 5, 20, 10)).unwrap();
        tree.set_border_style(control, BorderStyle::Fixed3D).unwrap();

        assert_eq!(tree.client_size(control), Some(Size::new(16, 6)));
    }

    #[test]
    fn point_conversion_walks_parent_offsets() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(100, 100, 300, 300));
        let child = tree.new_control("child");
        tree.set_bounds(child, Rect::new(10, 20, 50, 50)).unwrap();
        tree.add(root, child).unwrap();

        let screen = tree.point_to_screen(child, Point::new(1, 1)).unwrap();

        assert_eq!(screen, Point::new(111, 121));
        assert_eq!(tree.point_to_client(child, screen), Some(Point::new(1, 1)));
    }

    #[test]
    fn failed_geometry_adjustment_yields_an_empty_size() {
        let (mut tree, platform) = tree();
        let control = tree.new_control("c");
        tree.set_bounds(control, Rect::new(0, 0, 30, 30)).unwrap();
        platform.fail_adjust_window_rect(true);

        assert_eq!(tree.size_from_client_size(control, Size::new(10, 10)), Size::default());
        tree.set_client_size(control, Size::new(10, 10)).unwrap();
        assert_eq!(tree.bounds(control), Some(Rect::new(0, 0, 30, 30)));
    }

    #[test]
    fn resize_raises_resize_and_discards_the_buffer() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let resized = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&resized);
        tree.events_mut(root).unwrap().resize.add(move |_, _, _| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        tree.set_size(root, Size::new(120, 100)).unwrap();
        tree.set_location(root, Point::new(5, 5)).unwrap();

        assert_eq!(resized.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(tree.bounds(root), Some(Rect::new(5, 5, 120, 100)));
    }
}
