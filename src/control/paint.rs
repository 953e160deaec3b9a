/*
 * Invalidation and the paint cycle.
 *
 * A paint cycle paints the background (unless the control is opaque), then
 * raises `paint` and runs the control's painter. Controls with a transparent
 * back color first get their parent's paint translated into their own
 * coordinates. Double-buffered controls paint only the invalid part of their
 * back buffer and copy the exposed area from it.
 */
use super::{ControlTree, PaintContext};
use crate::error::Result;
use crate::events::PaintEventArgs;
use crate::graphics::{DisplayList, Graphics};
use crate::platform::NativeHandle;
use crate::types::{ControlId, ControlStyles, Rect, Region, UiState};

impl ControlTree {
    /*
     * Marks `rect` (client coordinates, `None` for the whole client area) for
     * repaint. Children overlapping it are invalidated too when
     * `invalidate_children` is set, and always when they are see-through.
     */
    pub fn invalidate(
        &mut self,
        id: ControlId,
        rect: Option<Rect>,
        invalidate_children: bool,
    ) -> Result<()> {
        self.check_thread(id)?;
        let Some(handle) = self.data(id)?.handle else {
            return Ok(());
        };
        let Some(client) = self.client_rectangle(id) else {
            return Ok(());
        };
        let rect = rect.unwrap_or(client);
        if rect.area() <= 0 {
            return Ok(());
        }

        if self.double_buffered(id)
            && let Some(data) = self.controls.get_mut(&id)
        {
            data.buffer.invalidate(rect, client);
        }
        if let Err(err) = self.platform.invalidate(handle, rect) {
            log::warn!("[Paint] invalidating {rect:?} on {id:?} failed: {err}");
        }

        for child in self.all_controls(id) {
            let Some(child_bounds) = self.bounds(child) else {
                continue;
            };
            if rect.intersect(&child_bounds).is_none() {
                continue;
            }
            if !invalidate_children && self.back_color(child).is_opaque() {
                continue;
            }
            let Some(local) = self
                .translate_rect(id, child, rect)
                .and_then(|r| self.client_rectangle(child).and_then(|c| r.intersect(&c)))
            else {
                continue;
            };
            self.invalidate(child, Some(local), invalidate_children)?;
        }
        Ok(())
    }

    /// Paints the invalid area of `id` right away instead of waiting for the queue.
    pub fn update(&mut self, id: ControlId) -> Result<()> {
        self.check_thread(id)?;
        let Some(handle) = self.data(id)?.handle else {
            return Ok(());
        };
        if let Err(err) = self.platform.update(handle) {
            log::warn!("[Paint] update of {id:?} failed: {err}");
        }
        self.dispatch_sent();
        Ok(())
    }

    pub fn refresh(&mut self, id: ControlId) -> Result<()> {
        self.invalidate(id, None, true)?;
        self.update(id)
    }

    pub(crate) fn paint_context(&self, id: ControlId) -> PaintContext {
        let data = self.controls.get(&id);
        PaintContext {
            control: id,
            client: self.client_rectangle(id).unwrap_or_default(),
            back_color: self.back_color(id),
            fore_color: self.fore_color(id),
            font: self.font(id),
            text: data.map(|d| d.text.clone()).unwrap_or_default(),
            enabled: self.is_enabled_effectively(id),
            focused: self.focused == Some(id),
            show_focus_cues: data.is_some_and(|d| !d.ui_state.contains(UiState::HIDE_FOCUS)),
        }
    }

    pub(crate) fn wm_paint(&mut self, id: ControlId, handle: NativeHandle) {
        let (graphics, clip) = match self.platform.begin_paint(handle) {
            Ok(started) => started,
            Err(err) => {
                log::warn!("[Paint] begin_paint on {id:?} failed: {err}");
                return;
            }
        };
        let graphics = if clip.is_empty() {
            graphics
        } else if self.double_buffered(id) {
            self.paint_buffered(id, graphics, clip)
        } else {
            log::trace!("[Paint] {id:?} painting {clip:?} directly");
            self.paint_into(id, graphics, clip)
        };
        if let Err(err) = self.platform.end_paint(handle, graphics) {
            log::warn!("[Paint] end_paint on {id:?} failed: {err}");
        }
    }

    fn paint_buffered(
        &mut self,
        id: ControlId,
        mut target: Box<dyn Graphics>,
        clip: Rect,
    ) -> Box<dyn Graphics> {
        let size = self.client_size(id).unwrap_or_default().at_least_one();
        let client = Rect::from_size(size);
        let Some(data) = self.controls.get_mut(&id) else {
            return target;
        };
        let mut surface = data.buffer.acquire(size);
        let repaint = data.buffer.invalid_region().intersect_rect(&clip);

        if !repaint.is_empty() {
            let area = repaint.bounds();
            log::trace!("[Paint] {id:?} repainting {area:?} of its back buffer");
            if area.contains_rect(&client) {
                surface.clear();
            }
            surface.set_clip(area);
            let painted = self.paint_into(id, Box::new(surface), area);
            surface = painted
                .into_display_list()
                .unwrap_or_else(|| DisplayList::new(size));
            surface.set_clip(client);
        }

        target.blit(&surface, &Region::from_rect(clip));
        if let Some(data) = self.controls.get_mut(&id) {
            data.buffer.invalid_mut().exclude_region(&repaint);
            data.buffer.release(surface);
        }
        target
    }

    /// One complete paint of `id` onto `graphics`, limited to `clip`.
    pub(crate) fn paint_into(
        &mut self,
        id: ControlId,
        mut graphics: Box<dyn Graphics>,
        clip: Rect,
    ) -> Box<dyn Graphics> {
        let ctx = self.paint_context(id);
        if !self.get_style(id, ControlStyles::OPAQUE) {
            graphics = self.paint_background(id, graphics, clip, &ctx);
        }

        let mut args = PaintEventArgs { graphics, clip };
        self.raise(id, |e| &mut e.paint, &mut args);
        let mut graphics = args.graphics;
        if let Some(painter) = self.controls.get_mut(&id).and_then(|d| d.painter.as_mut()) {
            painter.paint(graphics.as_mut(), clip, &ctx);
        }
        graphics
    }

    fn paint_background(
        &mut self,
        id: ControlId,
        mut graphics: Box<dyn Graphics>,
        clip: Rect,
        ctx: &PaintContext,
    ) -> Box<dyn Graphics> {
        if !ctx.back_color.is_opaque()
            && let Some(parent) = self.parent(id)
        {
            graphics = self.paint_parent_through(id, parent, graphics, clip);
        }

        let replaced = self
            .controls
            .get_mut(&id)
            .and_then(|d| d.painter.as_mut())
            .is_some_and(|painter| painter.paint_background(graphics.as_mut(), clip, ctx));
        if !replaced {
            self.theme
                .paint_background(graphics.as_mut(), clip, ctx.back_color);
        }

        let mut args = PaintEventArgs { graphics, clip };
        self.raise(id, |e| &mut e.paint_background, &mut args);
        args.graphics
    }

    /// Paints `parent` under `id`'s client area, shifted into `id`'s coordinates.
    fn paint_parent_through(
        &mut self,
        id: ControlId,
        parent: ControlId,
        mut graphics: Box<dyn Graphics>,
        clip: Rect,
    ) -> Box<dyn Graphics> {
        let Some(offset) = self
            .translate_rect(id, parent, Rect::default())
            .map(|r| r.location())
        else {
            return graphics;
        };
        let saved_origin = graphics.origin();
        let saved_clip = graphics.clip();
        let parent_clip = clip.offset(offset.x, offset.y);

        graphics.set_origin(saved_origin.offset(-offset.x, -offset.y));
        graphics.set_clip(parent_clip);
        let mut graphics = self.paint_into(parent, graphics, parent_clip);
        graphics.set_origin(saved_origin);
        graphics.set_clip(saved_clip);
        graphics
    }

    /*
     * Background erasure is left to the paint cycle for buffered controls and
     * controls that paint everything in it; returns whether it was handled.
     */
    pub(crate) fn suppresses_erase_background(&self, id: ControlId) -> bool {
        self.double_buffered(id) || self.get_style(id, ControlStyles::ALL_PAINTING_IN_WM_PAINT)
    }
}

#[cfg(test)]
mod tests {
    use crate::control::test_support::*;
    use crate::control::{PaintContext, Paintable};
    use crate::graphics::Graphics;
    use crate::types::{Color, ControlStyles, Point, Rect};

    struct Fill(Color);

    impl Paintable for Fill {
        fn paint(&mut self, graphics: &mut dyn Graphics, clip: Rect, _ctx: &PaintContext) {
            graphics.fill_rect(clip, self.0);
        }
    }

    #[test]
    fn pump_paints_background_then_painter() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 40, 40));
        tree.set_back_color(root, Some(Color::rgb(10, 20, 30))).unwrap();
        let handle = tree.try_handle(root).unwrap();

        // Act
        tree.pump();

        // Assert
        let painted = platform.painted(handle);
        let last = painted.last().unwrap();
        assert_eq!(last.color_at(Point::new(5, 5)), Some(Color::rgb(10, 20, 30)));
        assert!(platform.invalid_region(handle).is_empty());
    }

    #[test]
    fn transparent_child_shows_the_parent_background() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        tree.set_back_color(root, Some(Color::rgb(200, 0, 0))).unwrap();
        let child = tree.new_control("glass");
        tree.set_style(child, ControlStyles::SUPPORTS_TRANSPARENT_BACK_COLOR, true)
            .unwrap();
        tree.set_back_color(child, Some(Color::TRANSPARENT)).unwrap();
        tree.set_bounds(child, Rect::new(10, 10, 20, 20)).unwrap();
        tree.add(root, child).unwrap();
        let handle = tree.try_handle(child).unwrap();

        tree.pump();

        let last = platform.painted(handle).pop().unwrap();
        assert_eq!(last.color_at(Point::new(1, 1)), Some(Color::rgb(200, 0, 0)));
    }

    #[test]
    fn invalidating_without_children_still_reaches_see_through_children() {
        // Arrange
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 100, 100));
        let glass = tree.new_control("glass");
        tree.set_style(glass, ControlStyles::SUPPORTS_TRANSPARENT_BACK_COLOR, true)
            .unwrap();
        tree.set_back_color(glass, Some(Color::TRANSPARENT)).unwrap();
        tree.set_bounds(glass, Rect::new(10, 10, 20, 20)).unwrap();
        let solid = tree.new_control("solid");
        tree.set_back_color(solid, Some(Color::WHITE)).unwrap();
        tree.set_bounds(solid, Rect::new(40, 10, 20, 20)).unwrap();
        tree.add(root, glass).unwrap();
        tree.add(root, solid).unwrap();
        let glass_handle = tree.try_handle(glass).unwrap();
        let solid_handle = tree.try_handle(solid).unwrap();
        tree.pump();

        // Act
        tree.invalidate(root, Some(Rect::new(0, 0, 80, 40)), false).unwrap();

        // Assert
        assert!(!platform.invalid_region(glass_handle).is_empty());
        assert!(platform.invalid_region(solid_handle).is_empty());
    }

    #[test]
    fn double_buffered_paint_consumes_the_buffer_invalid_region() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 60, 60));
        tree.set_double_buffered(root, Some(true)).unwrap();
        tree.set_painter(root, Fill(Color::WHITE)).unwrap();
        let handle = tree.try_handle(root).unwrap();
        tree.pump();

        tree.invalidate(root, Some(Rect::new(50, 50, 40, 40)), false).unwrap();
        let pending = tree.buffer_invalid_region(root).unwrap();
        assert!(pending.is_within(&Rect::new(0, 0, 60, 60)));
        assert_eq!(pending.area(), 100);
        tree.update(root).unwrap();

        assert!(tree.buffer_invalid_region(root).unwrap().is_empty());
        let last = platform.painted(handle).pop().unwrap();
        assert_eq!(last.color_at(Point::new(55, 55)), Some(Color::WHITE));
    }

    #[test]
    fn opaque_controls_skip_the_background() {
        let (mut tree, platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 30, 30));
        tree.set_style(root, ControlStyles::OPAQUE, true).unwrap();
        let handle = tree.try_handle(root).unwrap();

        tree.refresh(root).unwrap();

        let last = platform.painted(handle).pop().unwrap();
        assert!(last.commands().is_empty());
    }
}
