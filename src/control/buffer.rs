/*
 * Per-control off-screen paint buffer.
 *
 * The buffer keeps its own invalid region, always contained in the client
 * rectangle. A paint cycle borrows the surface; a resize or style change that
 * arrives while it is borrowed only marks it for disposal, and the surface is
 * dropped when the borrow ends.
 */
use super::ControlTree;
use crate::graphics::DisplayList;
use crate::types::{ControlId, ControlStyles, Rect, Region, Size};

#[derive(Debug, Default)]
pub struct DoubleBuffer {
    surface: Option<DisplayList>,
    size: Size,
    invalid: Region,
    borrowed: bool,
    dispose_pending: bool,
}

impl DoubleBuffer {
    /// Adds `rect` to the invalid region, clipped to `client`.
    pub(crate) fn invalidate(&mut self, rect: Rect, client: Rect) {
        if rect.contains_rect(&client) {
            self.invalid = Region::from_rect(client);
            return;
        }
        if let Some(area) = rect.intersect(&client) {
            self.invalid.union_rect(area);
        }
    }

    /*
     * Borrows the surface for one paint cycle. A surface of the wrong size is
     * replaced, and a fresh surface has nothing valid in it.
     */
    pub(crate) fn acquire(&mut self, size: Size) -> DisplayList {
        self.borrowed = true;
        match self.surface.take() {
            Some(surface) if self.size == size => surface,
            _ => {
                log::trace!("[Paint] allocating {size:?} back buffer");
                self.size = size;
                self.invalid = Region::from_rect(Rect::from_size(size));
                DisplayList::new(size)
            }
        }
    }

    pub(crate) fn release(&mut self, surface: DisplayList) {
        self.borrowed = false;
        if std::mem::take(&mut self.dispose_pending) {
            self.drop_surface();
        } else {
            self.surface = Some(surface);
        }
    }

    pub(crate) fn discard(&mut self) {
        if self.borrowed {
            self.dispose_pending = true;
        } else {
            self.drop_surface();
        }
    }

    fn drop_surface(&mut self) {
        self.surface = None;
        self.size = Size::default();
        self.invalid.clear();
    }

    pub(crate) fn invalid_mut(&mut self) -> &mut Region {
        &mut self.invalid
    }

    pub fn invalid_region(&self) -> &Region {
        &self.invalid
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn is_borrowed(&self) -> bool {
        self.borrowed
    }
}

impl ControlTree {
    /// Whether paint cycles of `id` go through its back buffer.
    pub fn double_buffered(&self, id: ControlId) -> bool {
        let Some(data) = self.controls.get(&id) else {
            return false;
        };
        let requested = data
            .double_buffer_override
            .or(self.config.default_buffering)
            .unwrap_or_else(|| {
                data.styles
                    .intersects(ControlStyles::DOUBLE_BUFFER | ControlStyles::OPTIMIZED_DOUBLE_BUFFER)
            });
        requested && self.theme.supports_double_buffering()
    }

    /// Invalid region of the back buffer of `id`, in client coordinates.
    pub fn buffer_invalid_region(&self, id: ControlId) -> Option<Region> {
        self.controls
            .get(&id)
            .map(|d| d.buffer.invalid_region().clone())
    }
}
