/*
 * Layout suspension and the layout pass.
 *
 * `suspend_layout` / `resume_layout` nest. While a control is suspended a
 * layout request only marks it pending; the final resume runs one pass if
 * anything is pending. A pass raises the `layout` event and then hands the
 * container to its engine.
 */
use super::ControlTree;
use crate::error::{ControlError, Result};
use crate::events::LayoutEventArgs;
use crate::layout::{AnchorInfo, LayoutEngine};
use crate::types::{ControlId, DockStyle};
use std::sync::Arc;

impl ControlTree {
    pub fn suspend_layout(&mut self, id: ControlId) -> Result<()> {
        let data = self.data_mut(id)?;
        data.layout.suspend_count += 1;
        log::trace!("Layout: {id:?} suspended (depth {})", data.layout.suspend_count);
        Ok(())
    }

    /*
     * Balances one `suspend_layout`. At depth zero a pending request is run
     * when `perform` is set; otherwise only the anchor distances are refreshed
     * and the request stays pending.
     */
    pub fn resume_layout(&mut self, id: ControlId, perform: bool) -> Result<()> {
        let data = self.data_mut(id)?;
        if data.layout.suspend_count == 0 {
            return Err(ControlError::InvalidOperation(format!(
                "resume_layout on {id:?} without a matching suspend_layout"
            )));
        }
        data.layout.suspend_count -= 1;
        if data.layout.suspend_count > 0 {
            return Ok(());
        }
        if perform && data.layout.pending {
            return self.perform_layout(id, None, None);
        }
        for child in self.all_controls(id) {
            self.refresh_anchor_info(child);
        }
        Ok(())
    }

    pub fn layout_suspended(&self, id: ControlId) -> bool {
        self.controls
            .get(&id)
            .is_some_and(|d| d.layout.suspend_count > 0)
    }

    pub fn layout_pending(&self, id: ControlId) -> bool {
        self.controls.get(&id).is_some_and(|d| d.layout.pending)
    }

    /// Runs a layout pass on `id` now, or marks it pending while suspended or recreating.
    pub fn perform_layout(
        &mut self,
        id: ControlId,
        affected_control: Option<ControlId>,
        affected_property: Option<&str>,
    ) -> Result<()> {
        self.check_thread(id)?;
        let recreating = self.recreating.contains(&id);
        let default_engine = Arc::clone(&self.default_layout);
        let data = self.data_mut(id)?;
        if recreating || data.layout.suspend_count > 0 {
            data.layout.pending = true;
            return Ok(());
        }
        // Requests raised by the pass itself only mark it pending.
        data.layout.suspend_count += 1;
        data.layout.in_engine = true;
        let engine: Arc<dyn LayoutEngine> = data
            .layout_engine
            .clone()
            .unwrap_or(default_engine);

        for child in self.all_controls(id) {
            self.refresh_anchor_info(child);
        }
        let mut args = LayoutEventArgs::new(affected_control, affected_property);
        self.raise(id, |e| &mut e.layout, &mut args);
        if self.exists(id) {
            engine.layout(self, id, &args);
        }

        if let Some(data) = self.controls.get_mut(&id) {
            data.layout.suspend_count -= 1;
            data.layout.in_engine = false;
            data.layout.pending = false;
        }
        Ok(())
    }

    /// Replaces the engine used for `id`'s children; `None` restores the default.
    pub fn set_layout_engine(
        &mut self,
        id: ControlId,
        engine: Option<Arc<dyn LayoutEngine>>,
    ) -> Result<()> {
        self.data_mut(id)?.layout_engine = engine;
        self.perform_layout(id, Some(id), Some("LayoutEngine"))
    }

    fn refresh_anchor_info(&mut self, id: ControlId) {
        if self.controls.get(&id).is_some_and(|d| d.anchor_stale) {
            self.update_anchor_info(id);
        }
    }

    /// Caches `id`'s distances to its parent's display rectangle edges.
    pub(crate) fn update_anchor_info(&mut self, id: ControlId) {
        let display = self.parent(id).and_then(|p| self.display_rectangle(p));
        let Some(data) = self.controls.get_mut(&id) else {
            return;
        };
        match display {
            Some(display) if data.dock == DockStyle::None => {
                data.anchor_info = Some(AnchorInfo::measure(data.explicit_bounds, display));
                data.anchor_stale = false;
            }
            _ => data.anchor_info = None,
        }
    }
}
