/*
 * Capabilities a concrete widget plugs into a control.
 *
 * A widget implements only what it needs and attaches it with
 * `ControlTree::set_painter`, `set_focus_behavior` or `set_container_behavior`.
 * Together with the `ControlStyles` flag-set these replace per-widget overrides
 * of the base control.
 */
use crate::graphics::Graphics;
use crate::types::{Color, ControlId, FontDescription, Keys, Rect};

/// What a painter may want to know about the control it paints.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintContext {
    pub control: ControlId,
    pub client: Rect,
    pub back_color: Color,
    pub fore_color: Color,
    pub font: FontDescription,
    pub text: String,
    pub enabled: bool,
    pub focused: bool,
    pub show_focus_cues: bool,
}

pub trait Paintable: Send {
    /// Foreground pass; runs after the `paint` event handlers.
    fn paint(&mut self, graphics: &mut dyn Graphics, clip: Rect, ctx: &PaintContext);

    /// Background pass. Returns `true` when the default background was replaced.
    fn paint_background(
        &mut self,
        _graphics: &mut dyn Graphics,
        _clip: Rect,
        _ctx: &PaintContext,
    ) -> bool {
        false
    }
}

pub trait Focusable: Send {
    /// Keys the control consumes itself instead of letting dialog navigation see them.
    fn is_input_key(&self, _key: Keys) -> bool {
        false
    }

    fn is_input_char(&self, _ch: char) -> bool {
        false
    }

    /// Extra veto on top of the visible/enabled/selectable checks.
    fn can_select(&self) -> bool {
        true
    }
}

pub trait Containerish: Send {
    /// Command keys (accelerators, shortcuts) offered before any other routing.
    fn process_cmd_key(&mut self, _key: Keys) -> bool {
        false
    }

    /// Dialog keys offered before the built-in Tab/arrow navigation.
    fn process_dialog_key(&mut self, _key: Keys) -> bool {
        false
    }

    fn on_control_removed(&mut self, _child: ControlId) {}
}
