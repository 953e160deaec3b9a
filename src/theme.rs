/*
 * Theme strategy consulted for default appearance. The core never interprets
 * visual styles itself; it asks the theme for defaults and lets it paint
 * backgrounds of controls that have no custom background.
 */
use crate::graphics::Graphics;
use crate::types::{Color, FontDescription, FontWeight, Rect};

pub trait Theme: Send + Sync {
    fn default_back_color(&self) -> Color;
    fn default_fore_color(&self) -> Color;
    fn default_font(&self) -> FontDescription;

    /// Whether off-screen buffering may be used with this theme at all.
    fn supports_double_buffering(&self) -> bool;

    fn paint_background(&self, graphics: &mut dyn Graphics, area: Rect, back_color: Color) {
        if back_color.a != 0 {
            graphics.fill_rect(area, back_color);
        }
    }
}

/*
 * The classic look: a light gray face, black text and the system UI font.
 */
#[derive(Debug, Clone)]
pub struct ClassicTheme {
    back_color: Color,
    fore_color: Color,
    font: FontDescription,
    double_buffering: bool,
}

impl ClassicTheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// A variant for surfaces (remote sessions, printers) that cannot buffer.
    pub fn without_double_buffering() -> Self {
        Self {
            double_buffering: false,
            ..Self::default()
        }
    }

    pub fn with_back_color(mut self, color: Color) -> Self {
        self.back_color = color;
        self
    }
}

impl Default for ClassicTheme {
    fn default() -> Self {
        Self {
            back_color: Color::rgb(0xF0, 0xF0, 0xF0),
            fore_color: Color::BLACK,
            font: FontDescription {
                name: Some("Segoe UI".to_string()),
                size: Some(9),
                weight: Some(FontWeight::Normal),
            },
            double_buffering: true,
        }
    }
}

impl Theme for ClassicTheme {
    fn default_back_color(&self) -> Color {
        self.back_color
    }

    fn default_fore_color(&self) -> Color {
        self.fore_color
    }

    fn default_font(&self) -> FontDescription {
        self.font.clone()
    }

    fn supports_double_buffering(&self) -> bool {
        self.double_buffering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::DisplayList;
    use crate::types::{Point, Size};

    #[test]
    fn transparent_backgrounds_paint_nothing() {
        let theme = ClassicTheme::new();
        let mut surface = DisplayList::new(Size::new(4, 4));
        theme.paint_background(&mut surface, Rect::new(0, 0, 4, 4), Color::TRANSPARENT);
        assert!(surface.commands().is_empty());

        theme.paint_background(&mut surface, Rect::new(0, 0, 4, 4), theme.default_back_color());
        assert_eq!(surface.color_at(Point::new(1, 1)), Some(theme.default_back_color()));
    }
}
