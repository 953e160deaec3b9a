/*
 * Drawing surfaces.
 *
 * `Graphics` is the surface handed to paint handlers. Every call is clipped to
 * the current clip rectangle and translated by the current origin, so a parent
 * can paint into a child's surface (transparent backgrounds) by shifting the
 * origin. `DisplayList` is the in-memory surface: it records clipped drawing
 * commands and doubles as the off-screen buffer of double-buffered controls.
 */
use crate::types::{Color, FontDescription, Point, Rect, Region, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        rect: Rect,
        color: Color,
    },
    DrawRect {
        rect: Rect,
        color: Color,
    },
    DrawText {
        text: String,
        at: Point,
        color: Color,
        font: FontDescription,
    },
}

impl DrawCommand {
    /// Pixel area the command touches, in surface coordinates.
    pub fn extent(&self) -> Rect {
        match self {
            DrawCommand::FillRect { rect, .. } | DrawCommand::DrawRect { rect, .. } => *rect,
            DrawCommand::DrawText { at, .. } => Rect::new(at.x, at.y, 1, 1),
        }
    }

    fn clipped_to(&self, clip: &Rect) -> Option<DrawCommand> {
        match self {
            DrawCommand::FillRect { rect, color } => rect.intersect(clip).map(|rect| {
                DrawCommand::FillRect {
                    rect,
                    color: *color,
                }
            }),
            DrawCommand::DrawRect { rect, color } => rect.intersect(clip).map(|_| {
                DrawCommand::DrawRect {
                    rect: *rect,
                    color: *color,
                }
            }),
            DrawCommand::DrawText { at, .. } => clip.contains(*at).then(|| self.clone()),
        }
    }
}

pub trait Graphics {
    fn size(&self) -> Size;
    fn clip(&self) -> Rect;
    fn set_clip(&mut self, clip: Rect);
    fn origin(&self) -> Point;
    fn set_origin(&mut self, origin: Point);

    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn draw_rect(&mut self, rect: Rect, color: Color);
    fn draw_text(&mut self, text: &str, at: Point, color: Color, font: &FontDescription);

    /// Copies the parts of `source` inside `region` onto this surface.
    fn blit(&mut self, source: &DisplayList, region: &Region);

    /// Recovers the recording surface, when the surface is one.
    fn into_display_list(self: Box<Self>) -> Option<DisplayList>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayList {
    size: Size,
    clip: Rect,
    origin: Point,
    commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            clip: Rect::from_size(size),
            origin: Point::default(),
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// The color a fill left at `at`, topmost command wins.
    pub fn color_at(&self, at: Point) -> Option<Color> {
        self.commands.iter().rev().find_map(|cmd| match cmd {
            DrawCommand::FillRect { rect, color } if rect.contains(at) => Some(*color),
            _ => None,
        })
    }

    fn effective_clip(&self) -> Rect {
        self.clip
            .intersect(&Rect::from_size(self.size))
            .unwrap_or_default()
    }

    fn push(&mut self, command: DrawCommand) {
        if let Some(clipped) = command.clipped_to(&self.effective_clip()) {
            self.commands.push(clipped);
        }
    }
}

impl Graphics for DisplayList {
    fn size(&self) -> Size {
        self.size
    }

    fn clip(&self) -> Rect {
        self.clip.offset(-self.origin.x, -self.origin.y)
    }

    fn set_clip(&mut self, clip: Rect) {
        self.clip = clip.offset(self.origin.x, self.origin.y);
    }

    fn origin(&self) -> Point {
        self.origin
    }

    fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rect = rect.offset(self.origin.x, self.origin.y);
        self.push(DrawCommand::FillRect { rect, color });
    }

    fn draw_rect(&mut self, rect: Rect, color: Color) {
        let rect = rect.offset(self.origin.x, self.origin.y);
        self.push(DrawCommand::DrawRect { rect, color });
    }

    fn draw_text(&mut self, text: &str, at: Point, color: Color, font: &FontDescription) {
        let at = at.offset(self.origin.x, self.origin.y);
        self.push(DrawCommand::DrawText {
            text: text.to_string(),
            at,
            color,
            font: font.clone(),
        });
    }

    fn blit(&mut self, source: &DisplayList, region: &Region) {
        for area in region.rects() {
            let target = area.offset(self.origin.x, self.origin.y);
            let Some(target) = target.intersect(&self.effective_clip()) else {
                continue;
            };
            for command in &source.commands {
                let shifted = match command {
                    DrawCommand::FillRect { rect, color } => DrawCommand::FillRect {
                        rect: rect.offset(self.origin.x, self.origin.y),
                        color: *color,
                    },
                    DrawCommand::DrawRect { rect, color } => DrawCommand::DrawRect {
                        rect: rect.offset(self.origin.x, self.origin.y),
                        color: *color,
                    },
                    DrawCommand::DrawText {
                        text,
                        at,
                        color,
                        font,
                    } => DrawCommand::DrawText {
                        text: text.clone(),
                        at: at.offset(self.origin.x, self.origin.y),
                        color: *color,
                        font: font.clone(),
                    },
                };
                if let Some(clipped) = shifted.clipped_to(&target) {
                    self.commands.push(clipped);
                }
            }
        }
    }

    fn into_display_list(self: Box<Self>) -> Option<DisplayList> {
        Some(*self)
    }
}
