/*
 * Platform-agnostic value types shared by every part of the control core:
 * identifiers, geometry (points, sizes, rectangles, regions), colors and fonts,
 * docking/anchoring descriptors, input descriptors and the style flag-set.
 */
use bitflags::bitflags;

/*
 * Stable arena key of a control. Ids are handed out by the owning
 * `ControlTree` and never reused, so a stale id resolves to "disposed"
 * instead of aliasing a newer control.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub(crate) u32);

impl ControlId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Clamps both dimensions to at least one pixel.
    pub fn at_least_one(self) -> Self {
        Self {
            width: self.width.max(1),
            height: self.height.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn location(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub const fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub const fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub const fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let rect = Rect::from_ltrb(left, top, right, bottom);
        (!rect.is_empty()).then_some(rect)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::from_ltrb(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub const fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub const fn inflate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + 2 * dx,
            self.height + 2 * dy,
        )
    }

    /*
     * Returns the parts of `self` not covered by `hole`, as at most four
     * non-overlapping bands (top, bottom, left, right).
     */
    pub fn subtract(&self, hole: &Rect) -> Vec<Rect> {
        let Some(cut) = self.intersect(hole) else {
            return if self.is_empty() { Vec::new() } else { vec![*self] };
        };
        let mut pieces = Vec::with_capacity(4);
        if cut.y > self.y {
            pieces.push(Rect::from_ltrb(self.x, self.y, self.right(), cut.y));
        }
        if cut.bottom() < self.bottom() {
            pieces.push(Rect::from_ltrb(
                self.x,
                cut.bottom(),
                self.right(),
                self.bottom(),
            ));
        }
        if cut.x > self.x {
            pieces.push(Rect::from_ltrb(self.x, cut.y, cut.x, cut.bottom()));
        }
        if cut.right() < self.right() {
            pieces.push(Rect::from_ltrb(
                cut.right(),
                cut.y,
                self.right(),
                cut.bottom(),
            ));
        }
        pieces
    }
}

/// Space kept around (margin) or inside (padding) a control, per edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Padding {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Padding {
    pub const fn all(value: i32) -> Self {
        Self {
            left: value,
            top: value,
            right: value,
            bottom: value,
        }
    }

    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Shrinks `rect` by this padding, never below zero size.
    pub fn deflate(&self, rect: Rect) -> Rect {
        Rect::new(
            rect.x + self.left,
            rect.y + self.top,
            (rect.width - self.left - self.right).max(0),
            (rect.height - self.top - self.bottom).max(0),
        )
    }
}

/*
 * A set of pixels stored as non-overlapping rectangles. Used for the
 * invalid (dirty) region of off-screen buffers and native windows.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.union_rect(rect);
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn area(&self) -> i64 {
        self.rects.iter().map(Rect::area).sum()
    }

    pub fn bounds(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::default(), |acc, rect| acc.union(rect))
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn union_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut pending = vec![rect];
        for existing in &self.rects {
            pending = pending
                .iter()
                .flat_map(|piece| piece.subtract(existing))
                .collect();
            if pending.is_empty() {
                return;
            }
        }
        self.rects.extend(pending);
    }

    pub fn exclude_rect(&mut self, hole: &Rect) {
        self.rects = self
            .rects
            .iter()
            .flat_map(|rect| rect.subtract(hole))
            .collect();
    }

    pub fn exclude_region(&mut self, other: &Region) {
        for hole in &other.rects {
            self.exclude_rect(hole);
        }
    }

    pub fn intersect_rect(&self, clip: &Rect) -> Region {
        Region {
            rects: self
                .rects
                .iter()
                .filter_map(|rect| rect.intersect(clip))
                .collect(),
        }
    }

    pub fn is_within(&self, outer: &Rect) -> bool {
        self.rects.iter().all(|rect| outer.contains_rect(rect))
    }

    pub fn intersects(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|r| r.intersect(rect).is_some())
    }
}

/*
 * A platform-agnostic representation of an RGBA color. An alpha below 255
 * marks a background that does not fully cover what lies underneath.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn is_opaque(&self) -> bool {
        self.a == 0xFF
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/*
 * Describes a font in a platform-agnostic way. All fields are optional so
 * a control can override only parts of the theme's default font.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontDescription {
    pub name: Option<String>,
    pub size: Option<i32>,
    pub weight: Option<FontWeight>,
}

/// How a control docks within its parent's client area.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DockStyle {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    Fill,
    ProportionalFill {
        weight: f32,
    },
}

bitflags! {
    /// Edges of the parent a control keeps a fixed distance to during layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AnchorStyles: u8 {
        const TOP = 0b0001;
        const BOTTOM = 0b0010;
        const LEFT = 0b0100;
        const RIGHT = 0b1000;
    }
}

impl Default for AnchorStyles {
    fn default() -> Self {
        AnchorStyles::TOP | AnchorStyles::LEFT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderStyle {
    #[default]
    None,
    FixedSingle,
    Fixed3D,
}

impl BorderStyle {
    /// Width of the non-client chrome on each side.
    pub const fn thickness(self) -> i32 {
        match self {
            BorderStyle::None => 0,
            BorderStyle::FixedSingle => 1,
            BorderStyle::Fixed3D => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cursor {
    #[default]
    Default,
    Arrow,
    IBeam,
    Hand,
    Wait,
    Cross,
    SizeWE,
    SizeNS,
    No,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        const LEFT = 0b0000_0001;
        const RIGHT = 0b0000_0010;
        const MIDDLE = 0b0000_0100;
        const X_BUTTON1 = 0b0000_1000;
        const X_BUTTON2 = 0b0001_0000;
    }
}

/*
 * A virtual key code in the low 16 bits combined with modifier bits, the
 * same packing native keyboard messages use.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keys(pub u32);

impl Keys {
    pub const NONE: Keys = Keys(0);
    pub const BACK: Keys = Keys(0x08);
    pub const TAB: Keys = Keys(0x09);
    pub const RETURN: Keys = Keys(0x0D);
    pub const ESCAPE: Keys = Keys(0x1B);
    pub const SPACE: Keys = Keys(0x20);
    pub const LEFT: Keys = Keys(0x25);
    pub const UP: Keys = Keys(0x26);
    pub const RIGHT: Keys = Keys(0x27);
    pub const DOWN: Keys = Keys(0x28);
    pub const F1: Keys = Keys(0x70);

    pub const SHIFT: Keys = Keys(0x0001_0000);
    pub const CONTROL: Keys = Keys(0x0002_0000);
    pub const ALT: Keys = Keys(0x0004_0000);

    const KEY_CODE_MASK: u32 = 0x0000_FFFF;
    const MODIFIERS_MASK: u32 = 0xFFFF_0000;

    pub const fn key_code(self) -> Keys {
        Keys(self.0 & Self::KEY_CODE_MASK)
    }

    pub const fn modifiers(self) -> Keys {
        Keys(self.0 & Self::MODIFIERS_MASK)
    }

    pub const fn with(self, modifiers: Keys) -> Keys {
        Keys(self.0 | (modifiers.0 & Self::MODIFIERS_MASK))
    }

    pub const fn has(self, modifier: Keys) -> bool {
        self.0 & modifier.0 == modifier.0
    }
}

bitflags! {
    /// Keyboard cue visibility shared down a window hierarchy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UiState: u16 {
        const HIDE_FOCUS = 0x1;
        const HIDE_ACCEL = 0x2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DragDropEffects: u32 {
        const COPY = 0x1;
        const MOVE = 0x2;
        const LINK = 0x4;
        const SCROLL = 0x8000_0000;
    }
}

bitflags! {
    /*
     * Capability toggles of a control. Concrete widgets compose the set they
     * need instead of overriding boolean properties.
     */
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlStyles: u32 {
        const CONTAINER_CONTROL = 0x0000_0001;
        const USER_PAINT = 0x0000_0002;
        const OPAQUE = 0x0000_0004;
        const RESIZE_REDRAW = 0x0000_0010;
        const FIXED_WIDTH = 0x0000_0020;
        const FIXED_HEIGHT = 0x0000_0040;
        const STANDARD_CLICK = 0x0000_0100;
        const SELECTABLE = 0x0000_0200;
        const USER_MOUSE = 0x0000_0400;
        const SUPPORTS_TRANSPARENT_BACK_COLOR = 0x0000_0800;
        const STANDARD_DOUBLE_CLICK = 0x0000_1000;
        const ALL_PAINTING_IN_WM_PAINT = 0x0000_2000;
        const CACHE_TEXT = 0x0000_4000;
        const ENABLE_NOTIFY_MESSAGE = 0x0000_8000;
        const DOUBLE_BUFFER = 0x0001_0000;
        const OPTIMIZED_DOUBLE_BUFFER = 0x0002_0000;
        const USE_TEXT_FOR_ACCESSIBILITY = 0x0004_0000;
    }
}

impl Default for ControlStyles {
    fn default() -> Self {
        ControlStyles::USER_PAINT
            | ControlStyles::STANDARD_CLICK
            | ControlStyles::STANDARD_DOUBLE_CLICK
            | ControlStyles::SELECTABLE
            | ControlStyles::ALL_PAINTING_IN_WM_PAINT
            | ControlStyles::USE_TEXT_FOR_ACCESSIBILITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtract_produces_non_overlapping_bands() {
        let outer = Rect::new(0, 0, 10, 10);
        let pieces = outer.subtract(&Rect::new(2, 2, 4, 4));
        let total: i64 = pieces.iter().map(Rect::area).sum();
        assert_eq!(total, 100 - 16);
        for (i, a) in pieces.iter().enumerate() {
            for b in pieces.iter().skip(i + 1) {
                assert!(a.intersect(b).is_none(), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn region_union_does_not_double_count_overlap() {
        let mut region = Region::from_rect(Rect::new(0, 0, 10, 10));
        region.union_rect(Rect::new(5, 5, 10, 10));
        assert_eq!(region.area(), 100 + 100 - 25);
        assert_eq!(region.bounds(), Rect::new(0, 0, 15, 15));
    }

    #[test]
    fn region_exclude_shrinks_to_nothing_when_fully_covered() {
        let mut region = Region::from_rect(Rect::new(1, 1, 4, 4));
        region.union_rect(Rect::new(3, 3, 2, 2));
        region.exclude_rect(&Rect::new(0, 0, 10, 10));
        assert!(region.is_empty());
    }

    #[test]
    fn keys_split_code_and_modifiers() {
        let key = Keys::TAB.with(Keys::SHIFT);
        assert_eq!(key.key_code(), Keys::TAB);
        assert!(key.has(Keys::SHIFT));
        assert!(!key.has(Keys::CONTROL));
    }
}
