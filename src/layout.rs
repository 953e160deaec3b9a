/*
 * Layout engines.
 *
 * A `LayoutEngine` repositions the children of a container when the
 * container's layout pass runs. The core decides *when* a pass runs (see
 * `ControlTree::perform_layout`); the engine decides *where* children go and
 * moves them through the tree's public bounds API.
 *
 * `DefaultLayout` implements docking and anchoring:
 * - docked children consume edges of the remaining display area in child order,
 *   keeping their own height (top/bottom) or width (left/right);
 * - proportional-fill children share the remaining width by weight;
 * - the first `Fill` child takes whatever remains;
 * - undocked children keep the distances to their anchored edges that were
 *   cached when they were last positioned explicitly.
 */
use crate::control::ControlTree;
use crate::events::LayoutEventArgs;
use crate::types::{AnchorStyles, ControlId, DockStyle, Padding, Rect};

pub trait LayoutEngine: Send + Sync {
    fn layout(&self, tree: &mut ControlTree, container: ControlId, args: &LayoutEventArgs);
}

/// Cached distances from a child's edges to its parent's display rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnchorInfo {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl AnchorInfo {
    pub fn measure(bounds: Rect, display: Rect) -> Self {
        Self {
            left: bounds.x - display.x,
            top: bounds.y - display.y,
            right: display.right() - bounds.right(),
            bottom: display.bottom() - bounds.bottom(),
        }
    }
}

/// One child as seen by the layout calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem {
    pub id: ControlId,
    pub dock: DockStyle,
    pub anchor: AnchorStyles,
    pub bounds: Rect,
    pub margin: Padding,
    pub anchor_info: Option<AnchorInfo>,
}

/*
 * Pure layout calculation. Returns the rectangle for each item that the rules
 * place; items left out keep their current bounds.
 */
pub fn calculate_layout(display: Rect, items: &[LayoutItem]) -> Vec<(ControlId, Rect)> {
    let mut result = Vec::with_capacity(items.len());
    let mut remaining = display;
    let mut fill_candidate: Option<&LayoutItem> = None;
    let mut proportional: Vec<(&LayoutItem, f32)> = Vec::new();

    for item in items {
        let m = item.margin;
        match item.dock {
            DockStyle::Top => {
                let height = item.bounds.height;
                let rect = Rect::new(
                    remaining.x + m.left,
                    remaining.y + m.top,
                    (remaining.width - m.left - m.right).max(0),
                    height,
                );
                let consumed = (height + m.top + m.bottom).min(remaining.height.max(0));
                remaining = Rect::new(
                    remaining.x,
                    remaining.y + consumed,
                    remaining.width,
                    remaining.height - consumed,
                );
                result.push((item.id, rect));
            }
            DockStyle::Bottom => {
                let height = item.bounds.height;
                let rect = Rect::new(
                    remaining.x + m.left,
                    remaining.bottom() - m.bottom - height,
                    (remaining.width - m.left - m.right).max(0),
                    height,
                );
                let consumed = (height + m.top + m.bottom).min(remaining.height.max(0));
                remaining.height -= consumed;
                result.push((item.id, rect));
            }
            DockStyle::Left => {
                let width = item.bounds.width;
                let rect = Rect::new(
                    remaining.x + m.left,
                    remaining.y + m.top,
                    width,
                    (remaining.height - m.top - m.bottom).max(0),
                );
                let consumed = (width + m.left + m.right).min(remaining.width.max(0));
                remaining = Rect::new(
                    remaining.x + consumed,
                    remaining.y,
                    remaining.width - consumed,
                    remaining.height,
                );
                result.push((item.id, rect));
            }
            DockStyle::Right => {
                let width = item.bounds.width;
                let rect = Rect::new(
                    remaining.right() - m.right - width,
                    remaining.y + m.top,
                    width,
                    (remaining.height - m.top - m.bottom).max(0),
                );
                let consumed = (width + m.left + m.right).min(remaining.width.max(0));
                remaining.width -= consumed;
                result.push((item.id, rect));
            }
            DockStyle::Fill => {
                if fill_candidate.is_none() {
                    fill_candidate = Some(item);
                } else {
                    log::warn!(
                        "Layout: multiple Fill children, ignoring {:?}",
                        item.id
                    );
                }
            }
            DockStyle::ProportionalFill { weight } => proportional.push((item, weight)),
            DockStyle::None => {
                if let Some(rect) = anchored_rect(display, item) {
                    result.push((item.id, rect));
                }
            }
        }
    }

    let total_weight: f32 = proportional.iter().map(|(_, w)| w.max(0.0)).sum();
    if total_weight > 0.0 {
        let total_width = remaining.width.max(0);
        let mut x = remaining.x;
        for (item, weight) in &proportional {
            let m = item.margin;
            let allocation = (total_width as f32 * (weight.max(0.0) / total_weight)) as i32;
            result.push((
                item.id,
                Rect::new(
                    x + m.left,
                    remaining.y + m.top,
                    (allocation - m.left - m.right).max(0),
                    (remaining.height - m.top - m.bottom).max(0),
                ),
            ));
            x += allocation;
        }
    }

    if let Some(item) = fill_candidate {
        let m = item.margin;
        result.push((
            item.id,
            Rect::new(
                remaining.x + m.left,
                remaining.y + m.top,
                (remaining.width - m.left - m.right).max(0),
                (remaining.height - m.top - m.bottom).max(0),
            ),
        ));
    }

    result
}

fn anchored_rect(display: Rect, item: &LayoutItem) -> Option<Rect> {
    let info = item.anchor_info?;
    let anchor = item.anchor;
    let mut rect = item.bounds;

    match (
        anchor.contains(AnchorStyles::LEFT),
        anchor.contains(AnchorStyles::RIGHT),
    ) {
        (true, true) => {
            rect.x = display.x + info.left;
            rect.width = (display.width - info.left - info.right).max(0);
        }
        (false, true) => rect.x = display.right() - info.right - rect.width,
        (true, false) => rect.x = display.x + info.left,
        (false, false) => {
            // Keeps the control centered relative to its original offsets.
            let slack = display.width - rect.width;
            let original = info.left + info.right;
            if original != 0 {
                rect.x = display.x + (info.left as i64 * slack as i64 / original as i64) as i32;
            }
        }
    }

    match (
        anchor.contains(AnchorStyles::TOP),
        anchor.contains(AnchorStyles::BOTTOM),
    ) {
        (true, true) => {
            rect.y = display.y + info.top;
            rect.height = (display.height - info.top - info.bottom).max(0);
        }
        (false, true) => rect.y = display.bottom() - info.bottom - rect.height,
        (true, false) => rect.y = display.y + info.top,
        (false, false) => {
            let slack = display.height - rect.height;
            let original = info.top + info.bottom;
            if original != 0 {
                rect.y = display.y + (info.top as i64 * slack as i64 / original as i64) as i32;
            }
        }
    }

    (rect != item.bounds).then_some(rect)
}

/// Dock-and-anchor engine used by every container without its own engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLayout;

impl LayoutEngine for DefaultLayout {
    fn layout(&self, tree: &mut ControlTree, container: ControlId, args: &LayoutEventArgs) {
        let Some(display) = tree.display_rectangle(container) else {
            return;
        };
        let items: Vec<LayoutItem> = tree
            .all_controls(container)
            .into_iter()
            .filter(|child| tree.is_visible(*child))
            .filter_map(|child| tree.layout_item(child))
            .collect();
        if items.is_empty() {
            return;
        }

        log::trace!(
            "Layout: default engine on {container:?} ({} children, display {display:?}, cause {:?})",
            items.len(),
            args.affected_property
        );

        for (child, rect) in calculate_layout(display, &items) {
            if let Err(err) = tree.set_bounds(child, rect) {
                log::warn!("Layout: cannot position {child:?} at {rect:?}: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u32, dock: DockStyle, bounds: Rect) -> LayoutItem {
        LayoutItem {
            id: ControlId::new(id),
            dock,
            anchor: AnchorStyles::default(),
            bounds,
            margin: Padding::default(),
            anchor_info: None,
        }
    }

    fn rect_of(result: &[(ControlId, Rect)], id: u32) -> Rect {
        result
            .iter()
            .find(|(c, _)| *c == ControlId::new(id))
            .map(|(_, r)| *r)
            .unwrap()
    }

    #[test]
    fn docked_children_consume_edges_and_fill_takes_the_rest() {
        // Arrange
        let display = Rect::new(0, 0, 200, 100);
        let items = vec![
            item(1, DockStyle::Top, Rect::new(0, 0, 10, 20)),
            item(2, DockStyle::Left, Rect::new(0, 0, 30, 10)),
            item(3, DockStyle::Fill, Rect::default()),
            item(4, DockStyle::Bottom, Rect::new(0, 0, 10, 10)),
        ];

        // Act
        let result = calculate_layout(display, &items);

        // Assert
        assert_eq!(rect_of(&result, 1), Rect::new(0, 0, 200, 20));
        assert_eq!(rect_of(&result, 2), Rect::new(0, 20, 30, 80));
        assert_eq!(rect_of(&result, 4), Rect::new(30, 90, 170, 10));
        assert_eq!(rect_of(&result, 3), Rect::new(30, 20, 170, 70));
    }

    #[test]
    fn proportional_fill_splits_width_by_weight() {
        let display = Rect::new(0, 0, 300, 50);
        let items = vec![
            item(1, DockStyle::ProportionalFill { weight: 1.0 }, Rect::default()),
            item(2, DockStyle::ProportionalFill { weight: 2.0 }, Rect::default()),
        ];

        let result = calculate_layout(display, &items);

        assert_eq!(rect_of(&result, 1), Rect::new(0, 0, 100, 50));
        assert_eq!(rect_of(&result, 2), Rect::new(100, 0, 200, 50));
    }

    #[test]
    fn right_anchored_child_keeps_its_distance_to_the_right_edge() {
        let original_display = Rect::new(0, 0, 100, 100);
        let bounds = Rect::new(70, 10, 20, 20);
        let mut anchored = item(1, DockStyle::None, bounds);
        anchored.anchor = AnchorStyles::TOP | AnchorStyles::RIGHT;
        anchored.anchor_info = Some(AnchorInfo::measure(bounds, original_display));

        let result = calculate_layout(Rect::new(0, 0, 150, 100), &[anchored]);

        assert_eq!(rect_of(&result, 1), Rect::new(120, 10, 20, 20));
    }

    #[test]
    fn unchanged_anchored_child_is_not_repositioned() {
        let display = Rect::new(0, 0, 100, 100);
        let bounds = Rect::new(5, 5, 20, 20);
        let mut anchored = item(1, DockStyle::None, bounds);
        anchored.anchor_info = Some(AnchorInfo::measure(bounds, display));

        assert!(calculate_layout(display, &[anchored]).is_empty());
    }
}
