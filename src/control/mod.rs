/*
 * The control arena.
 *
 * `ControlTree` owns every control of one UI thread: the per-control state
 * (`ControlData`), the platform window service, the theme, the default layout
 * engine, the configuration and the tree-wide singletons (capture owner, focused
 * control, native handle map). Controls are addressed by `ControlId`; parent
 * links are plain ids and child lists are the ownership edges.
 *
 * The behavior is split across submodules, each adding an `impl ControlTree`
 * block: bounds, handle lifecycle, composition, layout suspension, painting,
 * message dispatch, input, keyboard routing, focus, marshaling and drag-drop.
 */
use crate::accessibility::{AccessibilityNotifier, AccessibleObject};
use crate::config::ToolkitConfig;
use crate::error::{ControlError, Result};
use crate::events::{ControlEvents, EventList};
use crate::layout::{AnchorInfo, DefaultLayout, LayoutEngine};
use crate::platform::{NativeHandle, PlatformWindowService};
use crate::theme::{ClassicTheme, Theme};
use crate::types::{
    AnchorStyles, BorderStyle, Color, ControlId, ControlStyles, Cursor, DockStyle,
    FontDescription, Padding, Point, Rect, Region, UiState,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::ThreadId;

mod bounds;
mod buffer;
pub mod capabilities;
mod collection;
mod dispatch;
mod drag_drop;
mod focus;
mod handle;
mod input;
pub mod invoke;
mod keyboard;
mod layout;
mod paint;

pub use buffer::DoubleBuffer;
pub use capabilities::{Containerish, Focusable, PaintContext, Paintable};
pub use invoke::{AsyncResult, Marshaler};

const DEFAULT_CLASS_NAME: &str = "ControlCore.Control";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreationState {
    NotCreated,
    Created,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    NoHandle,
    HandleCreated,
    Recreating,
    Destroyed,
}

/// State of a control that manages focus for its descendants.
#[derive(Debug, Clone, Default)]
pub(crate) struct ContainerState {
    pub(crate) active_control: Option<ControlId>,
    pub(crate) validation_cancelled: bool,
    pub(crate) mdi_host: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LayoutState {
    pub(crate) suspend_count: u32,
    pub(crate) pending: bool,
    pub(crate) in_engine: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DragTracker {
    pub(crate) origin: Point,
    pub(crate) dragging: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MouseState {
    pub(crate) pressed: bool,
    pub(crate) double_click_fired: bool,
    pub(crate) click_count: u32,
    pub(crate) entered: bool,
    pub(crate) drag: Option<DragTracker>,
}

/// Describes a control to create with `ControlTree::create`.
#[derive(Debug, Clone)]
pub struct ControlOptions {
    pub name: String,
    pub text: String,
    pub class_name: String,
    pub bounds: Rect,
    pub styles: ControlStyles,
    pub visible: bool,
    pub enabled: bool,
    pub tab_stop: bool,
    /// Owns its own tab cycle and tracks an active control.
    pub focus_container: bool,
    pub top_level: bool,
    pub mdi_host: bool,
    pub mdi_child: bool,
    pub border_style: BorderStyle,
}

impl ControlOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            text: String::new(),
            class_name: DEFAULT_CLASS_NAME.to_string(),
            bounds: Rect::default(),
            styles: ControlStyles::default(),
            visible: true,
            enabled: true,
            tab_stop: true,
            focus_container: false,
            top_level: false,
            mdi_host: false,
            mdi_child: false,
            border_style: BorderStyle::None,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_styles(mut self, styles: ControlStyles) -> Self {
        self.styles = styles;
        self
    }

    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn focus_container(mut self) -> Self {
        self.focus_container = true;
        self.styles |= ControlStyles::CONTAINER_CONTROL;
        self
    }

    pub fn top_level(mut self) -> Self {
        self.top_level = true;
        self.focus_container()
    }
}

pub(crate) struct ControlData {
    pub(crate) name: String,
    pub(crate) text: String,
    pub(crate) class_name: String,

    pub(crate) bounds: Rect,
    pub(crate) explicit_bounds: Rect,
    pub(crate) visible: bool,
    pub(crate) enabled: bool,
    pub(crate) creation: CreationState,
    pub(crate) handle_state: HandleState,
    pub(crate) handle: Option<NativeHandle>,
    pub(crate) owning_thread: Option<ThreadId>,
    pub(crate) styles: ControlStyles,
    pub(crate) double_buffer_override: Option<bool>,

    pub(crate) parent: Option<ControlId>,
    pub(crate) children: Vec<ControlId>,
    pub(crate) implicit_children: Vec<ControlId>,
    pub(crate) tab_index: i32,
    pub(crate) tab_stop: bool,
    pub(crate) top_level: bool,
    pub(crate) mdi_child: bool,
    pub(crate) container: Option<ContainerState>,

    pub(crate) dock: DockStyle,
    pub(crate) anchor: AnchorStyles,
    pub(crate) anchor_info: Option<AnchorInfo>,
    pub(crate) anchor_stale: bool,
    pub(crate) margin: Padding,
    pub(crate) padding: Padding,
    pub(crate) layout: LayoutState,
    pub(crate) layout_engine: Option<Arc<dyn LayoutEngine>>,

    pub(crate) border_style: BorderStyle,
    pub(crate) back_color: Option<Color>,
    pub(crate) fore_color: Option<Color>,
    pub(crate) font: Option<FontDescription>,
    pub(crate) cursor: Cursor,
    pub(crate) allow_drop: bool,
    pub(crate) clip_region: Option<Region>,
    pub(crate) causes_validation: bool,
    pub(crate) key_preview: bool,
    pub(crate) ui_state: UiState,

    pub(crate) buffer: DoubleBuffer,
    pub(crate) mouse: MouseState,
    pub(crate) suppress_key_press: bool,
    pub(crate) accessible: Option<AccessibleObject>,

    pub(crate) painter: Option<Box<dyn Paintable>>,
    pub(crate) focus_behavior: Option<Box<dyn Focusable>>,
    pub(crate) container_behavior: Option<Box<dyn Containerish>>,

    pub(crate) events: ControlEvents,
}

impl ControlData {
    fn new(options: ControlOptions) -> Self {
        let container = (options.focus_container || options.mdi_host).then(|| ContainerState {
            mdi_host: options.mdi_host,
            ..ContainerState::default()
        });
        let mut styles = options.styles;
        if container.is_some() {
            styles |= ControlStyles::CONTAINER_CONTROL;
        }
        Self {
            name: options.name,
            text: options.text,
            class_name: options.class_name,
            bounds: options.bounds,
            explicit_bounds: options.bounds,
            visible: options.visible,
            enabled: options.enabled,
            creation: CreationState::NotCreated,
            handle_state: HandleState::NoHandle,
            handle: None,
            owning_thread: None,
            styles,
            double_buffer_override: None,
            parent: None,
            children: Vec::new(),
            implicit_children: Vec::new(),
            tab_index: -1,
            tab_stop: options.tab_stop,
            top_level: options.top_level || options.mdi_child,
            mdi_child: options.mdi_child,
            container,
            dock: DockStyle::None,
            anchor: AnchorStyles::default(),
            anchor_info: None,
            anchor_stale: true,
            margin: Padding::all(3),
            padding: Padding::default(),
            layout: LayoutState::default(),
            layout_engine: None,
            border_style: options.border_style,
            back_color: None,
            fore_color: None,
            font: None,
            cursor: Cursor::Default,
            allow_drop: false,
            clip_region: None,
            causes_validation: true,
            key_preview: false,
            ui_state: UiState::empty(),
            buffer: DoubleBuffer::default(),
            mouse: MouseState::default(),
            suppress_key_press: false,
            accessible: None,
            painter: None,
            focus_behavior: None,
            container_behavior: None,
            events: ControlEvents::default(),
        }
    }

    pub(crate) fn is_focus_container(&self) -> bool {
        self.container.is_some() && self.styles.contains(ControlStyles::CONTAINER_CONTROL)
    }
}

/// Snapshot taken when a handle recreation starts, consumed when it completes.
#[derive(Debug, Clone)]
pub(crate) struct RecreateSnapshot {
    /// Every control of the recreated subtree with its rectangle, parents first.
    pub(crate) bounds: Vec<(ControlId, Rect)>,
    /// Controls that had a handle, with that handle, parents first.
    pub(crate) handles: Vec<(ControlId, NativeHandle)>,
    pub(crate) focused: Option<ControlId>,
}

pub struct ControlTree {
    pub(crate) controls: HashMap<ControlId, ControlData>,
    pub(crate) disposed: HashSet<ControlId>,
    next_id: u32,
    pub(crate) platform: Box<dyn PlatformWindowService>,
    pub(crate) theme: Arc<dyn Theme>,
    pub(crate) default_layout: Arc<dyn LayoutEngine>,
    pub(crate) config: ToolkitConfig,
    pub(crate) handle_map: HashMap<NativeHandle, ControlId>,
    pub(crate) capture: Option<ControlId>,
    pub(crate) focused: Option<ControlId>,
    pub(crate) marshal: Arc<invoke::MarshalShared>,
    pub(crate) accessibility_notifier: Option<Box<dyn AccessibilityNotifier>>,
    pub(crate) recreating: HashSet<ControlId>,
    pub(crate) pending_recreates: HashMap<ControlId, RecreateSnapshot>,
}

impl ControlTree {
    pub fn new(platform: Box<dyn PlatformWindowService>, config: ToolkitConfig) -> Self {
        log::debug!(
            "Tree: created (cross-thread checks: {}, context flow suppressed: {})",
            config.check_for_illegal_cross_thread_calls,
            config.suppress_context_flow
        );
        Self {
            controls: HashMap::new(),
            disposed: HashSet::new(),
            next_id: 1,
            platform,
            theme: Arc::new(ClassicTheme::default()),
            default_layout: Arc::new(DefaultLayout),
            config,
            handle_map: HashMap::new(),
            capture: None,
            focused: None,
            marshal: Arc::new(invoke::MarshalShared::new()),
            accessibility_notifier: None,
            recreating: HashSet::new(),
            pending_recreates: HashMap::new(),
        }
    }

    pub fn with_theme(mut self, theme: Arc<dyn Theme>) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_default_layout(mut self, engine: Arc<dyn LayoutEngine>) -> Self {
        self.default_layout = engine;
        self
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    pub fn theme(&self) -> &Arc<dyn Theme> {
        &self.theme
    }

    pub fn set_accessibility_notifier(&mut self, notifier: Box<dyn AccessibilityNotifier>) {
        self.accessibility_notifier = Some(notifier);
    }

    pub fn create(&mut self, options: ControlOptions) -> ControlId {
        let id = ControlId::new(self.next_id);
        self.next_id += 1;
        log::trace!("Tree: new control {id:?} '{}'", options.name);
        self.controls.insert(id, ControlData::new(options));
        id
    }

    /// A plain control: selectable, clickable, not a focus container.
    pub fn new_control(&mut self, name: &str) -> ControlId {
        self.create(ControlOptions::new(name))
    }

    /// A control that owns its own tab cycle.
    pub fn new_container(&mut self, name: &str) -> ControlId {
        self.create(ControlOptions::new(name).focus_container())
    }

    pub fn new_top_level(&mut self, name: &str) -> ControlId {
        self.create(ControlOptions::new(name).top_level())
    }

    /// A top-level container that accepts MDI children.
    pub fn new_mdi_host(&mut self, name: &str) -> ControlId {
        let mut options = ControlOptions::new(name).top_level();
        options.mdi_host = true;
        self.create(options)
    }

    pub fn new_mdi_child(&mut self, name: &str) -> ControlId {
        let mut options = ControlOptions::new(name).top_level();
        options.mdi_child = true;
        self.create(options)
    }

    pub(crate) fn data(&self, id: ControlId) -> Result<&ControlData> {
        match self.controls.get(&id) {
            Some(data) => Ok(data),
            None if self.disposed.contains(&id) => Err(ControlError::ObjectDisposed(id)),
            None => Err(ControlError::InvalidArgument(format!(
                "unknown control {id:?}"
            ))),
        }
    }

    pub(crate) fn data_mut(&mut self, id: ControlId) -> Result<&mut ControlData> {
        if self.disposed.contains(&id) {
            return Err(ControlError::ObjectDisposed(id));
        }
        self.controls
            .get_mut(&id)
            .ok_or_else(|| ControlError::InvalidArgument(format!("unknown control {id:?}")))
    }

    pub fn exists(&self, id: ControlId) -> bool {
        self.controls.contains_key(&id)
    }

    pub fn is_disposed(&self, id: ControlId) -> bool {
        self.disposed.contains(&id)
    }

    pub fn name(&self, id: ControlId) -> Option<&str> {
        self.controls.get(&id).map(|d| d.name.as_str())
    }

    pub fn text(&self, id: ControlId) -> Option<&str> {
        self.controls.get(&id).map(|d| d.text.as_str())
    }

    pub fn set_text(&mut self, id: ControlId, text: &str) -> Result<()> {
        self.check_thread(id)?;
        let data = self.data_mut(id)?;
        if data.text == text {
            return Ok(());
        }
        data.text = text.to_string();
        self.raise(id, |e| &mut e.text_changed, &mut ());
        self.accessibility_notify_clients(
            id,
            crate::accessibility::AccessibleEvent::NameChange,
            -1,
        );
        self.invalidate(id, None, false)
    }

    pub fn styles(&self, id: ControlId) -> Option<ControlStyles> {
        self.controls.get(&id).map(|d| d.styles)
    }

    pub fn get_style(&self, id: ControlId, flag: ControlStyles) -> bool {
        self.controls
            .get(&id)
            .is_some_and(|d| d.styles.contains(flag))
    }

    pub fn set_style(&mut self, id: ControlId, flags: ControlStyles, value: bool) -> Result<()> {
        let data = self.data_mut(id)?;
        data.styles.set(flags, value);
        if flags.intersects(ControlStyles::DOUBLE_BUFFER | ControlStyles::OPTIMIZED_DOUBLE_BUFFER)
            && !value
        {
            data.buffer.discard();
        }
        Ok(())
    }

    /// Per-control double-buffering override; `None` falls back to the style flags.
    pub fn set_double_buffered(&mut self, id: ControlId, value: Option<bool>) -> Result<()> {
        let data = self.data_mut(id)?;
        data.double_buffer_override = value;
        if value == Some(false) {
            data.buffer.discard();
        }
        Ok(())
    }

    pub fn parent(&self, id: ControlId) -> Option<ControlId> {
        self.controls.get(&id).and_then(|d| d.parent)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ControlId) -> Vec<ControlId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    pub fn is_ancestor_of(&self, ancestor: ControlId, id: ControlId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    pub fn is_top_level(&self, id: ControlId) -> bool {
        self.controls.get(&id).is_some_and(|d| d.top_level)
    }

    pub fn is_mdi_host(&self, id: ControlId) -> bool {
        self.controls
            .get(&id)
            .and_then(|d| d.container.as_ref())
            .is_some_and(|c| c.mdi_host)
    }

    pub fn is_focus_container(&self, id: ControlId) -> bool {
        self.controls
            .get(&id)
            .is_some_and(ControlData::is_focus_container)
    }

    /// The root of the composition tree containing `id`.
    pub fn top_level_control(&self, id: ControlId) -> Option<ControlId> {
        if !self.exists(id) {
            return None;
        }
        Some(self.ancestors(id).last().copied().unwrap_or(id))
    }

    /// Nearest focus-container ancestor of `id`, not counting `id` itself.
    pub fn container_control(&self, id: ControlId) -> Option<ControlId> {
        self.ancestors(id)
            .into_iter()
            .find(|a| self.is_focus_container(*a))
    }

    /// `id` and all its descendants, parents before children.
    pub fn subtree(&self, id: ControlId) -> Vec<ControlId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.exists(current) {
                continue;
            }
            out.push(current);
            for child in self.all_controls(current).into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    pub fn causes_validation(&self, id: ControlId) -> bool {
        self.controls.get(&id).is_some_and(|d| d.causes_validation)
    }

    pub fn set_causes_validation(&mut self, id: ControlId, value: bool) -> Result<()> {
        self.data_mut(id)?.causes_validation = value;
        Ok(())
    }

    pub fn set_key_preview(&mut self, id: ControlId, value: bool) -> Result<()> {
        self.data_mut(id)?.key_preview = value;
        Ok(())
    }

    pub fn back_color(&self, id: ControlId) -> Color {
        let mut current = Some(id);
        while let Some(c) = current {
            match self.controls.get(&c) {
                Some(data) => {
                    if let Some(color) = data.back_color {
                        return color;
                    }
                    current = data.parent;
                }
                None => break,
            }
        }
        self.theme.default_back_color()
    }

    pub fn set_back_color(&mut self, id: ControlId, color: Option<Color>) -> Result<()> {
        self.check_thread(id)?;
        let data = self.data_mut(id)?;
        if let Some(c) = color
            && !c.is_opaque()
            && !data
                .styles
                .contains(ControlStyles::SUPPORTS_TRANSPARENT_BACK_COLOR)
        {
            return Err(ControlError::InvalidArgument(
                "control does not support transparent background colors".to_string(),
            ));
        }
        if data.back_color == color {
            return Ok(());
        }
        data.back_color = color;
        self.raise(id, |e| &mut e.back_color_changed, &mut ());
        self.invalidate(id, None, false)
    }

    pub fn fore_color(&self, id: ControlId) -> Color {
        let mut current = Some(id);
        while let Some(c) = current {
            match self.controls.get(&c) {
                Some(data) => {
                    if let Some(color) = data.fore_color {
                        return color;
                    }
                    current = data.parent;
                }
                None => break,
            }
        }
        self.theme.default_fore_color()
    }

    pub fn set_fore_color(&mut self, id: ControlId, color: Option<Color>) -> Result<()> {
        self.check_thread(id)?;
        self.data_mut(id)?.fore_color = color;
        self.invalidate(id, None, false)
    }

    pub fn font(&self, id: ControlId) -> FontDescription {
        let mut current = Some(id);
        while let Some(c) = current {
            match self.controls.get(&c) {
                Some(data) => {
                    if let Some(font) = &data.font {
                        return font.clone();
                    }
                    current = data.parent;
                }
                None => break,
            }
        }
        self.theme.default_font()
    }

    pub fn set_font(&mut self, id: ControlId, font: Option<FontDescription>) -> Result<()> {
        self.check_thread(id)?;
        self.data_mut(id)?.font = font;
        self.invalidate(id, None, false)?;
        if let Some(parent) = self.parent(id) {
            self.perform_layout(parent, Some(id), Some("Font"))?;
        }
        Ok(())
    }

    pub fn set_painter(&mut self, id: ControlId, painter: impl Paintable + 'static) -> Result<()> {
        self.data_mut(id)?.painter = Some(Box::new(painter));
        Ok(())
    }

    pub fn set_focus_behavior(
        &mut self,
        id: ControlId,
        behavior: impl Focusable + 'static,
    ) -> Result<()> {
        self.data_mut(id)?.focus_behavior = Some(Box::new(behavior));
        Ok(())
    }

    pub fn set_container_behavior(
        &mut self,
        id: ControlId,
        behavior: impl Containerish + 'static,
    ) -> Result<()> {
        self.data_mut(id)?.container_behavior = Some(Box::new(behavior));
        Ok(())
    }

    /// Observer lists of `id`, for registering and removing handlers.
    pub fn events_mut(&mut self, id: ControlId) -> Result<&mut ControlEvents> {
        Ok(&mut self.data_mut(id)?.events)
    }

    /*
     * Raises one event of `id`. The list is detached from the control while its
     * handlers run so they can take `&mut ControlTree`; it is reattached after,
     * unless a handler disposed the control.
     */
    pub(crate) fn raise_with<A, R>(
        &mut self,
        id: ControlId,
        select: fn(&mut ControlEvents) -> &mut EventList<A, R>,
        args: &mut A,
    ) -> Vec<R> {
        let Some(data) = self.controls.get_mut(&id) else {
            return Vec::new();
        };
        let list = select(&mut data.events);
        if list.is_empty() {
            return Vec::new();
        }
        let mut detached = list.detach();
        let results = detached.invoke(self, id, args);
        if let Some(data) = self.controls.get_mut(&id) {
            select(&mut data.events).reattach(detached);
        }
        results
    }

    pub(crate) fn raise<A>(
        &mut self,
        id: ControlId,
        select: fn(&mut ControlEvents) -> &mut EventList<A>,
        args: &mut A,
    ) {
        self.raise_with(id, select, args);
    }

    /// Lazily created accessibility wrapper of `id`.
    pub fn accessibility_object(&mut self, id: ControlId) -> Result<&mut AccessibleObject> {
        let data = self.data_mut(id)?;
        Ok(data
            .accessible
            .get_or_insert_with(|| AccessibleObject::new(id)))
    }

    pub fn is_accessibility_object_created(&self, id: ControlId) -> bool {
        self.controls.get(&id).is_some_and(|d| d.accessible.is_some())
    }

    /// Accessible name: the explicit one, else the caption when the style allows it.
    pub fn accessible_name(&self, id: ControlId) -> Option<String> {
        let data = self.controls.get(&id)?;
        if let Some(name) = data.accessible.as_ref().and_then(|a| a.name.clone()) {
            return Some(name);
        }
        data.styles
            .contains(ControlStyles::USE_TEXT_FOR_ACCESSIBILITY)
            .then(|| data.text.replace('&', ""))
            .filter(|text| !text.is_empty())
    }

    /// Forwards an accessibility event outward, if anyone asked for the wrapper.
    pub fn accessibility_notify_clients(
        &mut self,
        id: ControlId,
        event: crate::accessibility::AccessibleEvent,
        child_id: i32,
    ) {
        if !self.is_accessibility_object_created(id) {
            return;
        }
        if let Some(notifier) = &self.accessibility_notifier {
            notifier.notify(id, event, child_id);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn handlers_can_mutate_the_tree_while_an_event_is_raised() {
        // Arrange
        let (mut tree, _platform) = tree();
        let control = tree.new_control("a");
        tree.events_mut(control)
            .unwrap()
            .text_changed
            .add(|tree, id, _| {
                tree.set_causes_validation(id, false).unwrap();
            });

        // Act
        tree.set_text(control, "hello").unwrap();

        // Assert
        assert!(!tree.causes_validation(control));
    }

    #[test]
    fn handler_added_during_raise_runs_from_the_next_raise() {
        let (mut tree, _platform) = tree();
        let control = tree.new_control("a");
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer_log = Arc::clone(&log);
        tree.events_mut(control)
            .unwrap()
            .text_changed
            .add(move |tree, id, _| {
                outer_log.lock().unwrap().push("outer");
                let inner_log = Arc::clone(&outer_log);
                tree.events_mut(id).unwrap().text_changed.add(move |_, _, _| {
                    inner_log.lock().unwrap().push("inner");
                });
            });

        tree.set_text(control, "one").unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["outer"]);

        tree.set_text(control, "two").unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["outer", "outer", "inner"]);
    }

    #[test]
    fn colors_and_fonts_are_inherited_from_the_parent() {
        let (mut tree, _platform) = tree();
        let parent = tree.new_container("p");
        let child = tree.new_control("c");
        tree.add(parent, child).unwrap();
        tree.set_fore_color(parent, Some(Color::rgb(1, 2, 3))).unwrap();

        assert_eq!(tree.fore_color(child), Color::rgb(1, 2, 3));
        assert_eq!(tree.back_color(child), tree.theme().default_back_color());
    }

    #[test]
    fn transparent_back_color_requires_the_style() {
        let (mut tree, _platform) = tree();
        let control = tree.new_control("c");

        let err = tree.set_back_color(control, Some(Color::TRANSPARENT));
        assert!(matches!(err, Err(ControlError::InvalidArgument(_))));

        tree.set_style(control, ControlStyles::SUPPORTS_TRANSPARENT_BACK_COLOR, true)
            .unwrap();
        assert!(tree.set_back_color(control, Some(Color::TRANSPARENT)).is_ok());
    }

    #[test]
    fn accessible_name_falls_back_to_the_caption() {
        let (mut tree, _platform) = tree();
        let control = tree.create(ControlOptions::new("ok").with_text("&OK"));

        assert_eq!(tree.accessible_name(control).as_deref(), Some("OK"));
        assert!(!tree.is_accessibility_object_created(control));

        tree.accessibility_object(control).unwrap().name = Some("Confirm".into());
        assert_eq!(tree.accessible_name(control).as_deref(), Some("Confirm"));
    }
}
