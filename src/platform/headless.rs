/*
 * In-process platform window service.
 *
 * Keeps a native-window table (rectangles, parent links, per-parent Z-order,
 * visibility, invalid regions, capture and focus owner) and produces the same
 * sent/posted notification traffic a real windowing system would. Hosts without
 * a native backend and the test suite run on it.
 *
 * `HeadlessPlatform` is a cheap clone over shared state, so a test can keep a
 * clone for inspection after handing one to a `ControlTree`.
 */
use crate::error::{PlatformError, PlatformResult};
use crate::graphics::{DisplayList, Graphics};
use crate::message::{Message, MessageKind};
use crate::platform::{
    AsyncMethodChannel, CreateParams, ExWindowStyle, NativeHandle, PlatformWindowService,
    WindowStyle, ZOrderPosition,
};
use crate::types::{Cursor, Keys, Rect, Region, Size};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Height of the caption bar added by `adjust_window_rect`.
const CAPTION_HEIGHT: i32 = 23;

#[derive(Debug, Clone)]
struct HeadlessWindow {
    class_name: String,
    caption: String,
    style: WindowStyle,
    ex_style: ExWindowStyle,
    rect: Rect,
    parent: Option<NativeHandle>,
    visible: bool,
    enabled: bool,
    invalid: Region,
    cursor: Cursor,
    allow_drop: bool,
    clip_region: Option<Region>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_handle: u64,
    windows: HashMap<NativeHandle, HeadlessWindow>,
    /// Per-parent stacking order, topmost first. `None` holds the top-level windows.
    z_order: HashMap<Option<NativeHandle>, Vec<NativeHandle>>,
    capture: Option<NativeHandle>,
    focus: Option<NativeHandle>,
    sent: Vec<Message>,
    posted: VecDeque<Message>,
    painted: HashMap<NativeHandle, Vec<DisplayList>>,
    modifiers: Keys,
    minimum_size: Size,
    fail_next_create: bool,
    fail_adjust: bool,
    create_count: usize,
    destroy_count: usize,
}

impl HeadlessState {
    fn window(&self, handle: NativeHandle) -> PlatformResult<&HeadlessWindow> {
        self.windows
            .get(&handle)
            .ok_or_else(|| PlatformError::InvalidHandle(format!("{handle:?}")))
    }

    fn window_mut(&mut self, handle: NativeHandle) -> PlatformResult<&mut HeadlessWindow> {
        self.windows
            .get_mut(&handle)
            .ok_or_else(|| PlatformError::InvalidHandle(format!("{handle:?}")))
    }

    fn send(&mut self, msg: Message) {
        self.sent.push(msg);
    }

    fn unlink(&mut self, handle: NativeHandle, parent: Option<NativeHandle>) {
        if let Some(siblings) = self.z_order.get_mut(&parent) {
            siblings.retain(|h| *h != handle);
        }
    }

    /// `handle` and its descendants, parents before children.
    fn subtree(&self, handle: NativeHandle) -> Vec<NativeHandle> {
        let mut out = vec![handle];
        let mut i = 0;
        while i < out.len() {
            if let Some(children) = self.z_order.get(&Some(out[i])) {
                out.extend(children.iter().copied());
            }
            i += 1;
        }
        out
    }

    fn invalidate_all(&mut self, handle: NativeHandle) {
        if let Some(window) = self.windows.get_mut(&handle) {
            let client = Rect::from_size(window.rect.size());
            window.invalid = Region::from_rect(client);
        }
    }
}

#[derive(Clone, Default)]
pub struct HeadlessPlatform {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Windows smaller than this are enlarged at creation, like an OS minimum track size.
    pub fn set_minimum_size(&self, size: Size) {
        self.state().minimum_size = size;
    }

    pub fn fail_next_create(&self) {
        self.state().fail_next_create = true;
    }

    pub fn fail_adjust_window_rect(&self, fail: bool) {
        self.state().fail_adjust = fail;
    }

    pub fn set_modifier_keys(&self, modifiers: Keys) {
        self.state().modifiers = modifiers.modifiers();
    }

    /// Queues `msg` as if the windowing system had posted it.
    pub fn post_message(&self, msg: Message) {
        self.state().posted.push_back(msg);
    }

    pub fn window_count(&self) -> usize {
        self.state().windows.len()
    }

    pub fn exists(&self, handle: NativeHandle) -> bool {
        self.state().windows.contains_key(&handle)
    }

    pub fn window_rect(&self, handle: NativeHandle) -> Option<Rect> {
        self.state().windows.get(&handle).map(|w| w.rect)
    }

    pub fn parent_of(&self, handle: NativeHandle) -> Option<NativeHandle> {
        self.state().windows.get(&handle).and_then(|w| w.parent)
    }

    pub fn is_visible(&self, handle: NativeHandle) -> bool {
        self.state().windows.get(&handle).is_some_and(|w| w.visible)
    }

    pub fn is_enabled(&self, handle: NativeHandle) -> bool {
        self.state().windows.get(&handle).is_some_and(|w| w.enabled)
    }

    pub fn style(&self, handle: NativeHandle) -> Option<WindowStyle> {
        self.state().windows.get(&handle).map(|w| w.style)
    }

    pub fn ex_style(&self, handle: NativeHandle) -> Option<ExWindowStyle> {
        self.state().windows.get(&handle).map(|w| w.ex_style)
    }

    pub fn caption(&self, handle: NativeHandle) -> Option<String> {
        self.state().windows.get(&handle).map(|w| w.caption.clone())
    }

    pub fn class_name(&self, handle: NativeHandle) -> Option<String> {
        self.state()
            .windows
            .get(&handle)
            .map(|w| w.class_name.clone())
    }

    /// Children of `parent` in stacking order, topmost first.
    pub fn z_order(&self, parent: Option<NativeHandle>) -> Vec<NativeHandle> {
        self.state().z_order.get(&parent).cloned().unwrap_or_default()
    }

    pub fn capture(&self) -> Option<NativeHandle> {
        self.state().capture
    }

    pub fn focus(&self) -> Option<NativeHandle> {
        self.state().focus
    }

    pub fn cursor(&self, handle: NativeHandle) -> Option<Cursor> {
        self.state().windows.get(&handle).map(|w| w.cursor)
    }

    pub fn allows_drop(&self, handle: NativeHandle) -> bool {
        self.state().windows.get(&handle).is_some_and(|w| w.allow_drop)
    }

    pub fn clip_region(&self, handle: NativeHandle) -> Option<Region> {
        self.state()
            .windows
            .get(&handle)
            .and_then(|w| w.clip_region.clone())
    }

    pub fn invalid_region(&self, handle: NativeHandle) -> Region {
        self.state()
            .windows
            .get(&handle)
            .map(|w| w.invalid.clone())
            .unwrap_or_default()
    }

    /// Surfaces handed back through `end_paint`, oldest first.
    pub fn painted(&self, handle: NativeHandle) -> Vec<DisplayList> {
        self.state().painted.get(&handle).cloned().unwrap_or_default()
    }

    pub fn create_count(&self) -> usize {
        self.state().create_count
    }

    pub fn destroy_count(&self) -> usize {
        self.state().destroy_count
    }

    pub fn pending_posted(&self) -> usize {
        self.state().posted.len()
    }
}

struct HeadlessChannel {
    state: Arc<Mutex<HeadlessState>>,
}

impl AsyncMethodChannel for HeadlessChannel {
    fn post(&self, target: NativeHandle) -> PlatformResult<()> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !state.windows.contains_key(&target) {
            return Err(PlatformError::InvalidHandle(format!("{target:?}")));
        }
        state
            .posted
            .push_back(Message::simple(target, MessageKind::InvokeMarshaled));
        Ok(())
    }
}

impl PlatformWindowService for HeadlessPlatform {
    fn create_window(&mut self, params: &CreateParams) -> PlatformResult<NativeHandle> {
        let mut state = self.state();
        if std::mem::take(&mut state.fail_next_create) {
            log::warn!("Platform: headless create_window failing on request");
            return Err(PlatformError::OperationFailed(format!(
                "cannot create window of class '{}'",
                params.class_name
            )));
        }
        if let Some(parent) = params.parent {
            state.window(parent)?;
        }

        state.next_handle += 1;
        let handle = NativeHandle(0x1000 + state.next_handle);
        let minimum = state.minimum_size;
        let mut rect = params.bounds;
        rect.width = rect.width.max(minimum.width);
        rect.height = rect.height.max(minimum.height);

        let visible = params.style.contains(WindowStyle::VISIBLE);
        state.windows.insert(
            handle,
            HeadlessWindow {
                class_name: params.class_name.clone(),
                caption: params.caption.clone(),
                style: params.style,
                ex_style: params.ex_style,
                rect,
                parent: params.parent,
                visible,
                enabled: !params.style.contains(WindowStyle::DISABLED),
                invalid: Region::new(),
                cursor: Cursor::Default,
                allow_drop: params.ex_style.contains(ExWindowStyle::ACCEPT_FILES),
                clip_region: None,
            },
        );
        state.z_order.entry(params.parent).or_default().insert(0, handle);
        state.create_count += 1;
        if visible {
            state.invalidate_all(handle);
        }
        state.send(Message::simple(handle, MessageKind::Create));
        log::trace!("Platform: headless created {handle:?} at {rect:?}");
        Ok(handle)
    }

    fn destroy_window(&mut self, handle: NativeHandle) -> PlatformResult<()> {
        let mut state = self.state();
        let parent = state.window(handle)?.parent;
        let doomed = state.subtree(handle);

        if let Some(owner) = state.capture.filter(|c| doomed.contains(c)) {
            state.capture = None;
            state.send(Message::simple(owner, MessageKind::CaptureChanged));
        }
        if state.focus.is_some_and(|f| doomed.contains(&f)) {
            state.focus = None;
        }
        // Children hear about it before their parents.
        for h in doomed.iter().rev() {
            state.send(Message::simple(*h, MessageKind::Destroy));
        }
        state.unlink(handle, parent);
        for h in &doomed {
            state.windows.remove(h);
            state.z_order.remove(&Some(*h));
        }
        state.posted.retain(|msg| !doomed.contains(&msg.handle));
        state.destroy_count += doomed.len();
        log::trace!("Platform: headless destroyed {} window(s) under {handle:?}", doomed.len());
        Ok(())
    }

    fn set_window_pos(&mut self, handle: NativeHandle, bounds: Rect) -> PlatformResult<()> {
        let mut state = self.state();
        let window = state.window_mut(handle)?;
        if window.rect == bounds {
            return Ok(());
        }
        let resized = window.rect.size() != bounds.size();
        window.rect = bounds;
        let visible = window.visible;
        if resized && visible {
            state.invalidate_all(handle);
        }
        state.send(Message::window_pos_changed(handle, bounds));
        Ok(())
    }

    fn show_window(&mut self, handle: NativeHandle, visible: bool) -> PlatformResult<()> {
        let mut state = self.state();
        let window = state.window_mut(handle)?;
        if window.visible == visible {
            return Ok(());
        }
        window.visible = visible;
        if visible {
            state.invalidate_all(handle);
        }
        state.send(Message::new(
            handle,
            MessageKind::ShowWindow,
            usize::from(visible),
            0,
        ));
        Ok(())
    }

    fn enable_window(&mut self, handle: NativeHandle, enabled: bool) -> PlatformResult<()> {
        self.state().window_mut(handle)?.enabled = enabled;
        Ok(())
    }

    fn set_parent(
        &mut self,
        handle: NativeHandle,
        parent: Option<NativeHandle>,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        if let Some(p) = parent {
            state.window(p)?;
        }
        let old_parent = state.window(handle)?.parent;
        if old_parent == parent {
            return Ok(());
        }
        state.unlink(handle, old_parent);
        state.z_order.entry(parent).or_default().insert(0, handle);
        state.window_mut(handle)?.parent = parent;
        Ok(())
    }

    fn set_z_order(
        &mut self,
        handle: NativeHandle,
        position: ZOrderPosition,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        let parent = state.window(handle)?.parent;
        let siblings = state.z_order.entry(parent).or_default();
        siblings.retain(|h| *h != handle);
        let index = match position {
            ZOrderPosition::Top => 0,
            ZOrderPosition::Bottom => siblings.len(),
            ZOrderPosition::After(anchor) => siblings
                .iter()
                .position(|h| *h == anchor)
                .map_or(siblings.len(), |i| i + 1),
        };
        siblings.insert(index, handle);
        Ok(())
    }

    fn set_capture(&mut self, handle: NativeHandle) -> PlatformResult<()> {
        let mut state = self.state();
        state.window(handle)?;
        let previous = state.capture.replace(handle);
        if let Some(old) = previous.filter(|old| *old != handle) {
            state.send(Message::new(
                old,
                MessageKind::CaptureChanged,
                0,
                handle.0 as isize,
            ));
        }
        Ok(())
    }

    fn release_capture(&mut self) -> PlatformResult<()> {
        let mut state = self.state();
        if let Some(old) = state.capture.take() {
            state.send(Message::simple(old, MessageKind::CaptureChanged));
        }
        Ok(())
    }

    fn set_cursor(&mut self, handle: NativeHandle, cursor: Cursor) -> PlatformResult<()> {
        self.state().window_mut(handle)?.cursor = cursor;
        Ok(())
    }

    fn set_focus(&mut self, handle: NativeHandle) -> PlatformResult<()> {
        let mut state = self.state();
        state.window(handle)?;
        let previous = state.focus.replace(handle);
        if previous == Some(handle) {
            return Ok(());
        }
        if let Some(old) = previous {
            state.send(Message::new(
                old,
                MessageKind::KillFocus,
                handle.0 as usize,
                0,
            ));
        }
        state.send(Message::new(
            handle,
            MessageKind::SetFocus,
            previous.map_or(0, |h| h.0 as usize),
            0,
        ));
        Ok(())
    }

    fn get_window_rect(&self, handle: NativeHandle) -> PlatformResult<Rect> {
        Ok(self.state().window(handle)?.rect)
    }

    fn adjust_window_rect(
        &self,
        client: Size,
        style: WindowStyle,
        ex_style: ExWindowStyle,
    ) -> PlatformResult<Size> {
        if self.state().fail_adjust {
            return Err(PlatformError::OperationFailed(
                "adjust_window_rect failing on request".to_string(),
            ));
        }
        let mut size = client;
        if style.contains(WindowStyle::BORDER) {
            size.width += 2;
            size.height += 2;
        }
        if ex_style.contains(ExWindowStyle::CLIENT_EDGE) {
            size.width += 4;
            size.height += 4;
        }
        if style.contains(WindowStyle::CAPTION) {
            size.height += CAPTION_HEIGHT;
        }
        Ok(size)
    }

    fn invalidate(&mut self, handle: NativeHandle, rect: Rect) -> PlatformResult<()> {
        let mut state = self.state();
        let window = state.window_mut(handle)?;
        if let Some(area) = rect.intersect(&Rect::from_size(window.rect.size())) {
            window.invalid.union_rect(area);
        }
        Ok(())
    }

    fn update(&mut self, handle: NativeHandle) -> PlatformResult<()> {
        let mut state = self.state();
        let window = state.window(handle)?;
        if window.visible && !window.invalid.is_empty() {
            state.send(Message::simple(handle, MessageKind::Paint));
        }
        Ok(())
    }

    fn begin_paint(&mut self, handle: NativeHandle) -> PlatformResult<(Box<dyn Graphics>, Rect)> {
        let mut state = self.state();
        let window = state.window_mut(handle)?;
        let update_rect = window.invalid.bounds();
        window.invalid.clear();
        let mut surface = DisplayList::new(window.rect.size());
        surface.set_clip(update_rect);
        Ok((Box::new(surface), update_rect))
    }

    fn end_paint(
        &mut self,
        handle: NativeHandle,
        graphics: Box<dyn Graphics>,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        state.window(handle)?;
        if let Some(list) = graphics.into_display_list() {
            state.painted.entry(handle).or_default().push(list);
        }
        Ok(())
    }

    fn set_clip_region(
        &mut self,
        handle: NativeHandle,
        region: Option<&Region>,
    ) -> PlatformResult<()> {
        self.state().window_mut(handle)?.clip_region = region.cloned();
        Ok(())
    }

    fn set_allow_drop(&mut self, handle: NativeHandle, allow: bool) -> PlatformResult<()> {
        self.state().window_mut(handle)?.allow_drop = allow;
        Ok(())
    }

    fn async_channel(&self) -> Arc<dyn AsyncMethodChannel> {
        Arc::new(HeadlessChannel {
            state: Arc::clone(&self.state),
        })
    }

    fn drain_sent_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.state().sent)
    }

    fn take_posted_message(&mut self) -> Option<Message> {
        let mut state = self.state();
        if let Some(msg) = state.posted.pop_front() {
            return Some(msg);
        }
        // Paint is synthesized only once the queue is empty, lowest handle first.
        state
            .windows
            .iter()
            .filter(|(_, w)| w.visible && !w.invalid.is_empty())
            .map(|(h, _)| *h)
            .min()
            .map(|h| Message::simple(h, MessageKind::Paint))
    }

    fn modifier_keys(&self) -> Keys {
        self.state().modifiers
    }

    fn default_proc(&mut self, msg: &mut Message) {
        if msg.kind == MessageKind::Paint {
            if let Some(window) = self.state().windows.get_mut(&msg.handle) {
                window.invalid.clear();
            }
        }
        msg.result = 0;
    }
}
