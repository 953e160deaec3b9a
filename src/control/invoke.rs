/*
 * Cross-thread marshaling.
 *
 * A `Marshaler` is the only part of the tree other threads may hold. It posts
 * a callable to the nearest ancestor-or-self of the target control that has a
 * native handle and wakes the owning thread through the platform's async
 * method channel; the owning thread runs the queued calls when the wake-up
 * arrives in its pump.
 *
 * The marshaler sees the tree through a small route table (parent link,
 * handle, owning thread per control) that the tree keeps current. Calls are
 * queued per handle. While a handle is being recreated its queue is parked
 * and moved to the new handle once the recreation completes.
 */
use super::ControlTree;
use crate::error::{ControlError, Result};
use crate::platform::{AsyncMethodChannel, NativeHandle};
use crate::types::ControlId;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::ThreadId;

static NEXT_MARSHALER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_CONTEXT: RefCell<AmbientContext> = RefCell::new(AmbientContext::default());
}

/*
 * Per-thread ambient values (request ids, culture, correlation data). A
 * snapshot is taken on `begin_invoke` and installed around the marshaled call,
 * unless the configuration suppresses context flow.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientContext {
    values: BTreeMap<String, String>,
}

impl AmbientContext {
    /// Snapshot of the calling thread's context.
    pub fn capture() -> Self {
        CURRENT_CONTEXT.with(|current| current.borrow().clone())
    }

    pub fn get(key: &str) -> Option<String> {
        CURRENT_CONTEXT.with(|current| current.borrow().values.get(key).cloned())
    }

    pub fn set(key: &str, value: &str) {
        CURRENT_CONTEXT.with(|current| {
            current
                .borrow_mut()
                .values
                .insert(key.to_string(), value.to_string());
        });
    }

    pub fn remove(key: &str) {
        CURRENT_CONTEXT.with(|current| {
            current.borrow_mut().values.remove(key);
        });
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Installs this context on the current thread until the guard drops.
    pub fn enter(self) -> ContextGuard {
        let previous = CURRENT_CONTEXT.with(|current| current.replace(self));
        ContextGuard {
            previous: Some(previous),
        }
    }
}

/// Restores the previous ambient context on drop.
pub struct ContextGuard {
    previous: Option<AmbientContext>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT_CONTEXT.with(|current| {
                current.replace(previous);
            });
        }
    }
}

type Callback = Box<dyn FnOnce(&mut ControlTree) -> Box<dyn Any + Send> + Send>;
type Outcome = Result<Box<dyn Any + Send>>;

enum CompletionState {
    Pending,
    Ready(Outcome),
    Consumed,
}

pub(crate) struct Completion {
    state: Mutex<CompletionState>,
    ready: Condvar,
    /// Thread that will run the call.
    runner: Option<ThreadId>,
}

impl Completion {
    fn new(runner: Option<ThreadId>) -> Self {
        Self {
            state: Mutex::new(CompletionState::Pending),
            ready: Condvar::new(),
            runner,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CompletionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn complete(&self, outcome: Outcome) {
        let mut state = self.lock();
        if matches!(*state, CompletionState::Pending) {
            *state = CompletionState::Ready(outcome);
            self.ready.notify_all();
        }
    }

    fn is_completed(&self) -> bool {
        !matches!(*self.lock(), CompletionState::Pending)
    }

    /// The outcome if the call has run; `None` while it is still queued.
    fn take(&self) -> Option<Outcome> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, CompletionState::Consumed) {
            CompletionState::Pending => {
                *state = CompletionState::Pending;
                None
            }
            CompletionState::Ready(outcome) => Some(outcome),
            CompletionState::Consumed => Some(Err(ControlError::InvalidOperation(
                "end_invoke was already called for this result".to_string(),
            ))),
        }
    }

    fn wait_take(&self) -> Outcome {
        let mut state = self.lock();
        while matches!(*state, CompletionState::Pending) {
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        match std::mem::replace(&mut *state, CompletionState::Consumed) {
            CompletionState::Ready(outcome) => outcome,
            _ => Err(ControlError::InvalidOperation(
                "end_invoke was already called for this result".to_string(),
            )),
        }
    }
}

struct PendingCall {
    callback: Callback,
    context: Option<AmbientContext>,
    completion: Arc<Completion>,
}

/// Handle to the outcome of a `begin_invoke`.
pub struct AsyncResult<T> {
    completion: Arc<Completion>,
    marshaler: u64,
    _result: PhantomData<fn() -> T>,
}

impl<T> Clone for AsyncResult<T> {
    fn clone(&self) -> Self {
        Self {
            completion: Arc::clone(&self.completion),
            marshaler: self.marshaler,
            _result: PhantomData,
        }
    }
}

impl<T> fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("marshaler", &self.marshaler)
            .field("completed", &self.completion.is_completed())
            .finish()
    }
}

impl<T> AsyncResult<T> {
    pub fn is_completed(&self) -> bool {
        self.completion.is_completed()
    }
}

impl<T: 'static> AsyncResult<T> {
    fn unbox(outcome: Outcome) -> Result<T> {
        let value = outcome?;
        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            ControlError::InvalidOperation("marshaled result has an unexpected type".to_string())
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Route {
    handle: Option<NativeHandle>,
    parent: Option<ControlId>,
    owner: Option<ThreadId>,
}

#[derive(Default)]
struct MarshalState {
    routes: HashMap<ControlId, Route>,
    queues: HashMap<NativeHandle, VecDeque<PendingCall>>,
    recreating: HashSet<NativeHandle>,
}

impl MarshalState {
    /// Nearest ancestor-or-self of `id` with a live handle.
    fn resolve(&self, id: ControlId) -> Option<Route> {
        let mut current = Some(id);
        while let Some(c) = current {
            let route = self.routes.get(&c)?;
            if route.handle.is_some() {
                return Some(*route);
            }
            current = route.parent;
        }
        None
    }
}

/// State shared between the tree and its marshalers.
pub(crate) struct MarshalShared {
    id: u64,
    state: Mutex<MarshalState>,
}

impl MarshalShared {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_MARSHALER_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(MarshalState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MarshalState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_owner<T>(&self, result: &AsyncResult<T>) -> Result<()> {
        if result.marshaler != self.id {
            return Err(ControlError::InvalidOperation(
                "end_invoke called with a result from a different marshaler".to_string(),
            ));
        }
        Ok(())
    }

    /*
     * A control whose handle is being recreated keeps routing to its old
     * handle, so calls posted meanwhile land in the parked queue.
     */
    fn update_route(
        &self,
        id: ControlId,
        handle: Option<NativeHandle>,
        parent: Option<ControlId>,
        owner: Option<ThreadId>,
        keep_handle: bool,
    ) {
        let mut state = self.lock();
        let route = state.routes.entry(id).or_default();
        if handle.is_some() || !keep_handle {
            route.handle = handle;
        }
        route.parent = parent;
        route.owner = owner;
    }

    pub(crate) fn remove_route(&self, id: ControlId) {
        self.lock().routes.remove(&id);
    }

    pub(crate) fn set_recreating(&self, handle: NativeHandle, recreating: bool) {
        let mut state = self.lock();
        if recreating {
            state.recreating.insert(handle);
        } else {
            state.recreating.remove(&handle);
        }
    }

    /*
     * Moves the parked queue of `old` in front of `new`'s and points routes at
     * `new`. Returns whether anything moved, i.e. whether `new` needs a wake-up.
     */
    pub(crate) fn rekey(&self, old: NativeHandle, new: NativeHandle) -> bool {
        let mut state = self.lock();
        state.recreating.remove(&old);
        for route in state.routes.values_mut() {
            if route.handle == Some(old) {
                route.handle = Some(new);
            }
        }
        let Some(mut moved) = state.queues.remove(&old) else {
            return false;
        };
        if moved.is_empty() {
            return false;
        }
        let count = moved.len();
        if let Some(existing) = state.queues.remove(&new) {
            moved.extend(existing);
        }
        state.queues.insert(new, moved);
        log::debug!("Invoke: moved {count} queued call(s) from {old:?} to {new:?}");
        true
    }

    /// Completes every call queued for `handle` with `InvalidOperation(reason)`.
    pub(crate) fn fail_pending(&self, handle: NativeHandle, reason: String) {
        let failed = self.lock().queues.remove(&handle).unwrap_or_default();
        if failed.is_empty() {
            return;
        }
        log::warn!("Invoke: failing {} queued call(s): {reason}", failed.len());
        for call in failed {
            call.completion
                .complete(Err(ControlError::InvalidOperation(reason.clone())));
        }
    }

    fn pop(&self, handle: NativeHandle) -> Option<PendingCall> {
        let mut state = self.lock();
        let queue = state.queues.get_mut(&handle)?;
        let call = queue.pop_front();
        if queue.is_empty() {
            state.queues.remove(&handle);
        }
        call
    }

    fn queued_handles(&self) -> Vec<NativeHandle> {
        self.lock().queues.keys().copied().collect()
    }
}

/// Thread-safe entry point for running code on the thread that owns a control.
#[derive(Clone)]
pub struct Marshaler {
    shared: Arc<MarshalShared>,
    channel: Arc<dyn AsyncMethodChannel>,
    flow_context: bool,
}

impl fmt::Debug for Marshaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marshaler")
            .field("id", &self.shared.id)
            .field("flow_context", &self.flow_context)
            .finish()
    }
}

impl Marshaler {
    /// Whether the calling thread differs from the one owning `id`'s handle.
    pub fn invoke_required(&self, id: ControlId) -> bool {
        self.shared
            .lock()
            .resolve(id)
            .and_then(|route| route.owner)
            .is_some_and(|owner| owner != std::thread::current().id())
    }

    /*
     * Queues `f` for the owning thread of `id` (or of its nearest ancestor with
     * a handle) and returns without waiting. Fails with `InvalidOperation`
     * when no handle exists anywhere up the chain.
     */
    pub fn begin_invoke<T, F>(&self, id: ControlId, f: F) -> Result<AsyncResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut ControlTree) -> T + Send + 'static,
    {
        let context = self.flow_context.then(AmbientContext::capture);
        let (handle, completion, needs_post) = {
            let mut state = self.shared.lock();
            let Some(route) = state.resolve(id) else {
                return Err(ControlError::InvalidOperation(format!(
                    "cannot invoke on {id:?}: no native handle in its parent chain"
                )));
            };
            let Some(handle) = route.handle else {
                return Err(ControlError::InvalidOperation(format!(
                    "cannot invoke on {id:?}: no native handle"
                )));
            };
            let completion = Arc::new(Completion::new(route.owner));
            let parked = state.recreating.contains(&handle);
            let queue = state.queues.entry(handle).or_default();
            let needs_post = queue.is_empty() && !parked;
            queue.push_back(PendingCall {
                callback: Box::new(move |tree: &mut ControlTree| {
                    Box::new(f(tree)) as Box<dyn Any + Send>
                }),
                context,
                completion: Arc::clone(&completion),
            });
            (handle, completion, needs_post)
        };
        log::trace!("Invoke: queued call for {id:?} on {handle:?}");

        if needs_post && let Err(err) = self.channel.post(handle) {
            let mut state = self.shared.lock();
            if !state.recreating.contains(&handle) {
                if let Some(queue) = state.queues.get_mut(&handle) {
                    queue.retain(|call| !Arc::ptr_eq(&call.completion, &completion));
                    if queue.is_empty() {
                        state.queues.remove(&handle);
                    }
                }
                log::warn!("Invoke: posting to {handle:?} failed: {err}");
                return Err(err.into());
            }
            log::debug!("Invoke: {handle:?} is being recreated, call stays queued");
        }

        Ok(AsyncResult {
            completion,
            marshaler: self.shared.id,
            _result: PhantomData,
        })
    }

    /*
     * Waits for the call behind `result` and returns its value. On the thread
     * that has to run the call this would never return; the tree's
     * `end_invoke` pumps instead.
     */
    pub fn end_invoke<T: 'static>(&self, result: &AsyncResult<T>) -> Result<T> {
        self.shared.check_owner(result)?;
        if result.completion.runner == Some(std::thread::current().id()) {
            return match result.completion.take() {
                Some(outcome) => AsyncResult::<T>::unbox(outcome),
                None => Err(ControlError::InvalidOperation(
                    "end_invoke would block the owning thread; use ControlTree::end_invoke"
                        .to_string(),
                )),
            };
        }
        AsyncResult::<T>::unbox(result.completion.wait_take())
    }

    /// Runs `f` on the owning thread and blocks until it has run.
    pub fn invoke<T, F>(&self, id: ControlId, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ControlTree) -> T + Send + 'static,
    {
        if self.shared.lock().resolve(id).and_then(|r| r.owner) == Some(std::thread::current().id())
        {
            return Err(ControlError::InvalidOperation(
                "invoke from the owning thread must go through ControlTree::invoke".to_string(),
            ));
        }
        let pending = self.begin_invoke(id, f)?;
        self.end_invoke(&pending)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl ControlTree {
    pub fn marshaler(&self) -> Marshaler {
        Marshaler {
            shared: Arc::clone(&self.marshal),
            channel: self.platform.async_channel(),
            flow_context: !self.config.suppress_context_flow,
        }
    }

    pub fn begin_invoke<T, F>(&mut self, id: ControlId, f: F) -> Result<AsyncResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut ControlTree) -> T + Send + 'static,
    {
        self.marshaler().begin_invoke(id, f)
    }

    /*
     * Runs `f` right away on the owning thread. Calls already queued for the
     * same handle run first so marshaled work keeps its order.
     */
    pub fn invoke<T, F>(&mut self, id: ControlId, f: F) -> Result<T>
    where
        F: FnOnce(&mut ControlTree) -> T,
    {
        self.check_thread(id)?;
        let Some(handle) = self.marshal.lock().resolve(id).and_then(|r| r.handle) else {
            return Err(ControlError::InvalidOperation(format!(
                "cannot invoke on {id:?}: no native handle in its parent chain"
            )));
        };
        self.invoke_marshaled_callbacks(handle);
        Ok(f(self))
    }

    /// Pumps until the call behind `result` has run, then returns its value.
    pub fn end_invoke<T: 'static>(&mut self, result: &AsyncResult<T>) -> Result<T> {
        self.marshal.check_owner(result)?;
        loop {
            if let Some(outcome) = result.completion.take() {
                return AsyncResult::<T>::unbox(outcome);
            }
            if self.pump_one() {
                continue;
            }
            let runnable: Vec<NativeHandle> = self
                .marshal
                .queued_handles()
                .into_iter()
                .filter(|h| self.handle_map.contains_key(h))
                .collect();
            if runnable.is_empty() {
                return Err(ControlError::InvalidOperation(
                    "marshaled call can no longer run".to_string(),
                ));
            }
            for handle in runnable {
                self.invoke_marshaled_callbacks(handle);
            }
        }
    }

    pub(crate) fn sync_route(&self, id: ControlId) {
        match self.controls.get(&id) {
            Some(data) => self.marshal.update_route(
                id,
                data.handle,
                data.parent,
                data.owning_thread,
                self.recreating.contains(&id),
            ),
            None => self.marshal.remove_route(id),
        }
    }

    /// Runs every call queued for `handle`, including ones queued meanwhile.
    pub(crate) fn invoke_marshaled_callbacks(&mut self, handle: NativeHandle) {
        let mut ran = 0;
        while let Some(call) = self.marshal.pop(handle) {
            let _context = call.context.map(AmbientContext::enter);
            let callback = call.callback;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(self)))
                .map_err(|payload| ControlError::InvocationPanicked(panic_message(&*payload)));
            if let Err(err) = &outcome {
                log::error!("Invoke: marshaled call on {handle:?} failed: {err}");
            }
            call.completion.complete(outcome);
            ran += 1;
        }
        if ran > 0 {
            log::trace!("Invoke: ran {ran} marshaled call(s) on {handle:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolkitConfig;
    use crate::control::test_support::*;
    use crate::platform::headless::HeadlessPlatform;
    use crate::types::Rect;
    use std::thread;

    fn pump_until_finished<T>(tree: &mut ControlTree, worker: &thread::JoinHandle<T>) {
        while !worker.is_finished() {
            tree.pump();
            thread::yield_now();
        }
    }

    #[test]
    fn begin_invoke_from_a_worker_runs_when_the_owner_pumps() {
        // Arrange
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let marshaler = tree.marshaler();

        // Act
        let pending = thread::spawn(move || {
            marshaler
                .begin_invoke(root, move |tree| tree.name(root).map(str::to_string))
                .unwrap()
        })
        .join()
        .unwrap();
        assert!(!pending.is_completed());
        tree.pump();

        // Assert
        assert!(pending.is_completed());
        assert_eq!(tree.end_invoke(&pending).unwrap(), Some("root".to_string()));
    }

    #[test]
    fn blocking_invoke_waits_for_the_owning_thread() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let marshaler = tree.marshaler();

        let worker = thread::spawn(move || {
            marshaler.invoke(root, move |tree| {
                tree.set_text(root, "from worker").unwrap();
                7
            })
        });
        pump_until_finished(&mut tree, &worker);

        assert_eq!(worker.join().unwrap().unwrap(), 7);
        assert_eq!(tree.text(root), Some("from worker"));
    }

    #[test]
    fn calls_target_the_nearest_ancestor_with_a_handle() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let hidden = tree.create(crate::control::ControlOptions::new("hidden").hidden());
        tree.add(root, hidden).unwrap();
        assert!(!tree.is_handle_created(hidden));

        let pending = tree.begin_invoke(hidden, |_| "ran").unwrap();

        assert_eq!(tree.end_invoke(&pending).unwrap(), "ran");
    }

    #[test]
    fn invoke_without_any_handle_is_an_invalid_operation() {
        let (mut tree, _platform) = tree();
        let orphan = tree.new_control("orphan");

        let err = tree.begin_invoke(orphan, |_| ()).unwrap_err();

        assert!(matches!(err, ControlError::InvalidOperation(_)));
    }

    #[test]
    fn end_invoke_twice_or_with_a_foreign_result_fails() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let (mut other, _other_platform) = crate::control::test_support::tree();
        let other_root = shown_root(&mut other, Rect::new(0, 0, 50, 50));
        let pending = tree.begin_invoke(root, |_| 1).unwrap();
        let foreign = other.begin_invoke(other_root, |_| 2).unwrap();

        assert_eq!(tree.end_invoke(&pending).unwrap(), 1);

        assert!(matches!(
            tree.end_invoke(&pending),
            Err(ControlError::InvalidOperation(_))
        ));
        assert!(matches!(
            tree.end_invoke(&foreign),
            Err(ControlError::InvalidOperation(_))
        ));
    }

    #[test]
    fn panicking_calls_complete_with_an_error() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));

        let pending = tree
            .begin_invoke(root, |_| -> u32 { panic!("boom") })
            .unwrap();

        match tree.end_invoke(&pending) {
            Err(ControlError::InvocationPanicked(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn destroying_the_handle_fails_queued_calls() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let pending = tree.begin_invoke(root, |_| ()).unwrap();

        tree.destroy_handle(root).unwrap();

        assert!(pending.is_completed());
        assert!(matches!(
            tree.end_invoke(&pending),
            Err(ControlError::InvalidOperation(_))
        ));
    }

    #[test]
    fn queued_calls_survive_handle_recreation() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let old = tree.try_handle(root).unwrap();
        let pending = tree
            .begin_invoke(root, move |tree| tree.try_handle(root))
            .unwrap();

        tree.recreate_handle(root).unwrap();
        let new = tree.try_handle(root).unwrap();
        assert_ne!(old, new);

        assert_eq!(tree.end_invoke(&pending).unwrap(), Some(new));
    }

    #[test]
    fn ambient_context_flows_unless_suppressed() {
        for (suppressed, expected) in [(false, Some("42".to_string())), (true, None)] {
            let platform = HeadlessPlatform::new();
            let config = ToolkitConfig::default().with_context_flow_suppressed(suppressed);
            let mut tree = ControlTree::new(Box::new(platform), config);
            let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
            let marshaler = tree.marshaler();

            let pending = thread::spawn(move || {
                AmbientContext::set("request", "42");
                marshaler
                    .begin_invoke(root, |_| AmbientContext::get("request"))
                    .unwrap()
            })
            .join()
            .unwrap();

            assert_eq!(tree.end_invoke(&pending).unwrap(), expected);
            assert_eq!(AmbientContext::get("request"), None);
        }
    }

    #[test]
    fn tree_invoke_runs_inline_after_queued_calls() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let queued = tree
            .begin_invoke(root, move |tree| tree.set_text(root, "queued").unwrap())
            .unwrap();

        let seen = tree
            .invoke(root, |tree| tree.text(root).map(str::to_string))
            .unwrap();

        assert_eq!(seen, Some("queued".to_string()));
        assert!(queued.is_completed());
    }

    #[test]
    fn marshaler_refuses_to_block_the_owning_thread() {
        let (mut tree, _platform) = tree();
        let root = shown_root(&mut tree, Rect::new(0, 0, 50, 50));
        let marshaler = tree.marshaler();

        assert!(!marshaler.invoke_required(root));
        assert!(matches!(
            marshaler.invoke(root, |_| ()),
            Err(ControlError::InvalidOperation(_))
        ));
        let pending = marshaler.begin_invoke(root, |_| 3).unwrap();
        assert!(matches!(
            marshaler.end_invoke(&pending),
            Err(ControlError::InvalidOperation(_))
        ));
        assert_eq!(tree.end_invoke(&pending).unwrap(), 3);
    }
}
