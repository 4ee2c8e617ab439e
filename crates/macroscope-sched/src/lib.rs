//! Macroscope Single-Flight AST Access
//!
//! At most one parse/AST-traversal operation runs system-wide at a
//! time. Callers submit read-only operations against a source unit;
//! the operation runs on the service's worker thread, serialized by
//! one shared exclusivity token, while the caller blocks on a
//! completion latch. Two priority classes exist: interactive requests
//! are served strictly ahead of decorate (speculative) requests, FIFO
//! within a class.
//!
//! Cancellation is cooperative and advisory: the worker checks the
//! cancel flag at its safe points and discards any partially computed
//! result. Every failure path degrades to "no result"; nothing here
//! panics the surrounding process.

pub mod token;

pub use token::{ExclusiveToken, TokenGuard};

use macroscope_core::config::EngineConfig;
use macroscope_core::Result;
use macroscope_parser::cache::{hash_content, UnitCache};
use macroscope_parser::treesitter::CParser;
use macroscope_parser::ParsedUnit;
use std::any::Any;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Scheduling class for a submitted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// User explicitly requested exploration; runs ahead of queued
    /// background work
    Interactive,
    /// Speculative, hover-triggered work; may be delayed behind
    /// interactive requests
    Decorate,
}

/// Lifecycle of a submitted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Identifies the unit an operation needs, plus an optional
/// consistency precondition on its content.
#[derive(Debug, Clone)]
pub struct UnitRequest {
    /// Path of the source unit
    pub path: PathBuf,
    /// When set, the operation declines unless the unit's current
    /// content hash matches
    pub expected_hash: Option<u64>,
}

impl UnitRequest {
    /// Request the unit regardless of its current content
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            expected_hash: None,
        }
    }

    /// Require the unit content to hash to `hash`
    pub fn consistent_with(mut self, hash: u64) -> Self {
        self.expected_hash = Some(hash);
        self
    }
}

/// Supplies parsed units to the worker.
///
/// `Ok(None)` means the unit is unavailable or inconsistent with the
/// request; the operation then completes with no result instead of
/// running.
pub trait UnitProvider: Send + Sync + 'static {
    fn obtain(&self, request: &UnitRequest) -> Result<Option<Arc<ParsedUnit>>>;
}

/// File-backed provider with an LRU unit cache
pub struct FileProvider {
    cache: UnitCache,
    engine_config: EngineConfig,
}

impl FileProvider {
    /// Create a provider with default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a provider with a custom engine configuration
    pub fn with_config(engine_config: EngineConfig) -> Self {
        Self {
            cache: UnitCache::default(),
            engine_config,
        }
    }
}

impl Default for FileProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitProvider for FileProvider {
    fn obtain(&self, request: &UnitRequest) -> Result<Option<Arc<ParsedUnit>>> {
        let source = std::fs::read_to_string(&request.path)?;
        let hash = hash_content(&source);

        if let Some(expected) = request.expected_hash {
            if expected != hash {
                debug!("Unit {:?} inconsistent with request", request.path);
                return Ok(None);
            }
        }

        if let Some(unit) = self.cache.get(&request.path, hash) {
            return Ok(Some(unit));
        }

        let mut parser = CParser::with_config(self.engine_config.clone());
        let unit = parser.parse_source(&source, &request.path.to_string_lossy())?;
        Ok(Some(self.cache.insert(request.path.clone(), unit)))
    }
}

type BoxedOutput = Box<dyn Any + Send>;
type BoxedOp = Box<dyn FnOnce(&ParsedUnit) -> BoxedOutput + Send>;

struct TaskInner {
    state: TaskState,
    result: Option<BoxedOutput>,
}

struct TaskShared {
    inner: Mutex<TaskInner>,
    done: Condvar,
    cancel: AtomicBool,
}

impl TaskShared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(TaskInner {
                state: TaskState::Idle,
                result: None,
            }),
            done: Condvar::new(),
            cancel: AtomicBool::new(false),
        })
    }

    fn set_state(&self, state: TaskState) {
        lock_ignore_poison(&self.inner).state = state;
    }

    fn complete(&self, state: TaskState, result: Option<BoxedOutput>) {
        let mut inner = lock_ignore_poison(&self.inner);
        inner.state = state;
        inner.result = result;
        drop(inner);
        self.done.notify_all();
    }
}

/// Requests cancellation of one submitted operation
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<TaskShared>,
}

impl CancelHandle {
    /// Advise the worker to abandon the operation. Best-effort: an
    /// operation already past its last safe point still completes, but
    /// the caller receives no result either way.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }
}

/// A submitted operation awaiting completion
pub struct PendingTask<T> {
    shared: Arc<TaskShared>,
    _marker: PhantomData<T>,
}

impl<T: Send + 'static> PendingTask<T> {
    /// Block until the operation completes, is cancelled, or fails.
    /// Returns `None` on every path but successful completion with a
    /// result.
    pub fn wait(self) -> Option<T> {
        let mut inner = lock_ignore_poison(&self.shared.inner);
        while !matches!(
            inner.state,
            TaskState::Completed | TaskState::Cancelled | TaskState::Failed
        ) {
            inner = self
                .shared
                .done
                .wait(inner)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        let output = inner.result.take()?;
        drop(inner);
        *output.downcast::<Option<T>>().ok()?
    }

    /// Handle for cancelling from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: self.shared.clone(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        lock_ignore_poison(&self.shared.inner).state
    }
}

struct QueuedTask {
    request: UnitRequest,
    op: BoxedOp,
    shared: Arc<TaskShared>,
}

#[derive(Default)]
struct Queues {
    interactive: VecDeque<QueuedTask>,
    decorate: VecDeque<QueuedTask>,
}

impl Queues {
    fn pop(&mut self) -> Option<QueuedTask> {
        self.interactive
            .pop_front()
            .or_else(|| self.decorate.pop_front())
    }

    fn drain(&mut self) -> Vec<QueuedTask> {
        self.interactive
            .drain(..)
            .chain(self.decorate.drain(..))
            .collect()
    }
}

struct ServiceInner {
    provider: Box<dyn UnitProvider>,
    queues: Mutex<Queues>,
    available: Condvar,
    token: ExclusiveToken,
    shutdown: AtomicBool,
}

/// Single-flight AST access service.
///
/// Owns one worker thread and the one exclusivity token. Dropping the
/// service stops the worker; queued operations complete as cancelled.
pub struct AstService {
    inner: Arc<ServiceInner>,
    worker: Option<JoinHandle<()>>,
}

impl AstService {
    /// Create a service over a unit provider
    pub fn new(provider: impl UnitProvider) -> Self {
        let inner = Arc::new(ServiceInner {
            provider: Box::new(provider),
            queues: Mutex::new(Queues::default()),
            available: Condvar::new(),
            token: ExclusiveToken::new(),
            shutdown: AtomicBool::new(false),
        });

        let worker_inner = inner.clone();
        let worker = std::thread::spawn(move || worker_loop(worker_inner));

        Self {
            inner,
            worker: Some(worker),
        }
    }

    /// Submit an operation without waiting
    pub fn submit<T, F>(&self, request: UnitRequest, priority: Priority, op: F) -> PendingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(&ParsedUnit) -> Option<T> + Send + 'static,
    {
        let shared = TaskShared::new();
        shared.set_state(TaskState::Queued);

        let boxed: BoxedOp = Box::new(move |unit| Box::new(op(unit)) as BoxedOutput);
        let task = QueuedTask {
            request,
            op: boxed,
            shared: shared.clone(),
        };

        let mut queues = lock_ignore_poison(&self.inner.queues);
        match priority {
            Priority::Interactive => queues.interactive.push_back(task),
            Priority::Decorate => queues.decorate.push_back(task),
        }
        drop(queues);
        self.inner.available.notify_all();

        PendingTask {
            shared,
            _marker: PhantomData,
        }
    }

    /// Submit an operation and block until it completes.
    ///
    /// Returns `None` when the unit is unavailable or inconsistent,
    /// the operation is cancelled, or it produces no result.
    pub fn run_exclusive<T, F>(&self, request: UnitRequest, priority: Priority, op: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&ParsedUnit) -> Option<T> + Send + 'static,
    {
        self.submit(request, priority, op).wait()
    }

    /// The shared exclusivity token, for instrumentation
    pub fn token(&self) -> &ExclusiveToken {
        &self.inner.token
    }
}

impl Drop for AstService {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.available.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(inner: Arc<ServiceInner>) {
    loop {
        let task = {
            let mut queues = lock_ignore_poison(&inner.queues);
            loop {
                if inner.shutdown.load(Ordering::SeqCst) {
                    for task in queues.drain() {
                        task.shared.complete(TaskState::Cancelled, None);
                    }
                    return;
                }
                if let Some(task) = queues.pop() {
                    break task;
                }
                queues = inner
                    .available
                    .wait(queues)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        };

        if task.shared.cancel.load(Ordering::SeqCst) {
            task.shared.complete(TaskState::Cancelled, None);
            continue;
        }
        task.shared.set_state(TaskState::Running);

        let _guard = inner.token.acquire();
        let unit = match inner.provider.obtain(&task.request) {
            Ok(Some(unit)) => unit,
            Ok(None) => {
                task.shared.complete(TaskState::Completed, None);
                continue;
            }
            Err(err) => {
                warn!("Unit provider failed for {:?}: {}", task.request.path, err);
                task.shared.complete(TaskState::Failed, None);
                continue;
            }
        };

        if task.shared.cancel.load(Ordering::SeqCst) {
            task.shared.complete(TaskState::Cancelled, None);
            continue;
        }

        let output = (task.op)(&unit);

        if task.shared.cancel.load(Ordering::SeqCst) {
            // Partially computed results are discarded, not returned.
            task.shared.complete(TaskState::Cancelled, None);
            continue;
        }
        task.shared.complete(TaskState::Completed, Some(output));
    }
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
