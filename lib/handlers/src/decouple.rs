use crate::{close_quietly, is_nop, Handler, HandlerRef};
use rdf_flow_common::{
    ErrorAggregator, HandlerError, HandlerResult, MutexExt, PoolTask, RwLockExt, WorkerPool,
};
use rdf_flow_model::{Quad, QuadRef};
use rustc_hash::FxHashSet;
use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};

/// Number of statements buffered before they are handed to a background task.
pub const BUFFER_SIZE: usize = 4 * 1024;

/// Upper bound of the sampling fraction, used once every pool thread is busy producing.
const MAX_FRACTION: usize = 1000;

/// Returns a handler that forwards part of the statements from a background thread.
///
/// Nop handlers and handlers that are already decoupled are returned as is.
pub fn decouple(handler: HandlerRef) -> HandlerRef {
    if is_nop(&handler) || handler.as_any().is::<Decoupler>() {
        return handler;
    }
    Arc::new(Decoupler::new(handler))
}

/// A handler that moves part of the downstream work off the producing threads.
///
/// # Buffering
///
/// Every `fraction`-th statement is copied into a buffer of [BUFFER_SIZE] slots, all other
/// statements are forwarded directly on the calling thread. Once the buffer is full, it is
/// swapped for an empty one and a task on the [WorkerPool] forwards its content.
///
/// # Adaptive fraction
///
/// Each time a buffer is drained, the fraction is recomputed from the number of distinct threads
/// that filled a buffer (`observed`) and the capacity of the pool:
/// `capacity / (capacity - observed)`, or [MAX_FRACTION] once `observed >= capacity`. Few
/// producers thus hand most statements to the pool, while many producers keep their statements
/// and leave the pool to the other work.
///
/// # Guarantees
///
/// Every statement is forwarded exactly once. The order of statements is not preserved. Once
/// [Handler::end] returns successfully, every statement of the pass has reached the downstream
/// handler. Once it returns at all, no background task is forwarding anymore. A
/// failure of a background task is reported by the next `statement` call that fills a buffer or
/// by `end`.
#[derive(Debug)]
pub struct Decoupler {
    state: Arc<DecoupleState>,
    pool: OnceLock<WorkerPool>,
}

impl Decoupler {
    /// Creates a decoupler that uses [WorkerPool::shared].
    pub fn new(handler: HandlerRef) -> Self {
        Self {
            state: Arc::new(DecoupleState::new(handler)),
            pool: OnceLock::new(),
        }
    }

    /// Creates a decoupler that runs its background tasks on `pool`.
    pub fn with_pool(handler: HandlerRef, pool: WorkerPool) -> Self {
        Self {
            state: Arc::new(DecoupleState::new(handler)),
            pool: OnceLock::from(pool),
        }
    }

    /// Returns the current sampling fraction.
    pub fn fraction(&self) -> usize {
        self.state.fraction.load(Ordering::Acquire)
    }

    fn pool(&self) -> HandlerResult<&WorkerPool> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let shared = WorkerPool::shared().map_err(HandlerError::new)?;
        Ok(self.pool.get_or_init(|| shared))
    }

    fn schedule(&self) -> HandlerResult<()> {
        let pool = self.pool()?;
        let capacity = pool.capacity();
        let state = Arc::clone(&self.state);

        let mut tasks = self.state.tasks.lock_unpoisoned();
        tasks.retain(|task| !task.is_done());
        tasks.push(pool.spawn(move || state.drain_in_background(capacity)));
        Ok(())
    }
}

impl Handler for Decoupler {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        self.state.handler.start()?;
        self.state.reset();
        Ok(())
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        let state = &self.state;
        let index = state.index.fetch_add(1, Ordering::AcqRel);
        let fraction = state.fraction.load(Ordering::Acquire);

        if index % fraction == 0 {
            let batch = Arc::clone(&*state.batch.read_unpoisoned());
            if let Some(slot) = batch.slots.get(index / fraction) {
                if slot.set(quad.into_owned()).is_ok() {
                    if state.size.fetch_add(1, Ordering::AcqRel) + 1 == BUFFER_SIZE {
                        state
                            .producers
                            .lock_unpoisoned()
                            .insert(thread::current().id());
                        state.check_not_failed()?;
                        self.schedule()?;
                    }
                    return Ok(());
                }
            }
        }

        state.handler.statement(quad)
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        self.state.handler.comment(comment)
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        self.state.handler.namespace(prefix, iri)
    }

    fn end(&self) -> HandlerResult<()> {
        let capacity = self.pool.get().map(WorkerPool::capacity);
        if let Err(error) = self.state.process(true, capacity) {
            self.state.failure.lock_unpoisoned().push(error);
            self.state.cancel_tasks();
        }

        // Background tasks may still be forwarding, also after a failure.
        let tasks = mem::take(&mut *self.state.tasks.lock_unpoisoned());
        for task in &tasks {
            task.wait();
        }

        self.state.check_not_failed()?;
        self.state.handler.end()
    }

    fn close(&self) {
        close_quietly(self.state.handler.as_ref());
        self.state.cancel_tasks();
    }
}

/// A buffer of statements. Every slot is written at most once.
#[derive(Debug)]
struct Batch {
    slots: Box<[OnceLock<Quad>]>,
}

impl Batch {
    fn new() -> Self {
        Self {
            slots: (0..BUFFER_SIZE).map(|_| OnceLock::new()).collect(),
        }
    }
}

/// The state shared between a [Decoupler] and its background tasks.
#[derive(Debug)]
struct DecoupleState {
    handler: HandlerRef,
    batch: RwLock<Arc<Batch>>,
    /// Number of statements received since the last drain.
    index: AtomicUsize,
    /// Number of filled slots of the current batch.
    size: AtomicUsize,
    fraction: AtomicUsize,
    /// Threads that filled a batch during this pass.
    producers: Mutex<FxHashSet<ThreadId>>,
    tasks: Mutex<Vec<PoolTask>>,
    failure: Mutex<ErrorAggregator>,
}

impl DecoupleState {
    fn new(handler: HandlerRef) -> Self {
        Self {
            handler,
            batch: RwLock::new(Arc::new(Batch::new())),
            index: AtomicUsize::new(0),
            size: AtomicUsize::new(0),
            fraction: AtomicUsize::new(1),
            producers: Mutex::new(FxHashSet::default()),
            tasks: Mutex::new(Vec::new()),
            failure: Mutex::new(ErrorAggregator::default()),
        }
    }

    fn reset(&self) {
        *self.batch.write_unpoisoned() = Arc::new(Batch::new());
        self.index.store(0, Ordering::Release);
        self.size.store(0, Ordering::Release);
        self.fraction.store(1, Ordering::Release);
        self.producers.lock_unpoisoned().clear();
        self.tasks.lock_unpoisoned().clear();
        *self.failure.lock_unpoisoned() = ErrorAggregator::default();
    }

    /// Returns the failure of a background task, once.
    fn check_not_failed(&self) -> HandlerResult<()> {
        match self.failure.lock_unpoisoned().take() {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    fn cancel_tasks(&self) {
        for task in self.tasks.lock_unpoisoned().iter() {
            task.cancel();
        }
    }

    fn drain_in_background(&self, capacity: usize) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.process(false, Some(capacity))
        }))
        .unwrap_or_else(|payload| Err(HandlerError::from_panic(payload.as_ref())));

        if let Err(error) = result {
            warn!(%error, "Forwarding buffered statements failed");
            self.failure.lock_unpoisoned().push(error);
            self.cancel_tasks();
        }
    }

    /// Forwards the content of the current batch.
    ///
    /// Unless `force` is set, only a full batch is forwarded.
    fn process(&self, force: bool, capacity: Option<usize>) -> HandlerResult<()> {
        let (batch, count) = {
            let mut current = self.batch.write_unpoisoned();
            let count = self.size.load(Ordering::Acquire);
            if count == 0 || (count < BUFFER_SIZE && !force) {
                return Ok(());
            }
            let batch = mem::replace(&mut *current, Arc::new(Batch::new()));
            self.size.store(0, Ordering::Release);
            (batch, count)
        };

        if let Some(capacity) = capacity {
            self.update_fraction(capacity);
        }

        trace!(count, "Forwarding buffered statements");
        for quad in batch.slots.iter().filter_map(OnceLock::get) {
            self.handler.statement(quad.as_ref())?;
        }
        Ok(())
    }

    fn update_fraction(&self, capacity: usize) {
        let observed = self.producers.lock_unpoisoned().len();
        let fraction = if observed >= capacity {
            MAX_FRACTION
        } else {
            capacity / (capacity - observed)
        };

        // Moving the index out of range first makes producers forward directly while the
        // fraction changes.
        let previous = self.fraction.load(Ordering::Acquire);
        self.index
            .store(BUFFER_SIZE * previous.max(fraction), Ordering::Release);
        self.fraction.store(fraction, Ordering::Release);
        self.index.store(0, Ordering::Release);

        if fraction != previous {
            debug!(observed, capacity, fraction, "Adjusted decoupling fraction");
        }
    }
}
