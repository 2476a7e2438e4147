use crate::MutexExt;
use std::convert::Infallible;
use std::env::{self, VarError};
use std::io;
use std::num::NonZeroUsize;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

/// The environment variable that overrides the number of threads of the shared pool.
pub const THREADS_ENV_VAR: &str = "RDF_FLOW_THREADS";

const DEFAULT_THREAD_NAME: &str = "rdf-flow-worker";

/// An error raised while configuring or creating a [WorkerPool].
#[derive(Debug, thiserror::Error)]
pub enum PoolConfigError {
    #[error("The shared worker pool is already in use and can no longer be configured")]
    AlreadyInitialized,
    #[error("Invalid value '{value}' for {variable}, expected a positive number of threads")]
    InvalidEnvironment {
        variable: &'static str,
        value: String,
    },
    #[error("Could not create the worker pool: {0}")]
    Io(#[from] io::Error),
}

/// The configuration of a [WorkerPool].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// The parallelism the pool is sized for.
    pub num_threads: NonZeroUsize,
    /// The name given to the threads of the pool.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl PoolConfig {
    /// Creates the default configuration, overridden by [THREADS_ENV_VAR] if it is set.
    pub fn from_env() -> Result<Self, PoolConfigError> {
        let config = Self::default();
        match env::var(THREADS_ENV_VAR) {
            Ok(value) => {
                let num_threads = value.trim().parse::<NonZeroUsize>().map_err(|_| {
                    PoolConfigError::InvalidEnvironment {
                        variable: THREADS_ENV_VAR,
                        value: value.clone(),
                    }
                })?;
                Ok(config.with_num_threads(num_threads))
            }
            Err(VarError::NotPresent) => Ok(config),
            Err(VarError::NotUnicode(value)) => Err(PoolConfigError::InvalidEnvironment {
                variable: THREADS_ENV_VAR,
                value: value.to_string_lossy().into_owned(),
            }),
        }
    }

    #[must_use]
    pub fn with_num_threads(mut self, num_threads: NonZeroUsize) -> Self {
        self.num_threads = num_threads;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }
}

#[derive(Debug, Default)]
struct SharedPoolState {
    config: Option<PoolConfig>,
    frozen: bool,
}

static SHARED_STATE: Mutex<SharedPoolState> = Mutex::new(SharedPoolState {
    config: None,
    frozen: false,
});

static SHARED_POOL: OnceLock<WorkerPool> = OnceLock::new();

/// A pool of threads for background work.
///
/// The pool is a cheap handle on a multi-threaded [tokio] runtime. Submitted closures are
/// blocking work and run on the runtime's blocking threads, so a closure may wait for locks or
/// for downstream handlers without stalling other tasks. At most [WorkerPool::capacity] closures
/// run at the same time; further closures are queued.
///
/// Most code uses the process-wide pool returned by [WorkerPool::shared]. Tests and embedders can
/// create private pools with [WorkerPool::new].
#[derive(Clone, Debug)]
pub struct WorkerPool {
    runtime: Arc<Runtime>,
    capacity: NonZeroUsize,
}

impl WorkerPool {
    /// Creates a private pool.
    pub fn new(config: &PoolConfig) -> io::Result<Self> {
        // Tasks only run on the blocking threads, the single async worker stays idle.
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.num_threads.get())
            .thread_name(config.thread_name.clone())
            .build()?;
        debug!(
            threads = config.num_threads.get(),
            name = config.thread_name.as_str(),
            "Created worker pool"
        );
        Ok(Self {
            runtime: Arc::new(runtime),
            capacity: config.num_threads,
        })
    }

    /// Sets the configuration of the shared pool.
    ///
    /// # Errors
    ///
    /// Returns [PoolConfigError::AlreadyInitialized] once the shared pool has been used.
    pub fn configure(config: PoolConfig) -> Result<(), PoolConfigError> {
        let mut state = SHARED_STATE.lock_unpoisoned();
        if state.frozen {
            return Err(PoolConfigError::AlreadyInitialized);
        }
        state.config = Some(config);
        Ok(())
    }

    /// Returns the process-wide pool, creating it on first use.
    ///
    /// The pool is built from the configuration passed to [WorkerPool::configure], falling back
    /// to [PoolConfig::from_env]. Afterwards, the configuration is frozen.
    pub fn shared() -> Result<WorkerPool, PoolConfigError> {
        if let Some(pool) = SHARED_POOL.get() {
            return Ok(pool.clone());
        }

        let mut state = SHARED_STATE.lock_unpoisoned();
        if let Some(pool) = SHARED_POOL.get() {
            return Ok(pool.clone());
        }
        let config = match &state.config {
            Some(config) => config.clone(),
            None => PoolConfig::from_env()?,
        };
        let pool = WorkerPool::new(&config)?;
        state.frozen = true;
        Ok(SHARED_POOL.get_or_init(|| pool).clone())
    }

    /// The maximum number of closures running at the same time.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Runs `task` in the background.
    pub fn spawn<F>(&self, task: F) -> PoolTask
    where
        F: FnOnce() + Send + 'static,
    {
        let (completion, done) = mpsc::channel::<Infallible>();
        let handle = self.runtime.spawn_blocking(move || {
            // The receiver observes a disconnect once `completion` is dropped, which also happens
            // while unwinding from a panic.
            task();
            drop(completion);
        });
        PoolTask { handle, done }
    }
}

/// A handle on a closure submitted to a [WorkerPool].
#[derive(Debug)]
pub struct PoolTask {
    handle: JoinHandle<()>,
    done: Receiver<Infallible>,
}

impl PoolTask {
    /// Returns true if the task has finished, panicked or was cancelled before it started.
    pub fn is_done(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Blocks until the task has finished, panicked or was cancelled before it started.
    pub fn wait(&self) {
        while let Ok(never) = self.done.recv() {
            match never {}
        }
    }

    /// Cancels the task if it has not started yet. A running task is not interrupted.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}
