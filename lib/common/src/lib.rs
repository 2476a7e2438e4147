pub mod error;
mod pool;
mod sync;

pub use error::{AggregateError, ErrorAggregator, HandlerError, HandlerResult};
pub use pool::{PoolConfig, PoolConfigError, PoolTask, WorkerPool, THREADS_ENV_VAR};
pub use sync::{MutexExt, RwLockExt};
