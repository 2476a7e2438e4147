mod collect;
mod decouple;
mod dispatch;
mod filter;
mod handler;
mod rewrite;
mod synchronize;

pub use collect::Collector;
pub use decouple::{decouple, Decoupler, BUFFER_SIZE};
pub use dispatch::{dispatch_all, dispatch_round_robin, dispatch_round_robin_chunked};
pub use filter::{
    ignore_extra_passes, ignore_methods, ignore_passes, ignore_start_end, HandlerMethods,
};
pub use handler::{close_quietly, is_nop, nop, Handler, HandlerRef, NopHandler};
pub use rewrite::rewrite_blank_nodes;
pub use synchronize::synchronize;
