#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod model {
    pub use rdf_flow_model::*;
}

pub mod handlers {
    pub use rdf_flow_handlers::*;
}

pub mod dedup {
    pub use rdf_flow_dedup::*;
}

pub mod pool {
    pub use rdf_flow_common::{PoolConfig, PoolConfigError, PoolTask, WorkerPool, THREADS_ENV_VAR};
}

pub mod error {
    pub use rdf_flow_common::error::*;
}
