//! Group-wide operations over the communication tree.

pub(crate) mod barrier;
pub(crate) mod broadcast;
pub(crate) mod collect;
pub(crate) mod engine;
pub mod future;
pub(crate) mod gather;
pub mod operators;
pub(crate) mod reduce;
pub mod registry;
pub(crate) mod scatter;
pub(crate) mod state;
pub mod tree;

pub use future::PgasFuture;
pub use operators::{Collector, OperatorRegistry, ReduceFn, Reducer};
pub use registry::{Countdown, RequestKey, RequestRegistry};
pub use tree::CommunicationTree;
