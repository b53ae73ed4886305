//! Reducers and collectors usable by `reduce` and `collect`.
//!
//! Custom operators are registered under a numeric id on every node when the
//! cluster is built. Messages carry only the id, and each node looks the
//! operator up in its own registry.

use crate::element::Element;
use crate::error::{PgasError, Result, panic_message};
use crate::protocol::ReducerSpec;
use crate::reduce::reduce_bytes;
use crate::types::ReduceOp;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Associative combination of two encoded values into one.
pub type ReduceFn = Arc<dyn Fn(&[u8], &[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// Reducer selected by the caller of `reduce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Prod,
    Min,
    Max,
    /// A reducer registered with `ClusterBuilder::reducer`.
    Custom(u16),
}

impl Reducer {
    /// Wire form for values of type `T`.
    pub(crate) fn spec<T: Element>(self) -> Result<ReducerSpec> {
        let op = match self {
            Reducer::Custom(id) => return Ok(ReducerSpec::Custom { id }),
            Reducer::Sum => ReduceOp::Sum,
            Reducer::Prod => ReduceOp::Prod,
            Reducer::Min => ReduceOp::Min,
            Reducer::Max => ReduceOp::Max,
        };
        let dtype = T::dtype().ok_or(PgasError::NoBuiltinReducer {
            op,
            type_name: std::any::type_name::<T>(),
        })?;
        Ok(ReducerSpec::Builtin { op, dtype })
    }
}

impl From<ReduceOp> for Reducer {
    fn from(op: ReduceOp) -> Self {
        match op {
            ReduceOp::Sum => Reducer::Sum,
            ReduceOp::Prod => Reducer::Prod,
            ReduceOp::Min => Reducer::Min,
            ReduceOp::Max => Reducer::Max,
        }
    }
}

/// A mutable-accumulation reduction.
///
/// Every node starts from [`supply`](Self::supply), folds in the items of its
/// local members with [`accumulate`](Self::accumulate), and merges the
/// accumulators of its children with [`combine`](Self::combine). The tree
/// root turns the final accumulator into the result with
/// [`finish`](Self::finish).
pub trait Collector: Send + Sync + 'static {
    type Item: Element;
    type Acc: Element;
    type Output: Element;

    fn supply(&self) -> Self::Acc;

    fn accumulate(&self, acc: &mut Self::Acc, item: Self::Item);

    fn combine(&self, acc: &mut Self::Acc, other: Self::Acc);

    fn finish(&self, acc: Self::Acc) -> Self::Output;
}

/// Run application operator code, reporting a panic as an error so it
/// travels up the tree like any other failure.
fn guarded<R>(kind: &'static str, id: u16, f: impl FnOnce() -> Result<R>) -> Result<R> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(PgasError::OperatorPanicked {
            kind,
            id,
            message: panic_message(payload.as_ref()),
        })
    })
}

/// [`Collector`] over encoded values.
pub(crate) trait ErasedCollector: Send + Sync {
    fn supply(&self) -> Result<Vec<u8>>;

    fn accumulate(&self, acc: &[u8], item: &[u8]) -> Result<Vec<u8>>;

    fn combine(&self, acc: &[u8], other: &[u8]) -> Result<Vec<u8>>;

    fn finish(&self, acc: &[u8]) -> Result<Vec<u8>>;
}

struct Typed<C> {
    id: u16,
    collector: C,
}

impl<C: Collector> Typed<C> {
    fn run<R>(&self, f: impl FnOnce(&C) -> Result<R>) -> Result<R> {
        guarded("collector", self.id, || f(&self.collector))
    }
}

impl<C: Collector> ErasedCollector for Typed<C> {
    fn supply(&self) -> Result<Vec<u8>> {
        self.run(|c| Ok(c.supply().to_bytes()))
    }

    fn accumulate(&self, acc: &[u8], item: &[u8]) -> Result<Vec<u8>> {
        self.run(|c| {
            let mut acc = C::Acc::from_bytes(acc)?;
            c.accumulate(&mut acc, C::Item::from_bytes(item)?);
            Ok(acc.to_bytes())
        })
    }

    fn combine(&self, acc: &[u8], other: &[u8]) -> Result<Vec<u8>> {
        self.run(|c| {
            let mut acc = C::Acc::from_bytes(acc)?;
            c.combine(&mut acc, C::Acc::from_bytes(other)?);
            Ok(acc.to_bytes())
        })
    }

    fn finish(&self, acc: &[u8]) -> Result<Vec<u8>> {
        self.run(|c| Ok(c.finish(C::Acc::from_bytes(acc)?).to_bytes()))
    }
}

/// Custom reducers and collectors known to a node.
#[derive(Default, Clone)]
pub struct OperatorRegistry {
    reducers: HashMap<u16, ReduceFn>,
    collectors: HashMap<u16, Arc<dyn ErasedCollector>>,
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut reducers: Vec<_> = self.reducers.keys().collect();
        reducers.sort();
        let mut collectors: Vec<_> = self.collectors.keys().collect();
        collectors.sort();
        f.debug_struct("OperatorRegistry")
            .field("reducers", &reducers)
            .field("collectors", &collectors)
            .finish()
    }
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed reducer. The function must be associative.
    pub fn register_reducer<T, F>(&mut self, id: u16, f: F)
    where
        T: Element,
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        let erased: ReduceFn = Arc::new(move |a: &[u8], b: &[u8]| {
            Ok(f(T::from_bytes(a)?, T::from_bytes(b)?).to_bytes())
        });
        self.reducers.insert(id, erased);
    }

    /// Register a reducer over encoded values.
    pub fn register_raw_reducer(&mut self, id: u16, f: ReduceFn) {
        self.reducers.insert(id, f);
    }

    pub fn register_collector<C: Collector>(&mut self, id: u16, collector: C) {
        self.collectors
            .insert(id, Arc::new(Typed { id, collector }));
    }

    pub(crate) fn collector(&self, id: u16) -> Result<Arc<dyn ErasedCollector>> {
        self.collectors
            .get(&id)
            .cloned()
            .ok_or(PgasError::UnknownOperator {
                kind: "collector",
                id,
            })
    }

    /// Check that `spec` can be applied on this node.
    pub(crate) fn check_reducer(&self, spec: ReducerSpec) -> Result<()> {
        match spec {
            ReducerSpec::Builtin { .. } => Ok(()),
            ReducerSpec::Custom { id } if self.reducers.contains_key(&id) => Ok(()),
            ReducerSpec::Custom { id } => Err(PgasError::UnknownOperator { kind: "reducer", id }),
        }
    }

    /// `acc = spec(acc, other)`.
    pub(crate) fn reduce(&self, spec: ReducerSpec, acc: &mut Vec<u8>, other: &[u8]) -> Result<()> {
        match spec {
            ReducerSpec::Builtin { op, dtype } => reduce_bytes(acc, other, dtype, op),
            ReducerSpec::Custom { id } => {
                let f = self
                    .reducers
                    .get(&id)
                    .ok_or(PgasError::UnknownOperator { kind: "reducer", id })?;
                let current: &[u8] = acc;
                let merged = guarded("reducer", id, || f(current, other))?;
                *acc = merged;
                Ok(())
            }
        }
    }
}
