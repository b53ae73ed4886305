use crate::client::PgasThread;
use crate::collective::operators::{Collector, OperatorRegistry, ReduceFn};
use crate::config::PgasConfig;
use crate::element::Element;
use crate::error::{PgasError, Result, panic_message};
use crate::node::NodeContext;
use crate::node::placement::Placement;
use crate::transport::LocalFabric;
use crate::transport::router::spawn_receive_loop;
use crate::types::{NodeId, ThreadId};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

/// Configures a [`LocalCluster`].
#[derive(Default)]
pub struct ClusterBuilder {
    layout: Vec<u32>,
    config: Option<PgasConfig>,
    operators: OperatorRegistry,
}

impl ClusterBuilder {
    /// One node per entry, each running that many logical threads. Global
    /// thread ids are assigned node by node.
    pub fn nodes(mut self, threads_per_node: &[u32]) -> Self {
        self.layout = threads_per_node.to_vec();
        self
    }

    /// Use `config` instead of [`PgasConfig::from_env`].
    pub fn config(mut self, config: PgasConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a custom reducer available to every node as
    /// `Reducer::Custom(id)`.
    pub fn reducer<T, F>(mut self, id: u16, f: F) -> Self
    where
        T: Element,
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        self.operators.register_reducer(id, f);
        self
    }

    /// Register a reducer over encoded values.
    pub fn raw_reducer(mut self, id: u16, f: ReduceFn) -> Self {
        self.operators.register_raw_reducer(id, f);
        self
    }

    pub fn collector<C: Collector>(mut self, id: u16, collector: C) -> Self {
        self.operators.register_collector(id, collector);
        self
    }

    /// Start the handler runtime and every node.
    pub fn build(self) -> Result<LocalCluster> {
        if self.layout.is_empty() {
            return Err(PgasError::Runtime("a cluster needs at least one node".into()));
        }
        let placement = Arc::new(Placement::from_layout(&self.layout));
        if placement.thread_count() == 0 {
            return Err(PgasError::Runtime(
                "a cluster needs at least one thread".into(),
            ));
        }
        let config = self.config.unwrap_or_else(PgasConfig::from_env);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("pgas-handler")
            .enable_all()
            .build()
            .map_err(|e| PgasError::Runtime(format!("failed to start runtime: {e}")))?;

        let operators = Arc::new(self.operators);
        let (fabric, inboxes) = LocalFabric::new(placement.node_count());
        let mut nodes = Vec::with_capacity(inboxes.len());
        let mut loops = Vec::with_capacity(inboxes.len());
        for (node, inbox) in inboxes.into_iter().enumerate() {
            let ctx = Arc::new(NodeContext::new(
                config.clone(),
                Arc::clone(&placement),
                Arc::new(fabric.endpoint(node as NodeId)),
                Arc::clone(&operators),
            )?);
            loops.push(spawn_receive_loop(
                runtime.handle(),
                Arc::clone(&ctx),
                inbox,
            ));
            nodes.push(ctx);
        }

        tracing::info!(
            nodes = placement.node_count(),
            threads = placement.thread_count(),
            "cluster started"
        );
        Ok(LocalCluster {
            runtime: Some(runtime),
            nodes,
            loops,
            placement,
        })
    }
}

/// A cluster of nodes running in this process, connected by an in-memory
/// fabric.
///
/// Message handlers run on a shared tokio runtime; application threads are
/// plain OS threads started by [`run`](Self::run).
pub struct LocalCluster {
    runtime: Option<Runtime>,
    nodes: Vec<Arc<NodeContext>>,
    loops: Vec<JoinHandle<()>>,
    placement: Arc<Placement>,
}

impl std::fmt::Debug for LocalCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCluster")
            .field("nodes", &self.placement.node_count())
            .field("threads", &self.placement.thread_count())
            .finish()
    }
}

impl LocalCluster {
    pub fn builder() -> ClusterBuilder {
        ClusterBuilder::default()
    }

    pub fn node_count(&self) -> u32 {
        self.placement.node_count()
    }

    pub fn thread_count(&self) -> u32 {
        self.placement.thread_count()
    }

    pub fn node(&self, id: NodeId) -> Result<&Arc<NodeContext>> {
        self.nodes
            .get(id as usize)
            .ok_or(PgasError::UnknownNode { node: id })
    }

    /// Handle of logical thread `id`.
    pub fn thread(&self, id: ThreadId) -> Result<PgasThread> {
        let node = self.placement.node_of(id)?;
        Ok(PgasThread::new(Arc::clone(self.node(node)?), id))
    }

    /// Run `body` once per logical thread, each on its own OS thread, and
    /// return the results in thread order.
    ///
    /// A panicking thread yields [`PgasError::ThreadPanicked`]; the other
    /// threads are still joined. Bodies that wait on a peer that panicked
    /// will block, as they would on a real cluster.
    pub fn run<F, R>(&self, body: F) -> Result<Vec<R>>
    where
        F: Fn(PgasThread) -> R + Send + Sync,
        R: Send,
    {
        let threads = self
            .placement
            .threads()
            .map(|t| self.thread(t))
            .collect::<Result<Vec<_>>>()?;

        std::thread::scope(|scope| {
            let body = &body;
            let handles = threads
                .into_iter()
                .map(|thread| {
                    let id = thread.id();
                    std::thread::Builder::new()
                        .name(format!("pgas-thread-{id}"))
                        .spawn_scoped(scope, move || body(thread))
                        .map(|h| (id, h))
                        .map_err(|e| PgasError::Runtime(format!("failed to spawn thread {id}: {e}")))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut results = Vec::with_capacity(handles.len());
            let mut first_error = None;
            for (id, handle) in handles {
                match handle.join() {
                    Ok(r) => results.push(r),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(thread = id, "logical thread panicked: {message}");
                        first_error.get_or_insert(PgasError::ThreadPanicked {
                            thread: id,
                            message,
                        });
                    }
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(results),
            }
        })
    }
}

impl Drop for LocalCluster {
    fn drop(&mut self) {
        for handle in self.loops.drain(..) {
            handle.abort();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
