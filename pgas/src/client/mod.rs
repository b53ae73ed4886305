//! Application-facing API: the cluster, its logical threads, and group
//! handles.

mod cluster;
mod group;
mod thread;

pub use cluster::{ClusterBuilder, LocalCluster};
pub use group::Group;
pub use thread::PgasThread;
