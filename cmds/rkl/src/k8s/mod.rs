//! Kubernetes access for gathering remote objects.
//!
//! Reconciliation only talks to [`api::ClusterApi`], the live cluster
//! implementation lives in [`client`].

pub mod api;
pub mod client;
pub mod discovery;
pub mod remote_objects;

/// Kubernetes API resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
	/// Resource is namespaced (e.g., Deployment, ConfigMap).
	Namespaced,

	/// Resource is cluster-wide (e.g., Namespace, ClusterRole).
	ClusterWide,
}
