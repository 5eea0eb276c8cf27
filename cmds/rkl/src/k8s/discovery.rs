//! Kubernetes API resource discovery and caching.
//!
//! Remote objects are gathered across every kind the cluster serves, so
//! discovery always covers the whole API surface instead of a requested
//! subset.

use std::collections::HashMap;

use k8s::GroupVersionKind;
use kube::{
	discovery::{ApiResource, Scope},
	Client, Discovery,
};
use thiserror::Error;
use tracing::instrument;

use super::{api::ApiResourceInfo, ResourceScope};

#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("full API discovery failed")]
	FullDiscovery(#[source] kube::Error),
}

/// Discovered API resource with scope and capabilities.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
	/// The kube ApiResource for making API calls.
	pub api_resource: ApiResource,
	pub scope: ResourceScope,
	pub verbs: Vec<String>,
	pub preferred: bool,
}

impl DiscoveredResource {
	pub fn info(&self, gvk: &GroupVersionKind) -> ApiResourceInfo {
		ApiResourceInfo {
			gvk: gvk.clone(),
			namespaced: self.scope == ResourceScope::Namespaced,
			preferred: self.preferred,
			verbs: self.verbs.clone(),
		}
	}
}

/// Every resource the cluster serves, keyed by group, version and kind.
#[derive(Debug, Clone, Default)]
pub struct ApiResourceCache {
	resources: HashMap<GroupVersionKind, DiscoveredResource>,
}

impl ApiResourceCache {
	/// Query the cluster's discovery API.
	///
	/// Uses the Aggregated Discovery API (K8s 1.26+) which requires only 2 API
	/// calls, and falls back to per-group discovery on older clusters.
	#[instrument(skip(client))]
	pub async fn build(client: &Client) -> Result<Self, DiscoveryError> {
		match Discovery::new(client.clone()).run_aggregated().await {
			Ok(discovery) => {
				tracing::debug!("using aggregated discovery");
				Ok(Self::from_discovery(&discovery))
			}
			Err(e) => {
				tracing::debug!(error = %e, "aggregated discovery not available, using full discovery");
				let discovery = Discovery::new(client.clone())
					.run()
					.await
					.map_err(DiscoveryError::FullDiscovery)?;
				Ok(Self::from_discovery(&discovery))
			}
		}
	}

	fn from_discovery(discovery: &Discovery) -> Self {
		let mut cache = Self::default();
		for group in discovery.groups() {
			let preferred = group.preferred_version_or_latest();
			// all versions, not just the preferred one, so refs to older
			// versions resolve too
			for ver in group.versions() {
				for (ar, caps) in group.versioned_resources(ver) {
					let scope = match caps.scope {
						Scope::Namespaced => ResourceScope::Namespaced,
						Scope::Cluster => ResourceScope::ClusterWide,
					};
					cache.insert(ar, scope, caps.operations, ver == preferred);
				}
			}
		}
		cache
	}

	pub fn insert(
		&mut self,
		api_resource: ApiResource,
		scope: ResourceScope,
		verbs: Vec<String>,
		preferred: bool,
	) {
		let gvk = GroupVersionKind::new(
			&api_resource.group,
			&api_resource.version,
			&api_resource.kind,
		);
		self.resources.insert(
			gvk,
			DiscoveredResource {
				api_resource,
				scope,
				verbs,
				preferred,
			},
		);
	}

	pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<&DiscoveredResource> {
		self.resources.get(gvk)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&GroupVersionKind, &DiscoveredResource)> {
		self.resources.iter()
	}

	pub fn len(&self) -> usize {
		self.resources.len()
	}

	pub fn is_empty(&self) -> bool {
		self.resources.is_empty()
	}
}
