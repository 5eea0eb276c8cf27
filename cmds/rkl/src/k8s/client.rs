//! Kubernetes cluster connection management.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use k8s::{GroupVersionKind, Object, ObjectRef};
use kube::{
	api::{DynamicObject, ListParams},
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	Api, Client, Config,
};
use thiserror::Error;
use tracing::instrument;

use super::{
	api::{label_selector, ApiError, ApiReply, ApiResourceInfo, ClusterApi},
	discovery::{ApiResourceCache, DiscoveryError},
	ResourceScope,
};

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no context named `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFound(String),

	#[error("no context given and your $KUBECONFIG has no current-context")]
	NoCurrentContext,

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),

	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
}

/// A client bound to one kubeconfig context.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	context: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("context", &self.context)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect using the named context, or the current context when `None`.
	#[instrument(skip_all)]
	pub async fn from_context(context: Option<&str>) -> Result<Self, ConnectionError> {
		let kubeconfig = Kubeconfig::read()?;
		Self::from_kubeconfig(kubeconfig, context).await
	}

	#[instrument(skip(kubeconfig))]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		let context = match context {
			Some(name) => {
				if !kubeconfig.contexts.iter().any(|c| c.name == name) {
					return Err(ConnectionError::ContextNotFound(name.to_string()));
				}
				name.to_string()
			}
			None => kubeconfig
				.current_context
				.clone()
				.ok_or(ConnectionError::NoCurrentContext)?,
		};
		tracing::debug!(context = %context, "using kubeconfig context");

		let mut config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: Some(context.clone()),
				..Default::default()
			},
		)
		.await?;
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config)?;

		Ok(Self { client, context })
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	pub fn context(&self) -> &str {
		&self.context
	}
}

/// [`ClusterApi`] backed by a live cluster.
pub struct KubeCluster {
	client: Client,
	api_cache: ApiResourceCache,
}

impl KubeCluster {
	/// Discover the cluster's resources.
	pub async fn discover(connection: &ClusterConnection) -> Result<Self, ConnectionError> {
		let api_cache = ApiResourceCache::build(connection.client()).await?;
		tracing::debug!(resources = api_cache.len(), "discovered API resources");
		Ok(Self {
			client: connection.client().clone(),
			api_cache,
		})
	}

	fn api_for(
		&self,
		gvk: &GroupVersionKind,
		namespace: Option<&str>,
	) -> Result<Api<DynamicObject>, ApiError> {
		let discovered = self.api_cache.lookup(gvk).ok_or_else(|| {
			ApiError::status(
				404,
				"NotFound",
				format!("the server doesn't have a resource type {gvk}"),
			)
		})?;
		let client = self.client.clone();
		let ar = &discovered.api_resource;
		Ok(match (discovered.scope, namespace) {
			(ResourceScope::Namespaced, Some(ns)) => Api::namespaced_with(client, ns, ar),
			_ => Api::all_with(client, ar),
		})
	}
}

fn to_object(dynamic: DynamicObject, gvk: &GroupVersionKind) -> Result<Object, ApiError> {
	let value = serde_json::to_value(dynamic).map_err(ApiError::Decode)?;
	let mut object = Object::new(value);
	object.ensure_type_meta(gvk);
	Ok(object)
}

#[async_trait]
impl ClusterApi for KubeCluster {
	fn resources(&self) -> Vec<ApiResourceInfo> {
		self.api_cache
			.iter()
			.map(|(gvk, discovered)| discovered.info(gvk))
			.collect()
	}

	#[instrument(skip(self, labels), fields(gvk = %gvk))]
	async fn list_objects(
		&self,
		gvk: &GroupVersionKind,
		namespace: Option<&str>,
		labels: &BTreeMap<String, String>,
	) -> Result<ApiReply<Vec<Object>>, ApiError> {
		let api = self.api_for(gvk, namespace)?;
		let mut params = ListParams::default();
		if !labels.is_empty() {
			params = params.labels(&label_selector(labels));
		}
		let list = api.list(&params).await?;
		let objects = list
			.items
			.into_iter()
			.map(|item| to_object(item, gvk))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(ApiReply::new(objects))
	}

	#[instrument(skip(self), fields(object = %object_ref))]
	async fn get_single_object(&self, object_ref: &ObjectRef) -> Result<ApiReply<Object>, ApiError> {
		let api = self.api_for(&object_ref.gvk, object_ref.namespace.as_deref())?;
		let dynamic = api.get(&object_ref.name).await?;
		Ok(ApiReply::new(to_object(dynamic, &object_ref.gvk)?))
	}
}
