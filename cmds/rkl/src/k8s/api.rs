//! The cluster operations remote object reconciliation depends on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s::{GroupVersionKind, Object, ObjectRef};
use thiserror::Error;

/// Verb a resource must support to be listed.
pub const VERB_LIST: &str = "list";

/// A resource kind served by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResourceInfo {
	pub gvk: GroupVersionKind,
	pub namespaced: bool,
	/// Served in the group's preferred version. Listing only those avoids
	/// seeing every object once per served version.
	pub preferred: bool,
	pub verbs: Vec<String>,
}

impl ApiResourceInfo {
	pub fn supports(&self, verb: &str) -> bool {
		self.verbs.iter().any(|v| v == verb)
	}
}

/// A response value and the warnings the API server attached to it.
#[derive(Debug, Clone)]
pub struct ApiReply<T> {
	pub value: T,
	pub warnings: Vec<String>,
}

impl<T> ApiReply<T> {
	pub fn new(value: T) -> Self {
		Self {
			value,
			warnings: Vec::new(),
		}
	}

	pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
		self.warnings = warnings;
		self
	}
}

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("{message} ({reason}, status {code})")]
	Status {
		code: u16,
		reason: String,
		message: String,
	},

	#[error("kubernetes request failed")]
	Transport(#[source] Box<kube::Error>),

	#[error("failed to decode object")]
	Decode(#[source] serde_json::Error),
}

impl ApiError {
	pub fn status(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Status {
			code,
			reason: reason.into(),
			message: message.into(),
		}
	}

	pub fn code(&self) -> Option<u16> {
		match self {
			Self::Status { code, .. } => Some(*code),
			_ => None,
		}
	}

	pub fn is_not_found(&self) -> bool {
		self.code() == Some(404)
	}

	pub fn is_forbidden(&self) -> bool {
		self.code() == Some(403)
	}

	pub fn is_unauthorized(&self) -> bool {
		self.code() == Some(401)
	}

	/// Forbidden or unauthorized; expected with restricted service accounts.
	pub fn is_permission_denied(&self) -> bool {
		self.is_forbidden() || self.is_unauthorized()
	}
}

impl From<kube::Error> for ApiError {
	fn from(err: kube::Error) -> Self {
		match err {
			kube::Error::Api(ref status) => Self::Status {
				code: status.code,
				reason: status.reason.clone(),
				message: status.message.clone(),
			},
			other => Self::Transport(Box::new(other)),
		}
	}
}

/// Read access to a cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
	/// Every resource kind the cluster serves, in all versions.
	fn resources(&self) -> Vec<ApiResourceInfo>;

	/// List objects of one kind, cluster wide when `namespace` is `None`.
	/// An empty `labels` map lists everything.
	async fn list_objects(
		&self,
		gvk: &GroupVersionKind,
		namespace: Option<&str>,
		labels: &BTreeMap<String, String>,
	) -> Result<ApiReply<Vec<Object>>, ApiError>;

	async fn get_single_object(&self, object_ref: &ObjectRef) -> Result<ApiReply<Object>, ApiError>;
}

/// Equality based label selector, `a=1,b=2`.
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
	labels
		.iter()
		.map(|(k, v)| format!("{k}={v}"))
		.collect::<Vec<_>>()
		.join(",")
}
