use std::fmt;

use serde::{Deserialize, Serialize};

/// Group, version and kind of a Kubernetes resource.
///
/// The core API group is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
	pub group: String,
	pub version: String,
	pub kind: String,
}

impl GroupVersionKind {
	pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
		Self {
			group: group.into(),
			version: version.into(),
			kind: kind.into(),
		}
	}

	/// Split an `apiVersion` string (`apps/v1` or `v1`) into group and version.
	pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
		let (group, version) = match api_version.split_once('/') {
			Some((g, v)) => (g, v),
			None => ("", api_version),
		};
		Self::new(group, version, kind)
	}

	/// The `apiVersion` string as it appears in manifests.
	pub fn api_version(&self) -> String {
		if self.group.is_empty() {
			self.version.clone()
		} else {
			format!("{}/{}", self.group, self.version)
		}
	}
}

impl fmt::Display for GroupVersionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}, Kind={}", self.api_version(), self.kind)
	}
}

/// Identity of a single object in the cluster.
///
/// A ref with an empty name identifies a whole resource kind. Those are used
/// to attach diagnostics to a kind rather than to one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
	#[serde(flatten)]
	pub gvk: GroupVersionKind,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	#[serde(default)]
	pub name: String,
}

impl ObjectRef {
	pub fn new(gvk: GroupVersionKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
		Self {
			gvk,
			namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_owned),
			name: name.into(),
		}
	}

	/// Ref standing for a resource kind as a whole.
	pub fn for_kind(gvk: GroupVersionKind) -> Self {
		Self {
			gvk,
			namespace: None,
			name: String::new(),
		}
	}

	pub fn is_kind_ref(&self) -> bool {
		self.name.is_empty()
	}
}

impl fmt::Display for ObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.gvk.group.is_empty() {
			write!(f, "{}", self.gvk.kind)?;
		} else {
			write!(f, "{}.{}", self.gvk.kind, self.gvk.group)?;
		}
		if self.is_kind_ref() {
			return Ok(());
		}
		match &self.namespace {
			Some(ns) => write!(f, "/{}/{}", ns, self.name),
			None => write!(f, "/{}", self.name),
		}
	}
}
