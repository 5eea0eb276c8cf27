use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{GroupVersionKind, ObjectRef};

/// An unstructured Kubernetes object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Object(Value);

impl Object {
	pub fn new(value: Value) -> Self {
		Self(value)
	}

	pub fn as_value(&self) -> &Value {
		&self.0
	}

	pub fn into_value(self) -> Value {
		self.0
	}

	pub fn gvk(&self) -> Option<GroupVersionKind> {
		let api_version = self.0.get("apiVersion")?.as_str()?;
		let kind = self.0.get("kind")?.as_str()?;
		Some(GroupVersionKind::from_api_version(api_version, kind))
	}

	fn metadata(&self) -> Option<&Map<String, Value>> {
		self.0.get("metadata")?.as_object()
	}

	pub fn name(&self) -> Option<&str> {
		self.metadata()?.get("name")?.as_str()
	}

	pub fn namespace(&self) -> Option<&str> {
		self.metadata()?
			.get("namespace")?
			.as_str()
			.filter(|ns| !ns.is_empty())
	}

	/// `None` when the object lacks `apiVersion`, `kind` or `metadata.name`.
	pub fn object_ref(&self) -> Option<ObjectRef> {
		let name = self.name().filter(|n| !n.is_empty())?;
		Some(ObjectRef::new(self.gvk()?, self.namespace(), name))
	}

	/// Labels in the order they appear in the object.
	pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
		string_map(self.metadata(), "labels")
	}

	pub fn annotations(&self) -> impl Iterator<Item = (&str, &str)> {
		string_map(self.metadata(), "annotations")
	}

	pub fn label(&self, key: &str) -> Option<&str> {
		self.labels().find_map(|(k, v)| (k == key).then_some(v))
	}

	pub fn annotation(&self, key: &str) -> Option<&str> {
		self.annotations().find_map(|(k, v)| (k == key).then_some(v))
	}

	/// Fill in `apiVersion` and `kind` when the server left them out, which it
	/// does for items of a list response.
	pub fn ensure_type_meta(&mut self, gvk: &GroupVersionKind) {
		let Some(obj) = self.0.as_object_mut() else {
			return;
		};
		if !obj.get("apiVersion").is_some_and(Value::is_string) {
			obj.insert("apiVersion".into(), Value::String(gvk.api_version()));
		}
		if !obj.get("kind").is_some_and(Value::is_string) {
			obj.insert("kind".into(), Value::String(gvk.kind.clone()));
		}
	}
}

impl From<Value> for Object {
	fn from(value: Value) -> Self {
		Self(value)
	}
}

fn string_map<'a>(
	metadata: Option<&'a Map<String, Value>>,
	field: &str,
) -> impl Iterator<Item = (&'a str, &'a str)> {
	metadata
		.and_then(|m| m.get(field))
		.and_then(Value::as_object)
		.into_iter()
		.flat_map(|map| map.iter())
		.filter_map(|(k, v)| Some((k.as_str(), v.as_str()?)))
}
