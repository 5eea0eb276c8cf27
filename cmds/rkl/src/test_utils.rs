//! Common test utilities.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	fs,
	io::{self, ErrorKind, Write},
	path::Path,
	sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use k8s::{GroupVersionKind, Object, ObjectRef};
use parking_lot::Mutex;
use rkl_git::{FetchOptions, GitError, GitUrl, MirrorBackend, RepoInfo};
use serde_json::{json, Map, Value};

use crate::{
	k8s::api::{ApiError, ApiReply, ApiResourceInfo, ClusterApi},
	status::{StatusSink, StepId, StepOutcome},
};

/// A writer that simulates a broken pipe (SIGPIPE scenario).
pub struct BrokenPipeWriter;

impl Write for BrokenPipeWriter {
	fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
		Err(io::Error::new(ErrorKind::BrokenPipe, "broken pipe"))
	}

	fn flush(&mut self) -> io::Result<()> {
		Err(io::Error::new(ErrorKind::BrokenPipe, "broken pipe"))
	}
}

/// Build an unstructured object.
pub fn object(
	gvk: &GroupVersionKind,
	namespace: Option<&str>,
	name: &str,
	labels: &[(&str, &str)],
) -> Object {
	let mut metadata = Map::new();
	metadata.insert("name".into(), json!(name));
	if let Some(ns) = namespace {
		metadata.insert("namespace".into(), json!(ns));
	}
	if !labels.is_empty() {
		let labels: Map<String, Value> = labels
			.iter()
			.map(|(k, v)| ((*k).to_string(), json!(v)))
			.collect();
		metadata.insert("labels".into(), Value::Object(labels));
	}
	Object::new(json!({
		"apiVersion": gvk.api_version(),
		"kind": gvk.kind,
		"metadata": metadata,
	}))
}

/// In-memory [`ClusterApi`] with injectable failures.
#[derive(Default)]
pub struct FakeCluster {
	resources: Vec<ApiResourceInfo>,
	objects: Vec<Object>,
	/// Status codes returned when listing a kind.
	list_failures: HashMap<String, u16>,
	get_failures: HashMap<ObjectRef, u16>,
	get_warnings: HashMap<ObjectRef, Vec<String>>,
	listed: Mutex<Vec<String>>,
	fetched: Mutex<Vec<String>>,
}

impl FakeCluster {
	pub fn with_resource(mut self, gvk: GroupVersionKind, namespaced: bool, verbs: &[&str]) -> Self {
		self.resources.push(ApiResourceInfo {
			gvk,
			namespaced,
			preferred: true,
			verbs: verbs.iter().map(ToString::to_string).collect(),
		});
		self
	}

	/// Mark every resource of `group`/`version` as served in a
	/// non-preferred version.
	pub fn not_preferred(mut self, group: &str, version: &str) -> Self {
		for resource in &mut self.resources {
			if resource.gvk.group == group && resource.gvk.version == version {
				resource.preferred = false;
			}
		}
		self
	}

	pub fn with_object(mut self, object: Object) -> Self {
		self.objects.push(object);
		self
	}

	pub fn fail_list(mut self, kind: &str, code: u16) -> Self {
		self.list_failures.insert(kind.to_string(), code);
		self
	}

	pub fn fail_get(mut self, object_ref: &ObjectRef, code: u16) -> Self {
		self.get_failures.insert(object_ref.clone(), code);
		self
	}

	pub fn warn_on_get(mut self, object_ref: &ObjectRef, warning: &str) -> Self {
		self.get_warnings
			.entry(object_ref.clone())
			.or_default()
			.push(warning.to_string());
		self
	}

	/// Kinds listed so far, as `GroupVersionKind` display strings.
	pub fn listed_kinds(&self) -> Vec<String> {
		self.listed.lock().clone()
	}

	/// Refs fetched individually so far.
	pub fn fetched_refs(&self) -> Vec<String> {
		self.fetched.lock().clone()
	}
}

fn failure(code: u16) -> ApiError {
	let reason = match code {
		401 => "Unauthorized",
		403 => "Forbidden",
		404 => "NotFound",
		_ => "InternalError",
	};
	ApiError::status(code, reason, format!("fake failure {code}"))
}

#[async_trait]
impl ClusterApi for FakeCluster {
	fn resources(&self) -> Vec<ApiResourceInfo> {
		self.resources.clone()
	}

	async fn list_objects(
		&self,
		gvk: &GroupVersionKind,
		namespace: Option<&str>,
		labels: &BTreeMap<String, String>,
	) -> Result<ApiReply<Vec<Object>>, ApiError> {
		self.listed.lock().push(gvk.to_string());
		if let Some(code) = self.list_failures.get(&gvk.kind) {
			return Err(failure(*code));
		}
		let objects = self
			.objects
			.iter()
			.filter(|o| o.gvk().as_ref() == Some(gvk))
			.filter(|o| namespace.is_none() || o.namespace() == namespace)
			.filter(|o| labels.iter().all(|(k, v)| o.label(k) == Some(v.as_str())))
			.cloned()
			.collect();
		Ok(ApiReply::new(objects))
	}

	async fn get_single_object(&self, object_ref: &ObjectRef) -> Result<ApiReply<Object>, ApiError> {
		self.fetched.lock().push(object_ref.to_string());
		if let Some(code) = self.get_failures.get(object_ref) {
			return Err(failure(*code));
		}
		let object = self
			.objects
			.iter()
			.find(|o| o.object_ref().as_ref() == Some(object_ref))
			.cloned()
			.ok_or_else(|| failure(404))?;
		let warnings = self.get_warnings.get(object_ref).cloned().unwrap_or_default();
		Ok(ApiReply::new(object).with_warnings(warnings))
	}
}

/// [`StatusSink`] remembering how each step finished.
#[derive(Default)]
pub struct RecordingStatus {
	finished: Mutex<Vec<(String, StepOutcome)>>,
}

impl RecordingStatus {
	pub fn outcomes(&self) -> Vec<(String, StepOutcome)> {
		self.finished.lock().clone()
	}
}

impl StatusSink for RecordingStatus {
	fn started(&self, _step: StepId, _message: &str) {}

	fn updated(&self, _step: StepId, _message: &str) {}

	fn finished(&self, _step: StepId, message: &str, outcome: StepOutcome) {
		self.finished.lock().push((message.to_string(), outcome));
	}
}

/// [`MirrorBackend`] that fakes mirrors with a `HEAD` marker file and
/// exports a single `README` naming the ref.
#[derive(Default)]
pub struct FakeMirrorBackend {
	fetches: AtomicUsize,
	exports: AtomicUsize,
	failing: HashSet<String>,
}

impl FakeMirrorBackend {
	/// Fail every fetch of `url`.
	pub fn failing(mut self, url: &str) -> Self {
		self.failing.insert(url.to_string());
		self
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}

	pub fn exports(&self) -> usize {
		self.exports.load(Ordering::SeqCst)
	}
}

impl MirrorBackend for FakeMirrorBackend {
	fn fetch(&self, url: &GitUrl, dir: &Path, _opts: FetchOptions) -> Result<(), GitError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		if self.failing.contains(url.as_str()) {
			return Err(GitError::RefreshFailed {
				url: url.to_string(),
				message: "remote unreachable".into(),
			});
		}
		fs::create_dir_all(dir).map_err(|source| GitError::Io {
			path: dir.to_path_buf(),
			source,
		})?;
		fs::write(dir.join("HEAD"), "ref: refs/heads/main\n").map_err(|source| GitError::Io {
			path: dir.join("HEAD"),
			source,
		})
	}

	fn export(
		&self,
		url: &GitUrl,
		_dir: &Path,
		git_ref: Option<&str>,
		target: &Path,
	) -> Result<RepoInfo, GitError> {
		self.exports.fetch_add(1, Ordering::SeqCst);
		let readme = target.join("README");
		fs::create_dir_all(target)
			.and_then(|()| fs::write(&readme, git_ref.unwrap_or("HEAD")))
			.map_err(|source| GitError::Io {
				path: readme,
				source,
			})?;
		Ok(RepoInfo {
			url: url.clone(),
			git_ref: git_ref.map(str::to_owned),
			commit: "0123456789abcdef0123456789abcdef01234567".into(),
			describe: None,
		})
	}
}
