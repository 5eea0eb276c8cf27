//! Gathering the live state of a target cluster.
//!
//! A pass runs three stages one after the other: everything carrying the
//! deployment's common labels, then every explicitly referenced object that
//! was not found that way, then all namespaces. Objects are collected into a
//! private store and only replace the published snapshot once the whole pass
//! succeeded.

use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	convert::Infallible,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
};

use k8s::{object_inclusion_entries, GroupVersionKind, Inclusion, Object, ObjectRef};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::api::{ApiError, ClusterApi, VERB_LIST};
use crate::{
	config::DiscoverySettings,
	diagnostics::{Diagnostics, ErrorChain},
	status::{StatusSink, StatusStep},
	task_group::{TaskErrors, TaskGroup},
};

const BY_LABELS_STEP: &str = "Getting remote objects by commonLabels";

const BY_LABELS_PERMISSION_ADVISORY: &str = "at least one permission error was encountered while gathering objects by labels. This might result in orphan object detection to not work properly";

const MISSING_PERMISSION_ADVISORY: &str = "at least one permission error was encountered while gathering known objects. This might result in orphan object detection and diffs to not work properly";

#[derive(Debug, Error)]
pub enum ReconcileError {
	/// Listing by labels never fails on its own, only when a task was
	/// cancelled or panicked.
	#[error("failed to get remote objects by labels")]
	ListByLabels(#[source] TaskErrors<Infallible>),

	#[error("failed to get remote objects")]
	FetchMissing(#[source] TaskErrors<ObjectFetchError>),

	#[error("failed to list namespaces")]
	ListNamespaces(#[source] ApiError),

	#[error("gathering remote objects was cancelled")]
	Cancelled,
}

#[derive(Debug, Error)]
#[error("failed to get {object_ref}")]
pub struct ObjectFetchError {
	pub object_ref: ObjectRef,
	#[source]
	pub source: ApiError,
}

/// Objects gathered by the tasks of a pass.
#[derive(Default)]
struct ObjectStore {
	objects: Mutex<HashMap<ObjectRef, Object>>,
}

impl ObjectStore {
	fn insert(&self, object: Object) {
		match object.object_ref() {
			Some(object_ref) => {
				self.objects.lock().insert(object_ref, object);
			}
			None => debug!("skipping object without name or kind"),
		}
	}

	fn contains(&self, object_ref: &ObjectRef) -> bool {
		self.objects.lock().contains_key(object_ref)
	}

	fn take(&self) -> HashMap<ObjectRef, Object> {
		std::mem::take(&mut *self.objects.lock())
	}
}

#[derive(Default)]
struct FailureTally {
	permission: AtomicUsize,
	other: AtomicUsize,
}

impl FailureTally {
	fn permission(&self) -> usize {
		self.permission.load(Ordering::Relaxed)
	}

	fn total(&self) -> usize {
		self.permission() + self.other.load(Ordering::Relaxed)
	}
}

/// The live objects of one cluster, as seen by the last successful pass.
pub struct RemoteObjects {
	diagnostics: Arc<Diagnostics>,
	status: Arc<dyn StatusSink>,
	settings: DiscoverySettings,
	cancel: CancellationToken,
	objects: HashMap<ObjectRef, Object>,
	namespaces: HashMap<String, Object>,
}

impl RemoteObjects {
	pub fn new(
		diagnostics: Arc<Diagnostics>,
		status: Arc<dyn StatusSink>,
		settings: DiscoverySettings,
		cancel: CancellationToken,
	) -> Self {
		Self {
			diagnostics,
			status,
			settings,
			cancel,
			objects: HashMap::new(),
			namespaces: HashMap::new(),
		}
	}

	/// Run a full pass. On error the previous snapshot stays in place.
	#[instrument(skip_all, fields(labels = labels.len(), refs = refs.len()))]
	pub async fn update_remote_objects(
		&mut self,
		cluster: &Arc<dyn ClusterApi>,
		labels: &BTreeMap<String, String>,
		refs: &[ObjectRef],
	) -> Result<(), ReconcileError> {
		let store = Arc::new(ObjectStore::default());

		self.get_all_by_labels(cluster, labels, &store).await?;
		self.get_missing_objects(cluster, refs, &store).await?;
		let namespaces = self.get_namespaces(cluster).await?;

		self.objects = store.take();
		self.namespaces = namespaces;
		debug!(
			objects = self.objects.len(),
			namespaces = self.namespaces.len(),
			"published remote objects"
		);
		Ok(())
	}

	async fn get_all_by_labels(
		&self,
		cluster: &Arc<dyn ClusterApi>,
		labels: &BTreeMap<String, String>,
		store: &Arc<ObjectStore>,
	) -> Result<(), ReconcileError> {
		if labels.is_empty() {
			return Ok(());
		}

		let mut step = StatusStep::start(&self.status, BY_LABELS_STEP);
		let tally = Arc::new(FailureTally::default());
		let labels = Arc::new(labels.clone());
		let mut group =
			TaskGroup::<Infallible>::new(self.settings.max_concurrent_requests, self.cancel.clone());

		let listable = cluster
			.resources()
			.into_iter()
			.filter(|r| r.preferred && r.supports(VERB_LIST) && self.settings.allows(&r.gvk));
		for resource in listable {
			let cluster = Arc::clone(cluster);
			let labels = Arc::clone(&labels);
			let store = Arc::clone(store);
			let tally = Arc::clone(&tally);
			let diagnostics = Arc::clone(&self.diagnostics);

			group.spawn(async move {
				let kind_ref = ObjectRef::for_kind(resource.gvk.clone());
				match cluster.list_objects(&resource.gvk, None, &labels).await {
					Ok(reply) => {
						diagnostics.add_api_warnings(&kind_ref, reply.warnings);
						for object in reply.value {
							store.insert(object);
						}
					}
					Err(err) if err.is_not_found() => {}
					Err(err) if err.is_permission_denied() => {
						tally.permission.fetch_add(1, Ordering::Relaxed);
					}
					Err(err) => {
						tally.other.fetch_add(1, Ordering::Relaxed);
						diagnostics.add_warning(Some(&kind_ref), ErrorChain(&err));
					}
				}
				Ok(())
			});
		}

		group.wait().await.map_err(ReconcileError::ListByLabels)?;

		if tally.permission() != 0 {
			self.diagnostics
				.add_warning(None, BY_LABELS_PERMISSION_ADVISORY);
		}
		if tally.total() == 0 {
			step.success();
		} else {
			step.update(format!(
				"{BY_LABELS_STEP}: Failed with {} errors",
				tally.total()
			));
			step.warning();
		}
		Ok(())
	}

	async fn get_missing_objects(
		&self,
		cluster: &Arc<dyn ClusterApi>,
		refs: &[ObjectRef],
		store: &Arc<ObjectStore>,
	) -> Result<(), ReconcileError> {
		let missing: BTreeSet<&ObjectRef> = refs
			.iter()
			.filter(|r| !r.is_kind_ref() && !store.contains(r))
			.collect();
		if missing.is_empty() {
			return Ok(());
		}

		let message = format!("Getting {} additional remote objects", missing.len());
		let mut step = StatusStep::start(&self.status, message.clone());
		let tally = Arc::new(FailureTally::default());
		let mut group = TaskGroup::<ObjectFetchError>::new(
			self.settings.max_concurrent_requests,
			self.cancel.clone(),
		);

		for object_ref in missing {
			let object_ref = object_ref.clone();
			let cluster = Arc::clone(cluster);
			let store = Arc::clone(store);
			let tally = Arc::clone(&tally);
			let diagnostics = Arc::clone(&self.diagnostics);

			group.spawn(async move {
				match cluster.get_single_object(&object_ref).await {
					Ok(reply) => {
						diagnostics.add_api_warnings(&object_ref, reply.warnings);
						store.insert(reply.value);
						Ok(())
					}
					Err(err) if err.is_not_found() => Ok(()),
					Err(err) if err.is_permission_denied() => {
						tally.permission.fetch_add(1, Ordering::Relaxed);
						Ok(())
					}
					Err(err) => {
						tally.other.fetch_add(1, Ordering::Relaxed);
						diagnostics.add_error(Some(&object_ref), ErrorChain(&err));
						Err(ObjectFetchError {
							object_ref,
							source: err,
						})
					}
				}
			});
		}

		let result = group.wait().await;

		if tally.permission() != 0 {
			self.diagnostics.add_warning(None, MISSING_PERMISSION_ADVISORY);
		}
		match result {
			Ok(()) => {
				step.success();
				Ok(())
			}
			Err(errors) => {
				step.update(format!("{message}: Failed with {} errors", errors.len()));
				step.failed();
				Err(ReconcileError::FetchMissing(errors))
			}
		}
	}

	async fn get_namespaces(
		&self,
		cluster: &Arc<dyn ClusterApi>,
	) -> Result<HashMap<String, Object>, ReconcileError> {
		let step = StatusStep::start(&self.status, "Getting namespaces");
		let gvk = GroupVersionKind::new("", "v1", "Namespace");
		let labels = BTreeMap::new();

		let reply = tokio::select! {
			biased;
			() = self.cancel.cancelled() => return Err(ReconcileError::Cancelled),
			reply = cluster.list_objects(&gvk, None, &labels) => {
				reply.map_err(ReconcileError::ListNamespaces)?
			}
		};

		self.diagnostics
			.add_api_warnings(&ObjectRef::for_kind(gvk), reply.warnings);
		let namespaces = reply
			.value
			.into_iter()
			.filter_map(|ns| Some((ns.name()?.to_string(), ns)))
			.collect();
		step.success();
		Ok(namespaces)
	}

	pub fn get_remote_object(&self, object_ref: &ObjectRef) -> Option<&Object> {
		self.objects.get(object_ref)
	}

	pub fn get_remote_namespace(&self, name: &str) -> Option<&Object> {
		self.namespaces.get(name)
	}

	/// Drop an object from the snapshot, e.g. after it was deleted.
	pub fn forget_remote_object(&mut self, object_ref: &ObjectRef) {
		self.objects.remove(object_ref);
	}

	pub fn remote_objects(&self) -> impl Iterator<Item = (&ObjectRef, &Object)> {
		self.objects.iter()
	}

	/// Objects selected by `inclusion`, ordered by ref. An empty inclusion
	/// selects everything.
	pub fn get_filtered_remote_objects(&self, inclusion: &Inclusion) -> Vec<(&ObjectRef, &Object)> {
		let mut filtered: Vec<_> = self
			.objects
			.iter()
			.filter(|(_, object)| inclusion.check_included(&object_inclusion_entries(object), false))
			.collect();
		filtered.sort_unstable_by(|a, b| a.0.cmp(b.0));
		filtered
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;
	use crate::{
		status::StepOutcome,
		task_group::TaskError,
		test_utils::{object, FakeCluster, RecordingStatus},
	};

	fn deployment() -> GroupVersionKind {
		GroupVersionKind::new("apps", "v1", "Deployment")
	}

	fn config_map() -> GroupVersionKind {
		GroupVersionKind::new("", "v1", "ConfigMap")
	}

	fn secret() -> GroupVersionKind {
		GroupVersionKind::new("", "v1", "Secret")
	}

	fn namespace() -> GroupVersionKind {
		GroupVersionKind::new("", "v1", "Namespace")
	}

	fn common_labels() -> BTreeMap<String, String> {
		BTreeMap::from([("project".to_string(), "web".to_string())])
	}

	fn base_cluster() -> FakeCluster {
		FakeCluster::default()
			.with_resource(deployment(), true, &["get", "list"])
			.with_resource(config_map(), true, &["get", "list"])
			.with_resource(secret(), true, &["get", "list"])
			.with_resource(namespace(), false, &["get", "list"])
			.with_object(object(&namespace(), None, "web", &[]))
			.with_object(object(&namespace(), None, "kube-system", &[]))
	}

	struct Harness {
		diagnostics: Arc<Diagnostics>,
		status: Arc<RecordingStatus>,
		remote: RemoteObjects,
	}

	fn harness() -> Harness {
		harness_with(DiscoverySettings::default(), CancellationToken::new())
	}

	fn harness_with(settings: DiscoverySettings, cancel: CancellationToken) -> Harness {
		let diagnostics = Arc::new(Diagnostics::new());
		let status = Arc::new(RecordingStatus::default());
		let sink: Arc<dyn StatusSink> = status.clone();
		let remote = RemoteObjects::new(Arc::clone(&diagnostics), sink, settings, cancel);
		Harness {
			diagnostics,
			status,
			remote,
		}
	}

	#[tokio::test]
	async fn test_permission_errors_while_listing_are_advised_once() {
		let cluster = base_cluster()
			.with_object(object(&deployment(), Some("web"), "api", &[("project", "web")]))
			.with_object(object(&config_map(), Some("web"), "settings", &[("project", "web")]))
			.with_object(object(&config_map(), Some("web"), "unrelated", &[]))
			.fail_list("Secret", 403)
			.fail_list("ConfigMap", 401);
		let cluster: Arc<dyn ClusterApi> = Arc::new(cluster);
		let mut h = harness();

		h.remote
			.update_remote_objects(&cluster, &common_labels(), &[])
			.await
			.unwrap();

		let api = ObjectRef::new(deployment(), Some("web"), "api");
		assert!(h.remote.get_remote_object(&api).is_some());
		assert_eq!(h.remote.remote_objects().count(), 1);
		assert!(h.remote.get_remote_namespace("kube-system").is_some());

		let warnings = h.diagnostics.warnings();
		assert_eq!(warnings.len(), 1);
		assert_eq!(warnings[0].object_ref, None);
		assert_eq!(warnings[0].message, BY_LABELS_PERMISSION_ADVISORY);
		assert!(!h.diagnostics.has_errors());

		assert_eq!(
			h.status.outcomes()[0],
			(
				"Getting remote objects by commonLabels: Failed with 2 errors".to_string(),
				StepOutcome::Warning
			)
		);
	}

	#[tokio::test]
	async fn test_forbidden_kind_keeps_matches_of_listable_kinds() {
		let cluster: Arc<dyn ClusterApi> = Arc::new(
			base_cluster()
				.with_object(object(&deployment(), Some("web"), "api", &[("app", "x")]))
				.with_object(object(&secret(), Some("web"), "token", &[("app", "x")]))
				.with_object(object(&secret(), Some("web"), "other", &[("app", "y")]))
				.with_object(object(&config_map(), Some("web"), "settings", &[("app", "x")]))
				.fail_list("ConfigMap", 403),
		);
		let mut h = harness();
		let labels = BTreeMap::from([("app".to_string(), "x".to_string())]);

		h.remote
			.update_remote_objects(&cluster, &labels, &[])
			.await
			.unwrap();

		let mut found: Vec<_> = h
			.remote
			.remote_objects()
			.map(|(r, _)| format!("{}/{}", r.gvk.kind, r.name))
			.collect();
		found.sort();
		assert_eq!(found, vec!["Deployment/api", "Secret/token"]);
		assert_eq!(h.diagnostics.warnings().len(), 1);
	}

	#[tokio::test]
	async fn test_other_list_errors_warn_per_kind() {
		let cluster: Arc<dyn ClusterApi> = Arc::new(base_cluster().fail_list("Secret", 500));
		let mut h = harness();

		h.remote
			.update_remote_objects(&cluster, &common_labels(), &[])
			.await
			.unwrap();

		let warnings = h.diagnostics.warnings();
		assert_eq!(warnings.len(), 1);
		assert_eq!(warnings[0].object_ref, Some(ObjectRef::for_kind(secret())));
		assert_eq!(h.status.outcomes()[0].1, StepOutcome::Warning);
	}

	#[tokio::test]
	async fn test_not_found_while_listing_is_ignored() {
		let cluster: Arc<dyn ClusterApi> = Arc::new(base_cluster().fail_list("Secret", 404));
		let mut h = harness();

		h.remote
			.update_remote_objects(&cluster, &common_labels(), &[])
			.await
			.unwrap();

		assert!(h.diagnostics.warnings().is_empty());
		assert_eq!(
			h.status.outcomes()[0],
			(BY_LABELS_STEP.to_string(), StepOutcome::Success)
		);
	}

	#[tokio::test]
	async fn test_only_listable_allowed_preferred_kinds_are_listed() {
		let cluster = Arc::new(
			base_cluster()
				.with_resource(GroupVersionKind::new("", "v1", "Binding"), true, &["create"])
				.with_resource(GroupVersionKind::new("apps", "v1beta1", "Deployment"), true, &["list"])
				.not_preferred("apps", "v1beta1")
				.with_resource(GroupVersionKind::new("", "v1", "Event"), true, &["list"]),
		);
		let settings = DiscoverySettings {
			excluded_kinds: vec!["Event".into()],
			..Default::default()
		};
		let mut h = harness_with(settings, CancellationToken::new());
		let api: Arc<dyn ClusterApi> = cluster.clone();

		h.remote
			.update_remote_objects(&api, &common_labels(), &[])
			.await
			.unwrap();

		let listed = cluster.listed_kinds();
		assert!(listed.contains(&"apps/v1, Kind=Deployment".to_string()));
		assert!(!listed.iter().any(|k| k.contains("Binding")));
		assert!(!listed.iter().any(|k| k.contains("Event")));
		assert!(!listed.iter().any(|k| k.contains("v1beta1")));
	}

	#[tokio::test]
	async fn test_empty_labels_skip_listing() {
		let cluster = Arc::new(base_cluster());
		let api: Arc<dyn ClusterApi> = cluster.clone();
		let mut h = harness();

		h.remote
			.update_remote_objects(&api, &BTreeMap::new(), &[])
			.await
			.unwrap();

		// only the namespace listing
		assert_eq!(cluster.listed_kinds(), vec!["v1, Kind=Namespace".to_string()]);
		assert_eq!(
			h.status.outcomes(),
			vec![("Getting namespaces".to_string(), StepOutcome::Success)]
		);
	}

	#[tokio::test]
	async fn test_missing_refs_are_fetched_once() {
		let cluster = Arc::new(
			base_cluster()
				.with_object(object(&deployment(), Some("web"), "api", &[("project", "web")]))
				.with_object(object(&secret(), Some("web"), "token", &[])),
		);
		let api: Arc<dyn ClusterApi> = cluster.clone();
		let mut h = harness();

		let found = ObjectRef::new(deployment(), Some("web"), "api");
		let token = ObjectRef::new(secret(), Some("web"), "token");
		let gone = ObjectRef::new(secret(), Some("web"), "gone");
		let refs = vec![found, token.clone(), token.clone(), gone];

		h.remote
			.update_remote_objects(&api, &common_labels(), &refs)
			.await
			.unwrap();

		let mut fetched = cluster.fetched_refs();
		fetched.sort();
		assert_eq!(fetched, vec!["Secret/web/gone", "Secret/web/token"]);
		assert!(h.remote.get_remote_object(&token).is_some());
		assert!(h.diagnostics.warnings().is_empty());
		assert!(h
			.status
			.outcomes()
			.contains(&("Getting 2 additional remote objects".to_string(), StepOutcome::Success)));
	}

	#[tokio::test]
	async fn test_permission_errors_on_refs_are_advised() {
		let token = ObjectRef::new(secret(), Some("web"), "token");
		let cluster: Arc<dyn ClusterApi> = Arc::new(base_cluster().fail_get(&token, 403));
		let mut h = harness();

		h.remote
			.update_remote_objects(&cluster, &BTreeMap::new(), &[token])
			.await
			.unwrap();

		let warnings = h.diagnostics.warnings();
		assert_eq!(warnings.len(), 1);
		assert_eq!(warnings[0].message, MISSING_PERMISSION_ADVISORY);
	}

	#[tokio::test]
	async fn test_other_errors_on_refs_are_fatal_and_keep_snapshot() {
		let token = ObjectRef::new(secret(), Some("web"), "token");
		let api_ref = ObjectRef::new(deployment(), Some("web"), "api");
		let cluster: Arc<dyn ClusterApi> = Arc::new(
			base_cluster()
				.with_object(object(&deployment(), Some("web"), "api", &[("project", "web")])),
		);
		let mut h = harness();
		h.remote
			.update_remote_objects(&cluster, &common_labels(), &[])
			.await
			.unwrap();
		assert!(h.remote.get_remote_object(&api_ref).is_some());

		let failing: Arc<dyn ClusterApi> = Arc::new(base_cluster().fail_get(&token, 500));
		let err = h
			.remote
			.update_remote_objects(&failing, &common_labels(), &[token.clone()])
			.await
			.unwrap_err();

		assert_matches!(&err, ReconcileError::FetchMissing(errors) if errors.len() == 1);
		if let ReconcileError::FetchMissing(errors) = &err {
			assert_matches!(
				errors.first(),
				Some(TaskError::Failed(ObjectFetchError { object_ref, .. })) if *object_ref == token
			);
		}
		let errors = h.diagnostics.errors();
		assert_eq!(errors.len(), 1);
		// the cause from the api server is kept
		assert!(errors[0].message.starts_with("failed to get "));
		assert!(errors[0].message.ends_with("fake failure 500 (InternalError, status 500)"));
		assert_eq!(errors[0].object_ref, Some(token));
		// previous snapshot is untouched
		assert!(h.remote.get_remote_object(&api_ref).is_some());
		assert_eq!(h.status.outcomes().last().unwrap().1, StepOutcome::Failed);
	}

	#[tokio::test]
	async fn test_namespace_failure_is_fatal() {
		let cluster: Arc<dyn ClusterApi> = Arc::new(
			base_cluster()
				.with_object(object(&deployment(), Some("web"), "api", &[("project", "web")]))
				.fail_list("Namespace", 500),
		);
		let mut h = harness();

		let err = h
			.remote
			.update_remote_objects(&cluster, &common_labels(), &[])
			.await
			.unwrap_err();

		assert_matches!(err, ReconcileError::ListNamespaces(e) if e.code() == Some(500));
		assert_eq!(h.remote.remote_objects().count(), 0);
		assert_eq!(
			h.status.outcomes().last().unwrap(),
			&("Getting namespaces".to_string(), StepOutcome::Failed)
		);
	}

	#[tokio::test]
	async fn test_api_warnings_are_recorded() {
		let token = ObjectRef::new(secret(), Some("web"), "token");
		let cluster: Arc<dyn ClusterApi> = Arc::new(
			base_cluster()
				.with_object(object(&secret(), Some("web"), "token", &[]))
				.warn_on_get(&token, "v1 Secret is deprecated"),
		);
		let mut h = harness();

		h.remote
			.update_remote_objects(&cluster, &BTreeMap::new(), &[token.clone()])
			.await
			.unwrap();

		let api_warnings = h.diagnostics.api_warnings();
		assert_eq!(api_warnings.len(), 1);
		assert_eq!(api_warnings[0].object_ref, Some(token));
	}

	#[tokio::test]
	async fn test_cancelled_pass_fails_without_publishing() {
		let cancel = CancellationToken::new();
		cancel.cancel();
		let cluster: Arc<dyn ClusterApi> = Arc::new(
			base_cluster()
				.with_object(object(&deployment(), Some("web"), "api", &[("project", "web")])),
		);
		let mut h = harness_with(DiscoverySettings::default(), cancel);

		let err = h
			.remote
			.update_remote_objects(&cluster, &common_labels(), &[])
			.await
			.unwrap_err();

		assert_matches!(err, ReconcileError::ListByLabels(errors) if errors.is_cancelled());
		assert_eq!(h.remote.remote_objects().count(), 0);
	}

	#[tokio::test]
	async fn test_cancelled_namespace_listing() {
		let cancel = CancellationToken::new();
		cancel.cancel();
		let cluster: Arc<dyn ClusterApi> = Arc::new(base_cluster());
		let mut h = harness_with(DiscoverySettings::default(), cancel);

		let err = h
			.remote
			.update_remote_objects(&cluster, &BTreeMap::new(), &[])
			.await
			.unwrap_err();

		assert_matches!(err, ReconcileError::Cancelled);
	}

	#[tokio::test]
	async fn test_filtered_view_and_forget() {
		let cluster: Arc<dyn ClusterApi> = Arc::new(
			base_cluster()
				.with_object(object(
					&deployment(),
					Some("web"),
					"api",
					&[("project", "web"), ("kluctl.io/tag-0", "backend")],
				))
				.with_object(object(
					&deployment(),
					Some("web"),
					"ui",
					&[("project", "web"), ("kluctl.io/tag-0", "frontend")],
				))
				.with_object(object(&config_map(), Some("web"), "untagged", &[("project", "web")])),
		);
		let mut h = harness();
		h.remote
			.update_remote_objects(&cluster, &common_labels(), &[])
			.await
			.unwrap();

		assert_eq!(h.remote.get_filtered_remote_objects(&Inclusion::new()).len(), 3);

		let mut inclusion = Inclusion::new();
		inclusion.add_include(k8s::InclusionType::Tag, "backend");
		let names: Vec<_> = h
			.remote
			.get_filtered_remote_objects(&inclusion)
			.into_iter()
			.map(|(r, _)| r.name.clone())
			.collect();
		assert_eq!(names, vec!["api"]);

		let mut exclusion = Inclusion::new();
		exclusion.add_exclude(k8s::InclusionType::Tag, "backend");
		assert_eq!(h.remote.get_filtered_remote_objects(&exclusion).len(), 2);

		let api = ObjectRef::new(deployment(), Some("web"), "api");
		h.remote.forget_remote_object(&api);
		assert!(h.remote.get_remote_object(&api).is_none());
		assert_eq!(h.remote.get_filtered_remote_objects(&inclusion).len(), 0);
	}
}
