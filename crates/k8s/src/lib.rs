//! Shared Kubernetes object model for rkl.
//!
//! Objects are kept unstructured (plain JSON) since the reconciler works with
//! whatever kinds the cluster serves, including custom resources.

mod inclusion;
mod object;
mod refs;

pub use inclusion::{
	object_inclusion_entries, Inclusion, InclusionEntry, InclusionType, UnknownInclusionType,
	KUSTOMIZE_DIR_ANNOTATION, TAG_LABEL_PATTERN,
};
pub use object::Object;
pub use refs::{GroupVersionKind, ObjectRef};
