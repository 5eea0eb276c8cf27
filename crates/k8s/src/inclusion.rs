//! Tag based scoping of objects for bulk operations such as pruning.

use std::{collections::HashSet, fmt, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Object;

/// Labels carrying deployment tags, numbered from zero.
pub const TAG_LABEL_PATTERN: &str = r"^kluctl\.io/tag-\d+$";

/// Annotation recording the deployment item directory an object was rendered from.
pub const KUSTOMIZE_DIR_ANNOTATION: &str = "kluctl.io/kustomize_dir";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InclusionType {
	Tag,
	DeploymentItemDir,
}

impl InclusionType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Tag => "tag",
			Self::DeploymentItemDir => "deploymentItemDir",
		}
	}
}

impl fmt::Display for InclusionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
#[error("unknown inclusion type `{0}`")]
pub struct UnknownInclusionType(String);

impl FromStr for InclusionType {
	type Err = UnknownInclusionType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"tag" => Ok(Self::Tag),
			"deploymentItemDir" => Ok(Self::DeploymentItemDir),
			other => Err(UnknownInclusionType(other.to_owned())),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InclusionEntry {
	#[serde(rename = "type")]
	pub ty: InclusionType,
	pub value: String,
}

impl InclusionEntry {
	pub fn new(ty: InclusionType, value: impl Into<String>) -> Self {
		Self {
			ty,
			value: value.into(),
		}
	}

	pub fn tag(value: impl Into<String>) -> Self {
		Self::new(InclusionType::Tag, value)
	}

	pub fn deployment_item_dir(value: impl Into<String>) -> Self {
		Self::new(InclusionType::DeploymentItemDir, value)
	}
}

/// Include and exclude lists of [`InclusionEntry`].
#[derive(Debug, Clone, Default)]
pub struct Inclusion {
	includes: HashSet<InclusionEntry>,
	excludes: HashSet<InclusionEntry>,
}

impl Inclusion {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_include(&mut self, ty: InclusionType, value: impl Into<String>) {
		self.includes.insert(InclusionEntry::new(ty, value));
	}

	pub fn add_exclude(&mut self, ty: InclusionType, value: impl Into<String>) {
		self.excludes.insert(InclusionEntry::new(ty, value));
	}

	/// Whether any include or exclude uses the given type.
	pub fn has_type(&self, ty: InclusionType) -> bool {
		self.includes.iter().chain(&self.excludes).any(|e| e.ty == ty)
	}

	pub fn is_empty(&self) -> bool {
		self.includes.is_empty() && self.excludes.is_empty()
	}

	/// Decide whether something carrying `entries` is in scope.
	///
	/// An excluded entry always wins. Without includes everything not excluded
	/// is in scope unless `exclude_if_not_included` is set; with includes at
	/// least one entry has to match.
	pub fn check_included(&self, entries: &[InclusionEntry], exclude_if_not_included: bool) -> bool {
		if entries.iter().any(|e| self.excludes.contains(e)) {
			return false;
		}
		if self.includes.is_empty() {
			return !exclude_if_not_included;
		}
		entries.iter().any(|e| self.includes.contains(e))
	}
}

fn tag_label_regex() -> &'static Regex {
	static TAG_LABEL: OnceLock<Regex> = OnceLock::new();
	TAG_LABEL.get_or_init(|| Regex::new(TAG_LABEL_PATTERN).expect("tag label pattern is valid"))
}

/// Entries an object carries: one `tag` per numbered tag label and the
/// deployment item directory annotation when present.
pub fn object_inclusion_entries(object: &Object) -> Vec<InclusionEntry> {
	let re = tag_label_regex();
	let mut entries: Vec<_> = object
		.labels()
		.filter(|(k, _)| re.is_match(k))
		.map(|(_, v)| InclusionEntry::tag(v))
		.collect();
	if let Some(dir) = object.annotation(KUSTOMIZE_DIR_ANNOTATION) {
		entries.push(InclusionEntry::deployment_item_dir(dir));
	}
	entries
}
