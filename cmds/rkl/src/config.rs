//! Configuration file support for rkl
//!
//! Supports `.rkl-config.yaml` files that can be placed anywhere in the directory
//! hierarchy. rkl searches from the project directory upward to the filesystem root.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use k8s::GroupVersionKind;
use serde::Deserialize;

/// The name of the config file rkl looks for
pub const CONFIG_FILE_NAME: &str = ".rkl-config.yaml";

/// Root configuration structure for .rkl-config.yaml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RklConfig {
	#[serde(default)]
	pub git_cache: GitCacheSettings,

	#[serde(default)]
	pub discovery: DiscoverySettings,
}

/// How git projects are mirrored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitCacheSettings {
	/// Where mirrors are kept. Defaults to the user cache directory.
	pub cache_dir: Option<PathBuf>,
	pub include_tags: bool,
	/// Depth 1 fetches. Local `file://` remotes don't support them.
	pub shallow: bool,
	pub max_concurrent_refreshes: usize,
}

impl Default for GitCacheSettings {
	fn default() -> Self {
		Self {
			cache_dir: None,
			include_tags: true,
			shallow: false,
			max_concurrent_refreshes: 8,
		}
	}
}

impl GitCacheSettings {
	pub fn effective_cache_dir(&self) -> PathBuf {
		self.cache_dir
			.clone()
			.or_else(|| dirs::cache_dir().map(|dir| dir.join("rkl")))
			.unwrap_or_else(|| std::env::temp_dir().join("rkl-cache"))
	}
}

/// Which resource kinds are listed when gathering remote objects by labels.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoverySettings {
	pub max_concurrent_requests: usize,
	/// API groups never listed, `""` being the core group.
	pub excluded_groups: Vec<String>,
	/// Kinds never listed, either `Kind` or `Kind.group`.
	pub excluded_kinds: Vec<String>,
}

impl Default for DiscoverySettings {
	fn default() -> Self {
		Self {
			max_concurrent_requests: 16,
			excluded_groups: Vec::new(),
			excluded_kinds: Vec::new(),
		}
	}
}

impl DiscoverySettings {
	pub fn allows(&self, gvk: &GroupVersionKind) -> bool {
		if self.excluded_groups.iter().any(|g| *g == gvk.group) {
			return false;
		}
		!self.excluded_kinds.iter().any(|k| match k.split_once('.') {
			Some((kind, group)) => kind == gvk.kind && group == gvk.group,
			None => *k == gvk.kind,
		})
	}
}

impl RklConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let config: RklConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		Ok(config)
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	// Canonicalize if possible to handle relative paths
	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.exists() {
			return Some(config_path);
		}
		if !current.pop() {
			return None;
		}
	}
}
