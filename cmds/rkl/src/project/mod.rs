//! The desired state side: git projects of a deployment, mirrored and
//! exported into a per-run directory.

use std::{
	collections::{BTreeMap, HashMap},
	path::{Path, PathBuf},
	sync::Arc,
};

use parking_lot::Mutex;
use rkl_git::{GitError, GitRepoCache, GitUrl, RepoInfo};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::{config::GitCacheSettings, task_group::TaskErrors};

pub mod config;
mod git;

pub use config::{ExternalProject, GitProject, ProjectConfig, PROJECT_CONFIG_FILE};
pub use git::LoadedGitProject;

#[derive(Debug, Error)]
pub enum ProjectError {
	#[error("failed to read {}", path.display())]
	ReadConfig {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {}", path.display())]
	ParseConfig {
		path: PathBuf,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},

	#[error("failed to update git caches: {0}")]
	UpdateCaches(TaskErrors<CacheUpdateError>),

	#[error("failed to create {}", path.display())]
	CreateDir {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	Git(#[from] GitError),

	#[error("`{path}` escapes {}", base.display())]
	PathTraversal { base: PathBuf, path: String },

	#[error("invalid git ref `{0}`")]
	InvalidRef(String),
}

#[derive(Debug, Error)]
#[error("failed to update cache of {url}")]
pub struct CacheUpdateError {
	pub url: GitUrl,
	#[source]
	pub source: GitError,
}

/// A ref pattern a deployment used and the commits it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvolvedRepo {
	pub ref_pattern: String,
	pub refs: BTreeMap<String, String>,
}

/// A deployment project and everything loaded on its behalf during one run.
pub struct LoadedProject {
	config: ProjectConfig,
	repo_cache: Arc<GitRepoCache>,
	tmp_dir: PathBuf,
	archive_dir: Option<PathBuf>,
	settings: GitCacheSettings,
	cancel: CancellationToken,
	/// Keyed by normalized repo key, each list sorted by ref pattern.
	involved_repos: Mutex<BTreeMap<String, Vec<InvolvedRepo>>>,
	/// One export per clone dir; concurrent loads of the same dir share it.
	exports: Mutex<HashMap<PathBuf, Arc<OnceCell<RepoInfo>>>>,
}

impl LoadedProject {
	pub fn new(config: ProjectConfig, repo_cache: Arc<GitRepoCache>, tmp_dir: impl Into<PathBuf>) -> Self {
		Self {
			config,
			repo_cache,
			tmp_dir: tmp_dir.into(),
			archive_dir: None,
			settings: GitCacheSettings::default(),
			cancel: CancellationToken::new(),
			involved_repos: Mutex::default(),
			exports: Mutex::default(),
		}
	}

	/// Read the project file in `project_dir`.
	pub fn load(
		project_dir: &Path,
		repo_cache: Arc<GitRepoCache>,
		tmp_dir: impl Into<PathBuf>,
	) -> Result<Self, ProjectError> {
		Ok(Self::new(ProjectConfig::load(project_dir)?, repo_cache, tmp_dir))
	}

	/// Export into `archive_dir` instead of the temp dir, e.g. to keep the
	/// sources of a deployment around.
	pub fn with_archive_dir(mut self, archive_dir: impl Into<PathBuf>) -> Self {
		self.archive_dir = Some(archive_dir.into());
		self
	}

	pub fn with_settings(mut self, settings: GitCacheSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;
		self
	}

	pub fn config(&self) -> &ProjectConfig {
		&self.config
	}

	pub fn tmp_dir(&self) -> &Path {
		&self.tmp_dir
	}

	/// Record that `url` was used through `ref_pattern`. Recording the same
	/// entry twice is a no-op.
	pub fn add_involved_repo(&self, url: &GitUrl, ref_pattern: &str, refs: BTreeMap<String, String>) {
		let entry = InvolvedRepo {
			ref_pattern: ref_pattern.to_string(),
			refs,
		};
		let mut involved = self.involved_repos.lock();
		let entries = involved.entry(url.normalized_repo_key()).or_default();
		if entries.contains(&entry) {
			return;
		}
		let at = entries.partition_point(|e| e.ref_pattern <= entry.ref_pattern);
		entries.insert(at, entry);
	}

	pub fn involved_repos(&self) -> BTreeMap<String, Vec<InvolvedRepo>> {
		self.involved_repos.lock().clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn project(tmp: &Path) -> LoadedProject {
		LoadedProject::new(
			ProjectConfig::default(),
			Arc::new(GitRepoCache::new(tmp.join("cache"))),
			tmp.join("tmp"),
		)
	}

	fn refs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs
			.iter()
			.map(|(k, v)| ((*k).to_string(), (*v).to_string()))
			.collect()
	}

	#[test]
	fn test_involved_repos_are_deduplicated_and_sorted() {
		let temp = tempfile::TempDir::new().unwrap();
		let project = project(temp.path());
		let url = GitUrl::parse("https://github.com/example/deploy.git").unwrap();
		let same = GitUrl::parse("https://GitHub.com/example/deploy/").unwrap();

		project.add_involved_repo(&url, "main", refs(&[("main", "aaa")]));
		project.add_involved_repo(&url, "HEAD", refs(&[("HEAD", "bbb")]));
		project.add_involved_repo(&same, "main", refs(&[("main", "aaa")]));
		project.add_involved_repo(&url, "main", refs(&[("main", "ccc")]));

		let involved = project.involved_repos();
		assert_eq!(involved.len(), 1);
		let patterns: Vec<_> = involved["github.com/example/deploy"]
			.iter()
			.map(|e| e.ref_pattern.as_str())
			.collect();
		assert_eq!(patterns, vec!["HEAD", "main", "main"]);
		assert_eq!(involved["github.com/example/deploy"][1].refs["main"], "aaa");
		assert_eq!(involved["github.com/example/deploy"][2].refs["main"], "ccc");
	}
}
