//! The `.rkl-project.yaml` file naming the git projects a deployment uses.

use std::{fs, path::Path};

use rkl_git::GitUrl;
use serde::Deserialize;

use super::ProjectError;

pub const PROJECT_CONFIG_FILE: &str = ".rkl-project.yaml";

/// A revision of a git repository, optionally narrowed to a subdirectory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitProject {
	pub url: GitUrl,
	#[serde(default, rename = "ref")]
	pub git_ref: Option<String>,
	#[serde(default)]
	pub subdir: Option<String>,
}

impl GitProject {
	pub fn new(url: GitUrl) -> Self {
		Self {
			url,
			git_ref: None,
			subdir: None,
		}
	}

	pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
		self.git_ref = Some(git_ref.into());
		self
	}
}

/// A git project mounted at `path` inside the deployment. Entries without a
/// project refer to a local path only and are not mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalProject {
	#[serde(default)]
	pub project: Option<GitProject>,
	#[serde(default)]
	pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClustersConfig {
	#[serde(default)]
	pub projects: Vec<ExternalProject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
	#[serde(default)]
	pub project: Option<GitProject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
	pub name: String,
	#[serde(default)]
	pub target_config: Option<TargetConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
	#[serde(default)]
	pub deployment: Option<GitProject>,
	#[serde(default)]
	pub sealed_secrets: Option<GitProject>,
	#[serde(default)]
	pub clusters: ClustersConfig,
	#[serde(default)]
	pub targets: Vec<Target>,
}

impl ProjectConfig {
	/// Read `<dir>/.rkl-project.yaml`. A missing file is an empty project.
	pub fn load(dir: &Path) -> Result<Self, ProjectError> {
		let path = dir.join(PROJECT_CONFIG_FILE);
		if !path.exists() {
			return Ok(Self::default());
		}
		let content = fs::read_to_string(&path).map_err(|source| ProjectError::ReadConfig {
			path: path.clone(),
			source,
		})?;
		serde_yaml_with_quirks::from_str(&content)
			.map_err(|source| ProjectError::ParseConfig { path, source })
	}

	/// Every git project referenced, in declaration order, with duplicates.
	pub fn git_projects(&self) -> Vec<&GitProject> {
		let targets = self
			.targets
			.iter()
			.filter_map(|t| t.target_config.as_ref()?.project.as_ref());
		self.deployment
			.iter()
			.chain(self.sealed_secrets.iter())
			.chain(self.clusters.projects.iter().filter_map(|p| p.project.as_ref()))
			.chain(targets)
			.collect()
	}

	pub fn git_urls(&self) -> Vec<&GitUrl> {
		self.git_projects().into_iter().map(|p| &p.url).collect()
	}
}
