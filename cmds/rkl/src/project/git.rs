use std::{
	collections::{BTreeMap, HashSet},
	path::{Component, Path, PathBuf},
	sync::Arc,
};

use rkl_git::{GitUrl, RepoInfo};
use tracing::{debug, info, instrument};

use super::{CacheUpdateError, GitProject, LoadedProject, ProjectError};
use crate::task_group::TaskGroup;

const DEFAULT_REF: &str = "HEAD";

/// A git project exported for this run.
#[derive(Debug, Clone)]
pub struct LoadedGitProject {
	/// The project's directory, `clone_dir` joined with its subdir.
	pub dir: PathBuf,
	pub clone_dir: PathBuf,
	pub info: RepoInfo,
}

impl LoadedProject {
	/// Refresh the mirror of every git project the deployment references.
	///
	/// Every refresh runs to completion even when others fail; all failures
	/// are returned together.
	#[instrument(skip_all)]
	pub async fn update_git_caches(&self) -> Result<(), ProjectError> {
		let mut seen = HashSet::new();
		let urls: Vec<GitUrl> = self
			.config
			.git_urls()
			.into_iter()
			.filter(|url| seen.insert(url.normalized_repo_key()))
			.cloned()
			.collect();
		info!(repos = urls.len(), "updating git caches");

		let mut group = TaskGroup::new(self.settings.max_concurrent_refreshes, self.cancel.clone());
		for url in urls {
			let cache = Arc::clone(&self.repo_cache);
			let include_tags = self.settings.include_tags;
			let shallow = self.settings.shallow;
			group.spawn(async move {
				match cache.get_mirrored_repo(&url, true, include_tags, shallow).await {
					Ok(_) => Ok(()),
					Err(source) => Err(CacheUpdateError { url, source }),
				}
			});
		}
		group.wait().await.map_err(ProjectError::UpdateCaches)
	}

	/// Export `project` into `target_dir`, refreshing its mirror first unless
	/// this run already did.
	#[instrument(skip_all, fields(url = %project.url, git_ref = ?project.git_ref))]
	pub async fn clone_git_project(
		&self,
		project: &GitProject,
		target_dir: &Path,
	) -> Result<RepoInfo, ProjectError> {
		create_private_dir(&self.tmp_dir.join("git")).await?;

		let repo = self
			.repo_cache
			.get_mirrored_repo(
				&project.url,
				true,
				self.settings.include_tags,
				self.settings.shallow,
			)
			.await?;
		let info = repo
			.checkout_into(project.git_ref.as_deref(), target_dir)
			.await?;
		debug!(commit = %info.commit, dir = %target_dir.display(), "exported git project");
		Ok(info)
	}

	/// Where `url` at `git_ref` is exported:
	/// `<archive or tmp dir>/git/<name>-<hash>/<ref>`, with path separators
	/// in the ref replaced by `-`.
	pub fn build_clone_dir(&self, url: &GitUrl, git_ref: Option<&str>) -> Result<PathBuf, ProjectError> {
		let base = self
			.archive_dir
			.as_deref()
			.unwrap_or(&self.tmp_dir)
			.join("git");

		let git_ref = git_ref.filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REF);
		if git_ref.contains('\0') {
			return Err(ProjectError::InvalidRef(git_ref.escape_debug().to_string()));
		}
		let traversal = || ProjectError::PathTraversal {
			base: base.clone(),
			path: git_ref.to_string(),
		};
		if git_ref.split(['/', '\\']).any(|c| c == "." || c == "..") {
			return Err(traversal());
		}

		let dir = base.join(url.cache_dir_name()).join(git_ref.replace(['/', '\\'], "-"));
		let dir = normalize(&dir);
		let base = normalize(&base);
		if dir == base || !dir.starts_with(&base) {
			return Err(traversal());
		}
		Ok(dir)
	}

	/// Export `project` once per run and record it as involved.
	pub async fn load_git_project(&self, project: &GitProject) -> Result<LoadedGitProject, ProjectError> {
		let clone_dir = self.build_clone_dir(&project.url, project.git_ref.as_deref())?;
		let dir = match &project.subdir {
			Some(subdir) => join_inside(&clone_dir, subdir)?,
			None => clone_dir.clone(),
		};

		let export = Arc::clone(self.exports.lock().entry(clone_dir.clone()).or_default());
		let info = export
			.get_or_try_init(|| self.clone_git_project(project, &clone_dir))
			.await?
			.clone();

		let ref_pattern = project.git_ref.as_deref().unwrap_or(DEFAULT_REF);
		self.add_involved_repo(
			&project.url,
			ref_pattern,
			BTreeMap::from([(ref_pattern.to_string(), info.commit.clone())]),
		);

		Ok(LoadedGitProject {
			dir,
			clone_dir,
			info,
		})
	}
}

async fn create_private_dir(path: &Path) -> Result<(), ProjectError> {
	let mut builder = tokio::fs::DirBuilder::new();
	builder.recursive(true);
	#[cfg(unix)]
	builder.mode(0o700);
	builder
		.create(path)
		.await
		.map_err(|source| ProjectError::CreateDir {
			path: path.to_path_buf(),
			source,
		})
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
	let mut out = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				out.pop();
			}
			other => out.push(other),
		}
	}
	out
}

/// Join a relative path from a project file onto `base`.
fn join_inside(base: &Path, relative: &str) -> Result<PathBuf, ProjectError> {
	let plain = Path::new(relative)
		.components()
		.all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
	if !plain {
		return Err(ProjectError::PathTraversal {
			base: base.to_path_buf(),
			path: relative.to_string(),
		});
	}
	Ok(normalize(&base.join(relative)))
}
