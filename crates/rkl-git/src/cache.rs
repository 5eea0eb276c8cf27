//! Process-wide cache of bare git mirrors.

use std::{
	collections::HashMap,
	fs, io,
	path::{Path, PathBuf},
	sync::Arc,
};

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::{
	error::error_chain, FetchOptions, Git2Backend, GitError, GitUrl, MirrorBackend, RepoInfo,
};

/// Name of the bare repository inside a repository's cache directory. Git
/// refs may not start with a dot, so exports next to it never collide.
pub const MIRROR_DIR: &str = ".mirror";

#[derive(Debug, Default)]
enum RefreshState {
	#[default]
	Pending,
	Refreshed,
	Failed(String),
}

/// A bare mirror owned by [`GitRepoCache`].
///
/// The refresh lock is held exclusively while fetching and shared while
/// exporting, so an export never sees a half-updated mirror.
pub struct MirroredRepo {
	url: GitUrl,
	dir: PathBuf,
	backend: Arc<dyn MirrorBackend>,
	state: Arc<RwLock<RefreshState>>,
}

impl std::fmt::Debug for MirroredRepo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MirroredRepo")
			.field("url", &self.url)
			.field("dir", &self.dir)
			.finish_non_exhaustive()
	}
}

impl MirroredRepo {
	pub fn url(&self) -> &GitUrl {
		&self.url
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Fetch once per cache lifetime. Callers arriving while a fetch is
	/// running wait for it and get its outcome.
	async fn ensure_refreshed(self: &Arc<Self>, opts: FetchOptions) -> Result<(), GitError> {
		let mut guard = Arc::clone(&self.state).write_owned().await;
		match &*guard {
			RefreshState::Refreshed => return Ok(()),
			RefreshState::Failed(message) => {
				return Err(GitError::RefreshFailed {
					url: self.url.to_string(),
					message: message.clone(),
				})
			}
			RefreshState::Pending => {}
		}

		let this = Arc::clone(self);
		// The guard moves into the blocking task so that a caller dropping
		// this future can't release the lock while git is still running.
		let (result, had_mirror) = tokio::task::spawn_blocking(move || {
			let had_mirror = this.backend.has_mirror(&this.dir);
			let result = this.backend.fetch(&this.url, &this.dir, opts);
			*guard = match &result {
				Ok(()) => RefreshState::Refreshed,
				Err(_) if had_mirror => RefreshState::Refreshed,
				Err(err) => RefreshState::Failed(error_chain(err)),
			};
			(result, had_mirror)
		})
		.await
		.map_err(GitError::TaskPanicked)?;

		match result {
			Ok(()) => {
				debug!(url = %self.url, "mirror refreshed");
				Ok(())
			}
			Err(err) if had_mirror => {
				warn!(
					url = %self.url,
					error = %error_chain(&err),
					"failed to refresh git mirror, using cached copy"
				);
				Ok(())
			}
			Err(err) => Err(err),
		}
	}

	/// Export `git_ref` (HEAD when `None`) into `target_dir`.
	///
	/// The tree is written into a fresh sibling directory which then replaces
	/// `target_dir`, so nothing from an earlier export survives.
	#[instrument(skip(self, target_dir), fields(url = %self.url))]
	pub async fn checkout_into(
		self: &Arc<Self>,
		git_ref: Option<&str>,
		target_dir: &Path,
	) -> Result<RepoInfo, GitError> {
		let guard = Arc::clone(&self.state).read_owned().await;
		let this = Arc::clone(self);
		let git_ref = git_ref.map(str::to_owned);
		let target_dir = target_dir.to_path_buf();

		tokio::task::spawn_blocking(move || {
			let _guard = guard;
			let staging = staging_dir(&target_dir)?;
			let info = this
				.backend
				.export(&this.url, &this.dir, git_ref.as_deref(), staging.path())?;
			replace_dir(staging, &target_dir)?;
			Ok(info)
		})
		.await
		.map_err(GitError::TaskPanicked)?
	}
}

fn staging_dir(target: &Path) -> Result<TempDir, GitError> {
	let parent = target
		.parent()
		.filter(|p| !p.as_os_str().is_empty())
		.unwrap_or_else(|| Path::new("."));
	fs::create_dir_all(parent).map_err(GitError::io(parent))?;
	tempfile::Builder::new()
		.prefix(".rkl-export-")
		.tempdir_in(parent)
		.map_err(GitError::io(parent))
}

/// Move `staging` to `target`, removing whatever `target` held before.
fn replace_dir(staging: TempDir, target: &Path) -> Result<(), GitError> {
	match fs::symlink_metadata(target) {
		Ok(meta) if meta.is_dir() => fs::remove_dir_all(target).map_err(GitError::io(target))?,
		Ok(_) => fs::remove_file(target).map_err(GitError::io(target))?,
		Err(err) if err.kind() == io::ErrorKind::NotFound => {}
		Err(err) => return Err(GitError::io(target)(err)),
	}
	fs::rename(staging.path(), target).map_err(GitError::io(target))?;
	// the directory lives on as `target`
	let _ = staging.keep();
	Ok(())
}

/// Deduplicating cache of bare mirrors under `<base_dir>/git`.
///
/// One [`MirroredRepo`] exists per normalized repository key for the whole
/// lifetime of the cache, no matter how the url was spelled.
pub struct GitRepoCache {
	base_dir: PathBuf,
	backend: Arc<dyn MirrorBackend>,
	repos: Mutex<HashMap<String, Arc<MirroredRepo>>>,
}

impl GitRepoCache {
	pub fn new(base_dir: impl Into<PathBuf>) -> Self {
		Self::with_backend(base_dir, Arc::new(Git2Backend::default()))
	}

	pub fn with_backend(base_dir: impl Into<PathBuf>, backend: Arc<dyn MirrorBackend>) -> Self {
		Self {
			base_dir: base_dir.into(),
			backend,
			repos: Mutex::new(HashMap::new()),
		}
	}

	pub fn base_dir(&self) -> &Path {
		&self.base_dir
	}

	/// Where the mirror of `url` lives, whether or not it exists yet.
	pub fn mirror_dir(&self, url: &GitUrl) -> PathBuf {
		self.base_dir
			.join("git")
			.join(url.cache_dir_name())
			.join(MIRROR_DIR)
	}

	fn entry(&self, url: &GitUrl) -> Arc<MirroredRepo> {
		let mut repos = self.repos.lock();
		let repo = repos.entry(url.normalized_repo_key()).or_insert_with(|| {
			Arc::new(MirroredRepo {
				url: url.clone(),
				dir: self.mirror_dir(url),
				backend: Arc::clone(&self.backend),
				state: Arc::default(),
			})
		});
		Arc::clone(repo)
	}

	/// Get the mirror of `url`, fetching it when asked to or when it does not
	/// exist on disk yet.
	///
	/// A failed refresh of an existing mirror only logs a warning and the
	/// stale mirror is returned.
	#[instrument(skip(self, url), fields(url = %url))]
	pub async fn get_mirrored_repo(
		&self,
		url: &GitUrl,
		refresh: bool,
		include_tags: bool,
		shallow: bool,
	) -> Result<Arc<MirroredRepo>, GitError> {
		let repo = self.entry(url);

		if !refresh {
			let has_mirror = {
				// waits out a refresh that is already running
				let _state = repo.state.read().await;
				self.backend.has_mirror(&repo.dir)
			};
			if has_mirror {
				return Ok(repo);
			}
		}

		repo.ensure_refreshed(FetchOptions {
			include_tags,
			shallow,
		})
		.await?;
		Ok(repo)
	}
}
