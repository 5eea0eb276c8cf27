//! Blocking git operations behind the mirror cache.

use std::{
	fs,
	path::{Component, Path},
};

use auth_git2::GitAuthenticator;
use git2::{
	AutotagOption, Config, DescribeOptions, Direction, FetchPrune, ObjectType, RemoteCallbacks,
	Repository, Tree,
};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{GitError, GitUrl};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
	pub include_tags: bool,
	/// Fetch only the tip commit of each ref. Not supported by every
	/// transport; local repositories reject it.
	pub shallow: bool,
}

/// What was exported into a clone directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoInfo {
	pub url: GitUrl,
	#[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
	pub git_ref: Option<String>,
	pub commit: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub describe: Option<String>,
}

/// Git operations on a bare mirror directory.
///
/// Every method blocks; [`crate::GitRepoCache`] calls them from the blocking
/// pool and guarantees that `fetch` never overlaps another `fetch` or an
/// `export` of the same directory.
pub trait MirrorBackend: Send + Sync + 'static {
	/// Create the mirror at `dir` when missing and update it from `url`.
	fn fetch(&self, url: &GitUrl, dir: &Path, opts: FetchOptions) -> Result<(), GitError>;

	/// Write the tree of `git_ref` (the mirror's HEAD when `None`) into
	/// `target` as plain files. `target` is a fresh empty directory.
	fn export(
		&self,
		url: &GitUrl,
		dir: &Path,
		git_ref: Option<&str>,
		target: &Path,
	) -> Result<RepoInfo, GitError>;

	/// Whether `dir` already holds a usable mirror.
	fn has_mirror(&self, dir: &Path) -> bool {
		dir.join("HEAD").is_file()
	}
}

/// [`MirrorBackend`] on top of libgit2.
///
/// Remotes asking for credentials are answered from the ssh agent, the
/// default ssh keys and the configured git credential helpers. Nothing is
/// prompted for.
pub struct Git2Backend {
	/// Builds the authenticator for one fetch.
	auth: Box<dyn Fn() -> GitAuthenticator + Send + Sync>,
}

impl Default for Git2Backend {
	fn default() -> Self {
		Self::with_authenticator(|| {
			GitAuthenticator::default()
				.try_password_prompt(0)
				.prompt_ssh_key_password(false)
		})
	}
}

impl std::fmt::Debug for Git2Backend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Git2Backend").finish_non_exhaustive()
	}
}

impl Git2Backend {
	pub fn with_authenticator(auth: impl Fn() -> GitAuthenticator + Send + Sync + 'static) -> Self {
		Self {
			auth: Box::new(auth),
		}
	}

	fn fetch_into(&self, repo: &Repository, url: &GitUrl, opts: FetchOptions) -> Result<(), GitError> {
		let git_err = GitError::git(url);
		// includes the user's global and system git config
		let config = repo.config().map_err(&git_err)?;
		let auth = (self.auth)();
		let mut remote = repo.remote_anonymous(url.as_str()).map_err(&git_err)?;

		// empty remotes have no default branch
		let default_branch = {
			let mut connection = remote
				.connect_auth(Direction::Fetch, Some(remote_callbacks(&auth, &config)), None)
				.map_err(&git_err)?;
			connection
				.remote()
				.default_branch()
				.ok()
				.and_then(|buf| buf.as_str().map(str::to_owned))
		};

		let mut refspecs = vec!["+refs/heads/*:refs/heads/*"];
		if opts.include_tags {
			refspecs.push("+refs/tags/*:refs/tags/*");
		}

		let mut fetch_opts = git2::FetchOptions::new();
		fetch_opts.remote_callbacks(remote_callbacks(&auth, &config));
		fetch_opts.prune(FetchPrune::On);
		fetch_opts.download_tags(if opts.include_tags {
			AutotagOption::All
		} else {
			AutotagOption::None
		});
		if opts.shallow {
			fetch_opts.depth(1);
		}

		remote
			.fetch(&refspecs, Some(&mut fetch_opts), None)
			.map_err(&git_err)?;

		if let Some(branch) = default_branch {
			debug!(branch = %branch, "recording remote HEAD");
			repo.set_head(&branch).map_err(&git_err)?;
		}
		Ok(())
	}
}

impl MirrorBackend for Git2Backend {
	#[instrument(skip_all, fields(url = %url))]
	fn fetch(&self, url: &GitUrl, dir: &Path, opts: FetchOptions) -> Result<(), GitError> {
		let git_err = GitError::git(url);

		if self.has_mirror(dir) {
			let repo = Repository::open_bare(dir).map_err(&git_err)?;
			return self.fetch_into(&repo, url, opts);
		}

		fs::create_dir_all(dir).map_err(GitError::io(dir))?;
		debug!(dir = %dir.display(), "initializing mirror");
		let repo = Repository::init_bare(dir).map_err(&git_err)?;
		let result = self.fetch_into(&repo, url, opts);
		if result.is_err() {
			// an empty mirror would pass for a cached one next time
			drop(repo);
			if let Err(err) = fs::remove_dir_all(dir) {
				warn!(dir = %dir.display(), error = %err, "failed to remove incomplete mirror");
			}
		}
		result
	}

	#[instrument(skip_all, fields(url = %url, git_ref = ?git_ref))]
	fn export(
		&self,
		url: &GitUrl,
		dir: &Path,
		git_ref: Option<&str>,
		target: &Path,
	) -> Result<RepoInfo, GitError> {
		let git_err = GitError::git(url);
		let repo = Repository::open_bare(dir).map_err(&git_err)?;

		let spec = git_ref.unwrap_or("HEAD");
		let commit = [
			spec.to_owned(),
			format!("refs/heads/{spec}"),
			format!("refs/tags/{spec}"),
		]
		.iter()
		.find_map(|candidate| repo.revparse_single(candidate).ok())
		.and_then(|object| object.peel_to_commit().ok())
		.ok_or_else(|| GitError::RevisionNotFound {
			url: url.to_string(),
			git_ref: spec.to_owned(),
		})?;

		let tree = commit.tree().map_err(&git_err)?;
		fs::create_dir_all(target).map_err(GitError::io(target))?;
		write_tree(&repo, &tree, target, &git_err)?;

		let mut describe_opts = DescribeOptions::new();
		describe_opts.describe_tags().show_commit_oid_as_fallback(true);
		let describe = commit
			.as_object()
			.describe(&describe_opts)
			.and_then(|d| d.format(None))
			.ok();

		Ok(RepoInfo {
			url: url.clone(),
			git_ref: git_ref.map(str::to_owned),
			commit: commit.id().to_string(),
			describe,
		})
	}
}

fn remote_callbacks<'a>(auth: &'a GitAuthenticator, config: &'a Config) -> RemoteCallbacks<'a> {
	let mut callbacks = RemoteCallbacks::new();
	callbacks.credentials(auth.credentials(config));
	callbacks
}

/// Tree entry names come from the remote; only plain names are written.
fn is_plain_name(name: &str) -> bool {
	let mut components = Path::new(name).components();
	matches!(components.next(), Some(Component::Normal(_)))
		&& components.next().is_none()
		&& !name.contains(['/', '\\'])
}

fn write_tree(
	repo: &Repository,
	tree: &Tree<'_>,
	dir: &Path,
	git_err: &impl Fn(git2::Error) -> GitError,
) -> Result<(), GitError> {
	for entry in tree.iter() {
		let name = entry
			.name()
			.filter(|name| is_plain_name(name))
			.ok_or_else(|| {
				GitError::UnsafeTreeEntry(String::from_utf8_lossy(entry.name_bytes()).into_owned())
			})?;
		let path = dir.join(name);

		match entry.kind() {
			Some(ObjectType::Tree) => {
				fs::create_dir_all(&path).map_err(GitError::io(&path))?;
				let subtree = repo.find_tree(entry.id()).map_err(git_err)?;
				write_tree(repo, &subtree, &path, git_err)?;
			}
			Some(ObjectType::Blob) => {
				let blob = repo.find_blob(entry.id()).map_err(git_err)?;
				write_blob(&path, blob.content(), entry.filemode())?;
			}
			// submodule commits are not part of this repository
			_ => {}
		}
	}
	Ok(())
}

#[cfg(unix)]
fn write_blob(path: &Path, content: &[u8], mode: i32) -> Result<(), GitError> {
	use std::os::unix::{ffi::OsStrExt, fs::PermissionsExt};

	const MODE_SYMLINK: i32 = 0o120_000;
	const MODE_EXECUTABLE: i32 = 0o100_755;

	if mode == MODE_SYMLINK {
		let link_target = std::ffi::OsStr::from_bytes(content);
		return std::os::unix::fs::symlink(link_target, path).map_err(GitError::io(path));
	}
	fs::write(path, content).map_err(GitError::io(path))?;
	if mode == MODE_EXECUTABLE {
		fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(GitError::io(path))?;
	}
	Ok(())
}

// links are checked out as files holding the target path
#[cfg(not(unix))]
fn write_blob(path: &Path, content: &[u8], _mode: i32) -> Result<(), GitError> {
	fs::write(path, content).map_err(GitError::io(path))
}
