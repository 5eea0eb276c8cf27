use std::{error::Error as StdError, path::PathBuf};

use thiserror::Error;

use crate::GitUrl;

#[derive(Debug, Error)]
pub enum GitError {
	#[error("invalid git url `{url}`: {reason}")]
	InvalidUrl { url: String, reason: String },

	#[error("git operation on {url} failed")]
	Git {
		url: String,
		#[source]
		source: git2::Error,
	},

	#[error("I/O error at {}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("revision `{git_ref}` not found in {url}")]
	RevisionNotFound { url: String, git_ref: String },

	#[error("refusing to export tree entry `{0}`")]
	UnsafeTreeEntry(String),

	/// Outcome of a refresh another caller performed, replayed to everyone
	/// who waited on it.
	#[error("refreshing {url} failed: {message}")]
	RefreshFailed { url: String, message: String },

	#[error("git task panicked")]
	TaskPanicked(#[source] tokio::task::JoinError),
}

impl GitError {
	pub(crate) fn git(url: &GitUrl) -> impl Fn(git2::Error) -> Self + '_ {
		move |source| Self::Git {
			url: url.to_string(),
			source,
		}
	}

	pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
		let path = path.into();
		move |source| Self::Io { path, source }
	}
}

/// Render an error together with its sources, `outer: inner: root`.
pub(crate) fn error_chain(err: &dyn StdError) -> String {
	let mut message = err.to_string();
	let mut source = err.source();
	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());
		source = cause.source();
	}
	message
}
