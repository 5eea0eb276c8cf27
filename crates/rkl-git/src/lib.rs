//! Deduplicating cache of bare git mirrors.
//!
//! Every remote repository is mirrored once per cache directory and
//! refreshed at most once per [`GitRepoCache`] lifetime. Projects are then
//! exported from the mirror as plain file trees.

mod backend;
mod cache;
mod error;
mod url;

pub use backend::{FetchOptions, Git2Backend, MirrorBackend, RepoInfo};
pub use cache::{GitRepoCache, MirroredRepo, MIRROR_DIR};
pub use error::GitError;
pub use url::GitUrl;
