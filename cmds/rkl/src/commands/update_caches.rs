//! Update-caches command handler.
//!
//! Refreshes the mirror of every git project a deployment references and,
//! when asked to, exports them.

use std::{
	collections::BTreeMap,
	io::Write,
	path::{Path, PathBuf},
	sync::Arc,
};

use anyhow::{Context, Result};
use clap::Args;
use rkl_git::{GitRepoCache, RepoInfo};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::util::{cancel_on_ctrl_c, create_tokio_runtime, load_config, write_json};
use crate::project::{InvolvedRepo, LoadedProject};

#[derive(Args)]
pub struct UpdateCachesArgs {
	/// Directory containing the .rkl-project.yaml
	#[arg(default_value = ".")]
	pub project_dir: PathBuf,

	/// Directory for this run's exports. A temporary directory removed on
	/// exit is used when not set
	#[arg(long)]
	pub tmp_dir: Option<PathBuf>,

	/// Keep exports in this directory instead of the temporary one
	#[arg(long)]
	pub archive_dir: Option<PathBuf>,

	/// Also export every project at its configured ref
	#[arg(long)]
	pub export: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Exported {
	dir: PathBuf,
	#[serde(flatten)]
	info: RepoInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
	involved_repos: BTreeMap<String, Vec<InvolvedRepo>>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	exported: Vec<Exported>,
}

/// Run the update-caches command.
pub fn run<W: Write>(args: UpdateCachesArgs, writer: W) -> Result<()> {
	let runtime = create_tokio_runtime()?;
	runtime.block_on(run_async(args, writer))
}

async fn run_async<W: Write>(args: UpdateCachesArgs, writer: W) -> Result<()> {
	let cancel = CancellationToken::new();
	cancel_on_ctrl_c(cancel.clone());

	// held until the report is written
	let temp;
	let tmp_dir = match &args.tmp_dir {
		Some(dir) => dir.clone(),
		None => {
			temp = tempfile::Builder::new()
				.prefix("rkl-")
				.tempdir()
				.context("creating temporary directory")?;
			temp.path().to_path_buf()
		}
	};

	let report = update_caches(&args, &tmp_dir, cancel).await?;
	write_json(writer, &report)
}

#[instrument(skip_all, fields(project_dir = %args.project_dir.display()))]
async fn update_caches(
	args: &UpdateCachesArgs,
	tmp_dir: &Path,
	cancel: CancellationToken,
) -> Result<Report> {
	let config = load_config(&args.project_dir)?;
	let repo_cache = Arc::new(GitRepoCache::new(config.git_cache.effective_cache_dir()));

	let mut project = LoadedProject::load(&args.project_dir, repo_cache, tmp_dir)
		.with_context(|| format!("loading project at {}", args.project_dir.display()))?
		.with_settings(config.git_cache.clone())
		.with_cancellation(cancel);
	if let Some(archive_dir) = &args.archive_dir {
		project = project.with_archive_dir(archive_dir);
	}

	project.update_git_caches().await?;

	let mut exported = Vec::new();
	if args.export {
		for git_project in project.config().git_projects() {
			let loaded = project
				.load_git_project(git_project)
				.await
				.with_context(|| format!("exporting {}", git_project.url))?;
			exported.push(Exported {
				dir: loaded.dir,
				info: loaded.info,
			});
		}
	}

	Ok(Report {
		involved_repos: project.involved_repos(),
		exported,
	})
}
