//! Remote-objects command handler.
//!
//! Gathers the objects of a cluster carrying the given labels and prints the
//! ones selected by the inclusion flags.

use std::{collections::BTreeMap, io::Write, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use k8s::{Inclusion, InclusionType, ObjectRef};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::util::{cancel_on_ctrl_c, create_tokio_runtime, load_config, write_json};
use crate::{
	diagnostics::{Diagnostics, Issue},
	k8s::{
		api::ClusterApi,
		client::{ClusterConnection, KubeCluster},
		remote_objects::RemoteObjects,
	},
	status::{StatusSink, TracingStatus},
};

#[derive(Args)]
pub struct RemoteObjectsArgs {
	/// Kubeconfig context to use. Defaults to the current context
	#[arg(long)]
	pub context: Option<String>,

	/// Common label of the deployment (Format: key=value)
	#[arg(short = 'l', long = "selector", value_parser = parse_label)]
	pub selectors: Vec<(String, String)>,

	/// Only print objects carrying this tag
	#[arg(long)]
	pub tag: Vec<String>,

	/// Never print objects carrying this tag
	#[arg(long)]
	pub exclude_tag: Vec<String>,

	/// Only print objects of this deployment item directory
	#[arg(long)]
	pub include_dir: Vec<String>,

	/// Never print objects of this deployment item directory
	#[arg(long)]
	pub exclude_dir: Vec<String>,
}

fn parse_label(s: &str) -> Result<(String, String), String> {
	match s.split_once('=') {
		Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
		_ => Err(format!("expected key=value, got `{s}`")),
	}
}

impl RemoteObjectsArgs {
	fn inclusion(&self) -> Inclusion {
		let mut inclusion = Inclusion::new();
		for tag in &self.tag {
			inclusion.add_include(InclusionType::Tag, tag);
		}
		for tag in &self.exclude_tag {
			inclusion.add_exclude(InclusionType::Tag, tag);
		}
		for dir in &self.include_dir {
			inclusion.add_include(InclusionType::DeploymentItemDir, dir);
		}
		for dir in &self.exclude_dir {
			inclusion.add_exclude(InclusionType::DeploymentItemDir, dir);
		}
		inclusion
	}

	fn labels(&self) -> BTreeMap<String, String> {
		self.selectors.iter().cloned().collect()
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
	objects: Vec<ObjectRef>,
	warnings: Vec<Issue>,
	errors: Vec<Issue>,
	api_warnings: Vec<Issue>,
}

/// Run the remote-objects command.
pub fn run<W: Write>(args: RemoteObjectsArgs, writer: W) -> Result<()> {
	let runtime = create_tokio_runtime()?;
	runtime.block_on(run_async(args, writer))
}

async fn run_async<W: Write>(args: RemoteObjectsArgs, writer: W) -> Result<()> {
	let cwd = std::env::current_dir().context("getting current directory")?;
	let config = load_config(&cwd)?;

	let cancel = CancellationToken::new();
	cancel_on_ctrl_c(cancel.clone());

	let connection = ClusterConnection::from_context(args.context.as_deref())
		.await
		.context("connecting to cluster")?;
	let cluster: Arc<dyn ClusterApi> = Arc::new(
		KubeCluster::discover(&connection)
			.await
			.with_context(|| format!("discovering resources of {}", connection.context()))?,
	);

	let diagnostics = Arc::new(Diagnostics::new());
	let status: Arc<dyn StatusSink> = Arc::new(TracingStatus);
	let mut remote = RemoteObjects::new(
		Arc::clone(&diagnostics),
		status,
		config.discovery,
		cancel,
	);
	remote
		.update_remote_objects(&cluster, &args.labels(), &[])
		.await
		.context("gathering remote objects")?;

	let objects = remote
		.get_filtered_remote_objects(&args.inclusion())
		.into_iter()
		.map(|(object_ref, _)| object_ref.clone())
		.collect();
	write_json(
		writer,
		&Report {
			objects,
			warnings: diagnostics.warnings(),
			errors: diagnostics.errors(),
			api_warnings: diagnostics.api_warnings(),
		},
	)
}

#[cfg(test)]
mod tests {
	use clap::Parser;
	use k8s::InclusionEntry;
	use rstest::rstest;

	use super::*;

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		args: RemoteObjectsArgs,
	}

	#[rstest]
	#[case("app=web", Some(("app", "web")))]
	#[case("empty=", Some(("empty", "")))]
	#[case("a=b=c", Some(("a", "b=c")))]
	#[case("=web", None)]
	#[case("web", None)]
	fn test_parse_label(#[case] input: &str, #[case] expected: Option<(&str, &str)>) {
		let expected = expected.map(|(k, v)| (k.to_string(), v.to_string()));
		assert_eq!(parse_label(input).ok(), expected);
	}

	#[test]
	fn test_flags_build_labels_and_inclusion() {
		let cli = Cli::try_parse_from([
			"rkl",
			"-l",
			"project=web",
			"--selector",
			"team=core",
			"--tag",
			"backend",
			"--exclude-dir",
			"legacy",
		])
		.unwrap();

		assert_eq!(
			cli.args.labels(),
			BTreeMap::from([
				("project".to_string(), "web".to_string()),
				("team".to_string(), "core".to_string()),
			])
		);

		let inclusion = cli.args.inclusion();
		assert!(inclusion.has_type(InclusionType::Tag));
		assert!(inclusion.check_included(&[InclusionEntry::tag("backend")], false));
		assert!(!inclusion.check_included(&[InclusionEntry::tag("frontend")], false));
		assert!(!inclusion.check_included(
			&[
				InclusionEntry::tag("backend"),
				InclusionEntry::deployment_item_dir("legacy")
			],
			false
		));
	}

	#[test]
	fn test_invalid_selector_is_rejected() {
		assert!(Cli::try_parse_from(["rkl", "-l", "nope"]).is_err());
	}
}
