use anyhow::Result;
use clap::{Parser, Subcommand};
use rkl::{
	commands::{self, util::BrokenPipeGuard},
	telemetry,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "rkl")]
#[command(about = "Mirror deployment projects and gather cluster state", long_about = None)]
#[command(version)]
struct Cli {
	/// Log level (possible values: error, warn, info, debug, trace). Overrides RUST_LOG
	#[arg(long, global = true)]
	log_level: Option<Level>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Refresh the git mirrors of every project a deployment references
	UpdateCaches(commands::update_caches::UpdateCachesArgs),

	/// List the objects of a cluster belonging to a deployment
	RemoteObjects(commands::remote_objects::RemoteObjectsArgs),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	telemetry::init(cli.log_level)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::UpdateCaches(args) => commands::update_caches::run(args, stdout),
		Commands::RemoteObjects(args) => commands::remote_objects::run(args, stdout),
	}
}
