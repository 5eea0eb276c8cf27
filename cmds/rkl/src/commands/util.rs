//! Utilities for command handlers.

use std::{
	io::{self, ErrorKind, Write},
	path::Path,
};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RklConfig;

/// A writer wrapper that silently handles broken pipe errors.
///
/// When the underlying writer returns a broken pipe error (EPIPE), this wrapper
/// converts it to a successful write. This allows commands to exit cleanly when
/// output is piped to a process that closes early (e.g., `rkl update-caches | head -1`).
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}

pub fn create_tokio_runtime() -> Result<tokio::runtime::Runtime> {
	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")
}

/// Cancel `token` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => {
				warn!("interrupted, cancelling");
				token.cancel();
			}
			Err(err) => debug!(error = %err, "unable to listen for Ctrl-C"),
		}
	});
}

/// The `.rkl-config.yaml` governing `dir`, or defaults when there is none.
pub fn load_config(dir: &Path) -> Result<RklConfig> {
	let config = RklConfig::load_from_directory(dir)?.unwrap_or_default();
	debug!(?config, "loaded configuration");
	Ok(config)
}

pub fn write_json<W: Write, T: Serialize>(mut writer: W, value: &T) -> Result<()> {
	serde_json::to_writer_pretty(&mut writer, value).context("writing output")?;
	writeln!(writer).context("writing output")?;
	writer.flush().context("writing output")
}
