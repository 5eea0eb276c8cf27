//! Progress reporting for long running steps.

use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(u64);

impl StepId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
	Success,
	Warning,
	Failed,
}

/// Receives progress of [`StatusStep`]s, e.g. to drive a progress display.
pub trait StatusSink: Send + Sync {
	fn started(&self, step: StepId, message: &str);
	fn updated(&self, step: StepId, message: &str);
	fn finished(&self, step: StepId, message: &str, outcome: StepOutcome);
}

/// Reports steps as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
	fn started(&self, _step: StepId, message: &str) {
		info!("{message}");
	}

	fn updated(&self, _step: StepId, message: &str) {
		info!("{message}");
	}

	fn finished(&self, _step: StepId, message: &str, outcome: StepOutcome) {
		match outcome {
			StepOutcome::Success => info!(outcome = "success", "{message}"),
			StepOutcome::Warning => warn!(outcome = "warning", "{message}"),
			StepOutcome::Failed => warn!(outcome = "failed", "{message}"),
		}
	}
}

/// A running step. Dropping it without calling one of the finishing methods
/// reports it as failed, so early returns through `?` are accounted for.
pub struct StatusStep {
	sink: Arc<dyn StatusSink>,
	id: StepId,
	message: String,
	finished: bool,
}

impl StatusStep {
	pub fn start(sink: &Arc<dyn StatusSink>, message: impl Into<String>) -> Self {
		let message = message.into();
		let id = StepId::next();
		sink.started(id, &message);
		Self {
			sink: Arc::clone(sink),
			id,
			message,
			finished: false,
		}
	}

	pub fn update(&mut self, message: impl Into<String>) {
		self.message = message.into();
		self.sink.updated(self.id, &self.message);
	}

	pub fn success(mut self) {
		self.finish(StepOutcome::Success);
	}

	pub fn warning(mut self) {
		self.finish(StepOutcome::Warning);
	}

	pub fn failed(mut self) {
		self.finish(StepOutcome::Failed);
	}

	fn finish(&mut self, outcome: StepOutcome) {
		if !self.finished {
			self.finished = true;
			self.sink.finished(self.id, &self.message, outcome);
		}
	}
}

impl Drop for StatusStep {
	fn drop(&mut self) {
		self.finish(StepOutcome::Failed);
	}
}
