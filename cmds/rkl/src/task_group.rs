//! Bounded fan-out of async work with cancellation and error collection.

use std::{error::Error, fmt, future::Future, sync::Arc};

use tokio::{
	sync::Semaphore,
	task::{JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;

/// Why one task of a [`TaskGroup`] did not succeed.
#[derive(Debug)]
pub enum TaskError<E> {
	Failed(E),
	Cancelled,
	Panicked(JoinError),
}

impl<E: fmt::Display> fmt::Display for TaskError<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Failed(err) => err.fmt(f),
			Self::Cancelled => f.write_str("task cancelled"),
			Self::Panicked(err) => write!(f, "task panicked: {err}"),
		}
	}
}

impl<E: Error + 'static> Error for TaskError<E> {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			Self::Failed(err) => err.source(),
			Self::Cancelled => None,
			Self::Panicked(err) => Some(err),
		}
	}
}

/// Every failure of a [`TaskGroup`], in completion order. Never empty.
#[derive(Debug)]
pub struct TaskErrors<E> {
	errors: Vec<TaskError<E>>,
}

impl<E> TaskErrors<E> {
	pub fn len(&self) -> usize {
		self.errors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn first(&self) -> Option<&TaskError<E>> {
		self.errors.first()
	}

	pub fn iter(&self) -> impl Iterator<Item = &TaskError<E>> {
		self.errors.iter()
	}

	pub fn into_vec(self) -> Vec<TaskError<E>> {
		self.errors
	}

	pub fn is_cancelled(&self) -> bool {
		self.errors.iter().any(|e| matches!(e, TaskError::Cancelled))
	}

	/// Errors the tasks themselves returned.
	pub fn failures(&self) -> impl Iterator<Item = &E> {
		self.errors.iter().filter_map(|e| match e {
			TaskError::Failed(err) => Some(err),
			_ => None,
		})
	}
}

impl<E: fmt::Display> fmt::Display for TaskErrors<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.errors.as_slice() {
			[] => f.write_str("no errors"),
			[only] => only.fmt(f),
			[first, ..] => write!(
				f,
				"{} tasks failed, first error: {}",
				self.errors.len(),
				first
			),
		}
	}
}

impl<E: Error + 'static> Error for TaskErrors<E> {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.errors.first().and_then(Error::source)
	}
}

/// Runs futures concurrently on a [`JoinSet`].
///
/// At most `max_concurrency` tasks run at once. Every task races the shared
/// [`CancellationToken`]; a cancelled task drops its future. [`TaskGroup::wait`]
/// joins every task before returning, one failure does not stop the others.
pub struct TaskGroup<E> {
	join_set: JoinSet<Result<(), TaskError<E>>>,
	semaphore: Arc<Semaphore>,
	cancel: CancellationToken,
}

impl<E: Send + 'static> TaskGroup<E> {
	pub fn new(max_concurrency: usize, cancel: CancellationToken) -> Self {
		Self {
			join_set: JoinSet::new(),
			semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
			cancel,
		}
	}

	pub fn spawn<F>(&mut self, task: F)
	where
		F: Future<Output = Result<(), E>> + Send + 'static,
	{
		let semaphore = Arc::clone(&self.semaphore);
		let cancel = self.cancel.clone();

		self.join_set.spawn(async move {
			let run = async move {
				let _permit = semaphore
					.acquire_owned()
					.await
					.map_err(|_| TaskError::Cancelled)?;
				task.await.map_err(TaskError::Failed)
			};
			tokio::select! {
				biased;
				() = cancel.cancelled() => Err(TaskError::Cancelled),
				result = run => result,
			}
		});
	}

	pub fn len(&self) -> usize {
		self.join_set.len()
	}

	pub fn is_empty(&self) -> bool {
		self.join_set.is_empty()
	}

	/// Wait for every task and collect all failures.
	pub async fn wait(mut self) -> Result<(), TaskErrors<E>> {
		let mut errors = Vec::new();
		while let Some(joined) = self.join_set.join_next().await {
			match joined {
				Ok(Ok(())) => {}
				Ok(Err(err)) => errors.push(err),
				Err(join_err) => errors.push(TaskError::Panicked(join_err)),
			}
		}
		if errors.is_empty() {
			Ok(())
		} else {
			Err(TaskErrors { errors })
		}
	}
}
