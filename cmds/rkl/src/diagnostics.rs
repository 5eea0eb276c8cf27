//! Warnings and errors gathered while acquiring state, reported at the end
//! of a deployment rather than aborting it.

use std::{
	error::Error as StdError,
	fmt::{self, Display},
};

use k8s::ObjectRef;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, warn};

/// A message, optionally tied to an object or a resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
	#[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
	pub object_ref: Option<ObjectRef>,
	pub message: String,
}

#[derive(Debug, Default)]
struct Collected {
	warnings: Vec<Issue>,
	errors: Vec<Issue>,
	api_warnings: Vec<Issue>,
}

/// Thread safe collector shared by every task of a pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
	inner: Mutex<Collected>,
}

impl Diagnostics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_warning(&self, object_ref: Option<&ObjectRef>, message: impl Display) {
		let issue = issue(object_ref, message);
		warn!(object = ?issue.object_ref.as_ref().map(ToString::to_string), "{}", issue.message);
		self.inner.lock().warnings.push(issue);
	}

	pub fn add_error(&self, object_ref: Option<&ObjectRef>, message: impl Display) {
		let issue = issue(object_ref, message);
		error!(object = ?issue.object_ref.as_ref().map(ToString::to_string), "{}", issue.message);
		self.inner.lock().errors.push(issue);
	}

	/// Record warnings the API server sent along with a response.
	pub fn add_api_warnings(&self, object_ref: &ObjectRef, warnings: Vec<String>) {
		if warnings.is_empty() {
			return;
		}
		let mut inner = self.inner.lock();
		inner
			.api_warnings
			.extend(warnings.into_iter().map(|message| Issue {
				object_ref: Some(object_ref.clone()),
				message,
			}));
	}

	pub fn warnings(&self) -> Vec<Issue> {
		self.inner.lock().warnings.clone()
	}

	pub fn errors(&self) -> Vec<Issue> {
		self.inner.lock().errors.clone()
	}

	pub fn api_warnings(&self) -> Vec<Issue> {
		self.inner.lock().api_warnings.clone()
	}

	pub fn has_errors(&self) -> bool {
		!self.inner.lock().errors.is_empty()
	}
}

/// Displays an error followed by each of its sources, `outer: inner: root`.
pub struct ErrorChain<'a>(pub &'a dyn StdError);

impl Display for ErrorChain<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)?;
		let mut source = self.0.source();
		while let Some(cause) = source {
			write!(f, ": {cause}")?;
			source = cause.source();
		}
		Ok(())
	}
}

fn issue(object_ref: Option<&ObjectRef>, message: impl Display) -> Issue {
	Issue {
		object_ref: object_ref.cloned(),
		message: message.to_string(),
	}
}
