//! Results of a goal invocation.

use serde::{Deserialize, Serialize};

use crate::command::Command;

/// An action that executed successfully, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
	pub command: Command,
	pub description: String,
	/// Unix epoch seconds.
	pub executed_at: u64,
}

/// A recoverable failure that consumed one retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAttempt {
	/// `None` when the reply could not be decoded into a command.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub command: Option<Command>,
	pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
	Completed,
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// Consecutive recoverable failures reached the retry budget.
	RetryExhausted,
	/// The browser context or a page could not be created.
	ResourceFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
	/// Reply did not decode into a command (or the service errored).
	Malformed,
	/// Command executed successfully.
	Applied,
	/// Command was valid but could not be applied.
	Failed,
	/// Reply declared the goal complete.
	Completed,
}

/// One turn of the interaction loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEvent {
	pub kind: StepKind,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub command: Option<Command>,
	/// Retry counter after this step was accounted for.
	pub retries: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Terminal report of one `submit_goal` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalOutcome {
	pub status: GoalStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub failure: Option<FailureKind>,
	pub actions: Vec<ActionRecord>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub failures: Vec<FailedAttempt>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub elapsed_ms: u64,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub steps: Vec<StepEvent>,
}

impl GoalOutcome {
	pub fn is_completed(&self) -> bool {
		self.status == GoalStatus::Completed
	}
}
