use pw_agent_protocol::{GoalOutcome, SessionStatus};
use serde::{Deserialize, Serialize};

/// One request per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonRequest {
	Ping,
	CreateSession {
		/// Parsed as a [`pw_agent::SessionMode`]; defaults to `interact`.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		mode: Option<String>,
	},
	SessionStatus {
		id: String,
	},
	/// Runs a goal to completion. Without an id a session is created first.
	SubmitGoal {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		id: Option<String>,
		goal: String,
	},
	CloseSession {
		id: String,
	},
	ListSessions,
	Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonResponse {
	Pong,
	Session { id: String },
	Status { status: SessionStatus },
	Outcome { id: String, outcome: GoalOutcome },
	Sessions { list: Vec<SessionStatus> },
	Ok,
	Error { code: String, message: String },
}
