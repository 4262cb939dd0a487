use anyhow::anyhow;
use serde_json::json;

use crate::daemon::{self, DaemonRequest, DaemonResponse};
use crate::error::{CliError, Result};
use crate::output::{ErrorCode, OutputFormat, ResultBuilder, outcome_summary, print_result, status_line};

async fn request(request: DaemonRequest) -> Result<DaemonResponse> {
	daemon::expect_ok(daemon::send_request(&request).await?)
}

fn unexpected(response: DaemonResponse) -> CliError {
	anyhow!("unexpected daemon response: {response:?}").into()
}

pub async fn create(mode: &str, format: OutputFormat) -> Result<()> {
	let id = match request(DaemonRequest::CreateSession { mode: Some(mode.to_string()) }).await? {
		DaemonResponse::Session { id } => id,
		other => return Err(unexpected(other)),
	};
	let result = ResultBuilder::new("session create")
		.data(json!({ "id": id }))
		.summary(id.clone())
		.build();
	print_result(&result, format);
	Ok(())
}

pub async fn status(id: &str, format: OutputFormat) -> Result<()> {
	let status = match request(DaemonRequest::SessionStatus { id: id.to_string() }).await? {
		DaemonResponse::Status { status } => status,
		other => return Err(unexpected(other)),
	};
	let summary = status_line(&status);
	let result = ResultBuilder::new("session status").data(status).summary(summary).build();
	print_result(&result, format);
	Ok(())
}

/// Prints the outcome either way; a failed goal exits non-zero.
pub async fn goal(id: Option<&str>, goal: &str, format: OutputFormat) -> Result<()> {
	let (id, outcome) = match request(DaemonRequest::SubmitGoal {
		id: id.map(str::to_string),
		goal: goal.to_string(),
	})
	.await?
	{
		DaemonResponse::Outcome { id, outcome } => (id, outcome),
		other => return Err(unexpected(other)),
	};

	let summary = format!("session {id}\n{}", outcome_summary(&outcome));
	let data = json!({ "id": id, "outcome": outcome });
	if outcome.is_completed() {
		let result = ResultBuilder::new("session goal").data(data).summary(summary).build();
		print_result(&result, format);
		return Ok(());
	}

	let message = outcome.error.clone().unwrap_or_else(|| "goal failed".to_string());
	let result: crate::output::CommandResult<()> = ResultBuilder::new("session goal")
		.error_with_details(ErrorCode::GoalFailed, message, data)
		.summary(summary)
		.build();
	print_result(&result, format);
	Err(CliError::OutputAlreadyPrinted)
}

pub async fn close(id: &str, format: OutputFormat) -> Result<()> {
	request(DaemonRequest::CloseSession { id: id.to_string() }).await?;
	let result = ResultBuilder::new("session close")
		.data(json!({ "id": id, "closed": true }))
		.summary(format!("closed {id}"))
		.build();
	print_result(&result, format);
	Ok(())
}

pub async fn list(format: OutputFormat) -> Result<()> {
	let list = match request(DaemonRequest::ListSessions).await? {
		DaemonResponse::Sessions { list } => list,
		other => return Err(unexpected(other)),
	};
	let summary = if list.is_empty() {
		"no sessions".to_string()
	} else {
		list.iter().map(status_line).collect::<Vec<_>>().join("\n")
	};
	let result = ResultBuilder::new("session list")
		.data(json!({ "sessions": list }))
		.summary(summary)
		.build();
	print_result(&result, format);
	Ok(())
}
