use std::time::Instant;

use anyhow::Context;
use pw_agent::{Agent, Browser, ChatCompletionsProvider, Config, Engine, GoalOutcome, Session};
use tracing::{info, warn};

use crate::daemon::parse_mode;
use crate::error::{CliError, Result};
use crate::output::{CommandResult, ErrorCode, OutputFormat, ResultBuilder, outcome_summary, print_result};

/// One goal in a fresh browser; everything is torn down before returning.
pub async fn run(config: &Config, goal: &str, mode: &str, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	if goal.trim().is_empty() {
		return Err(CliError::InvalidInput("goal must not be empty".into()));
	}
	let mode = parse_mode(Some(mode))?;
	let provider = ChatCompletionsProvider::from_config(&config.llm)?;
	let browser = Browser::from_config(&config.browser).await.context("Failed to start browser")?;

	let outcome = match Session::open(&browser, &provider, mode, &config.tabs).await {
		Ok(mut session) => {
			let agent = Agent::from_config(config);
			let outcome = tokio::select! {
				outcome = agent.run_goal(&mut session, goal) => Some(outcome),
				_ = tokio::signal::ctrl_c() => {
					warn!(target = "pw.agent", "interrupted, closing browser");
					None
				}
			};
			if let Err(e) = session.close().await {
				warn!(target = "pw.session", error = %e, "error closing session");
			}
			Ok(outcome)
		}
		Err(e) => Err(e),
	};
	if let Err(e) = browser.close().await {
		warn!(target = "pw.cdp", error = %e, "error closing browser");
	}

	match outcome? {
		Some(outcome) => report(outcome, started, format),
		None => Err(anyhow::anyhow!("interrupted before the goal finished").into()),
	}
}

fn report(outcome: GoalOutcome, started: Instant, format: OutputFormat) -> Result<()> {
	info!(target = "pw.agent", status = ?outcome.status, actions = outcome.actions.len(), "run finished");
	let summary = outcome_summary(&outcome);
	if outcome.is_completed() {
		let result = ResultBuilder::new("run").started_at(started).data(outcome).summary(summary).build();
		print_result(&result, format);
		return Ok(());
	}

	let message = outcome.error.clone().unwrap_or_else(|| "goal failed".to_string());
	let details = serde_json::to_value(&outcome)?;
	let result: CommandResult<()> = ResultBuilder::new("run")
		.started_at(started)
		.error_with_details(ErrorCode::GoalFailed, message, details)
		.summary(summary)
		.build();
	print_result(&result, format);
	Err(CliError::OutputAlreadyPrinted)
}
