//! The interaction loop.
//!
//! ```text
//! AwaitingAction -> Executing -> Grounding  -> AwaitingAction
//!                             \-> Recovering -> AwaitingAction
//! terminal: Completed | Failed
//! ```
//!
//! One goal runs strictly sequentially: each action's result is known and the
//! page re-grounded before the next prompt is sent. Malformed replies,
//! reasoning-service errors and failed commands each consume one retry; the
//! counter resets after every applied action. Resource failures end the goal
//! immediately.

use std::time::Instant;

use pw_agent_protocol::{Command, FailedAttempt, FailureKind, GoalOutcome, GoalStatus, StepEvent, StepKind, TabSnapshot};

use crate::config::{AgentConfig, Config};
use crate::error::Error;
use crate::executor::{Executor, Outcome};
use crate::grounding::{self, GroundingLimits, NO_INTERACTIVE_ELEMENTS};
use crate::interpreter::{self, DEFAULT_HINT, Interpretation};
use crate::prompt::{self, PromptContext};
use crate::session::Session;

/// Drives goals against sessions. Holds no per-session state.
#[derive(Debug, Clone, Default)]
pub struct Agent {
	config: AgentConfig,
	executor: Executor,
}

/// What the loop saw after the last step.
struct Observation {
	tabs: Vec<TabSnapshot>,
	elements: String,
}

/// Per-goal bookkeeping.
#[derive(Default)]
struct GoalRun {
	failures: Vec<FailedAttempt>,
	steps: Vec<StepEvent>,
	last_error: Option<String>,
}

impl GoalRun {
	fn step(&mut self, kind: StepKind, command: Option<&Command>, retries: u32, error: Option<&str>) {
		self.steps.push(StepEvent {
			kind,
			command: command.cloned(),
			retries,
			error: error.map(str::to_string),
		});
	}

	fn fail(&mut self, kind: StepKind, command: Option<&Command>, retries: u32, error: &str) {
		self.failures.push(FailedAttempt {
			command: command.cloned(),
			error: error.to_string(),
		});
		self.step(kind, command, retries, Some(error));
		self.last_error = Some(error.to_string());
	}
}

impl Agent {
	pub fn new(config: AgentConfig, executor: Executor) -> Self {
		Self { config, executor }
	}

	pub fn from_config(config: &Config) -> Self {
		Self::new(config.agent.clone(), Executor::new(config.executor.clone()))
	}

	pub fn config(&self) -> &AgentConfig {
		&self.config
	}

	/// Runs `goal` on `session` until the reasoning service reports completion,
	/// the retry budget is spent, or a resource failure occurs.
	pub async fn run_goal(&self, session: &mut Session, goal: &str) -> GoalOutcome {
		let started = Instant::now();
		session.begin_goal();
		let first_action = session.history().len();
		let mut run = GoalRun::default();
		tracing::info!(target = "pw.agent", session = session.id(), goal, "goal started");

		// The goal text seeds the first prompt verbatim.
		let mut request = goal.to_string();
		let (status, failure) = loop {
			// AwaitingAction
			let next = match session.reasoning.respond(&request).await {
				Ok(reply) => {
					let parsed = interpreter::interpret(&reply);
					if parsed.completed {
						session.mark_completed();
						run.step(StepKind::Completed, parsed.command.as_ref(), session.retries(), None);
						break (GoalStatus::Completed, None);
					}
					match parsed {
						Interpretation { command: Some(command), hint, .. } => {
							Ok((command, hint.unwrap_or_else(|| DEFAULT_HINT.to_string())))
						}
						Interpretation { error, .. } => {
							Err(error.map_or_else(|| "unrecognized reply".to_string(), |e| e.to_string()))
						}
					}
				}
				Err(e) => {
					tracing::warn!(target = "pw.agent", session = session.id(), error = %e, "reasoning service error");
					Err(e.to_string())
				}
			};
			let (command, hint) = match next {
				Ok(next) => next,
				Err(reason) => {
					if self.recover(session, &mut run, StepKind::Malformed, None, &reason) {
						break (GoalStatus::Failed, Some(FailureKind::RetryExhausted));
					}
					let seen = self.observe(session).await;
					request = prompt::malformed_prompt(&self.context(session, goal, &seen), &reason);
					continue;
				}
			};

			// Executing
			let reason = match self.executor.execute(&command, &mut session.tabs).await {
				Ok(Outcome::Applied) => {
					session.record_action(&command);
					run.step(StepKind::Applied, Some(&command), session.retries(), None);
					tokio::time::sleep(self.config.settle_delay()).await;

					// Grounding
					let seen = self.observe(session).await;
					request = prompt::next_prompt(&self.context(session, goal, &seen), &hint);
					continue;
				}
				Ok(Outcome::Completed) => {
					session.mark_completed();
					run.step(StepKind::Completed, Some(&command), session.retries(), None);
					break (GoalStatus::Completed, None);
				}
				Err(e) if e.is_resource_failure() => {
					tracing::error!(target = "pw.agent", session = session.id(), error = %e, "resource failure");
					run.fail(StepKind::Failed, Some(&command), session.retries(), &e.to_string());
					break (GoalStatus::Failed, Some(FailureKind::ResourceFailure));
				}
				Ok(Outcome::Failed(reason)) => reason,
				Err(e) => failure_reason(&e),
			};

			// Recovering
			if self.recover(session, &mut run, StepKind::Failed, Some(&command), &reason) {
				break (GoalStatus::Failed, Some(FailureKind::RetryExhausted));
			}
			tokio::time::sleep(self.config.settle_delay()).await;
			let seen = self.observe(session).await;
			request = prompt::corrective_prompt(&self.context(session, goal, &seen), &command, &reason);
		};

		session.end_goal();
		let outcome = GoalOutcome {
			status,
			failure,
			actions: session.history()[first_action..].to_vec(),
			failures: run.failures,
			error: if status == GoalStatus::Failed { run.last_error } else { None },
			elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
			steps: run.steps,
		};
		tracing::info!(
			target = "pw.agent",
			session = session.id(),
			status = ?outcome.status,
			actions = outcome.actions.len(),
			failures = outcome.failures.len(),
			elapsed_ms = outcome.elapsed_ms,
			"goal finished"
		);
		outcome
	}

	/// Recovering: counts the failure and reports whether the budget is spent.
	fn recover(&self, session: &mut Session, run: &mut GoalRun, kind: StepKind, command: Option<&Command>, reason: &str) -> bool {
		let retries = session.count_failure();
		run.fail(kind, command, retries, reason);
		tracing::info!(target = "pw.agent", session = session.id(), retries, max = self.config.max_retries, error = %reason, "recoverable failure");
		retries >= self.config.max_retries
	}

	/// Re-derives the tab list and element inventory of the current page.
	async fn observe(&self, session: &mut Session) -> Observation {
		let tabs = session.tabs.get_all_pages().await;
		let elements = match session.tabs.current() {
			Some(page) => grounding::ground(page.as_ref(), GroundingLimits::from(&self.config)).await,
			None => NO_INTERACTIVE_ELEMENTS.to_string(),
		};
		Observation { tabs, elements }
	}

	fn context<'a>(&self, session: &'a Session, goal: &'a str, seen: &'a Observation) -> PromptContext<'a> {
		let history = session.history();
		let recent = &history[history.len().saturating_sub(self.config.history_len)..];
		PromptContext {
			goal,
			tabs: &seen.tabs,
			elements: &seen.elements,
			recent,
		}
	}
}

/// What the reasoning service is told about a command that raised.
fn failure_reason(error: &Error) -> String {
	if error.is_target_closed() {
		format!("The page closed while the command ran ({error}). Check the open tabs before retrying.")
	} else if error.is_timeout() {
		format!("The page stopped responding ({error}). Wait or navigate before retrying.")
	} else {
		error.to_string()
	}
}
