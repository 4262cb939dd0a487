//! [`Session`]: one browsing context, its tabs, one reasoning conversation,
//! and the execution history.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use pw_agent_protocol::{ActionRecord, Command, SessionMode, SessionStatus};
use uuid::Uuid;

use crate::config::TabsConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::reasoning::{ReasoningProvider, ReasoningService};
use crate::tabs::TabCoordinator;

pub(crate) fn unix_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Counters mirrored out of a session so status queries never wait on a
/// running goal.
#[derive(Debug)]
pub struct Activity {
	state: Mutex<ActivityState>,
}

#[derive(Debug)]
struct ActivityState {
	running: bool,
	command_count: usize,
	retries: u32,
	completed: bool,
	open_tabs: usize,
	last_active: Instant,
}

impl Activity {
	fn new() -> Self {
		Self {
			state: Mutex::new(ActivityState {
				running: false,
				command_count: 0,
				retries: 0,
				completed: false,
				open_tabs: 0,
				last_active: Instant::now(),
			}),
		}
	}

	pub(crate) fn set_running(&self, running: bool) {
		let mut state = self.state.lock();
		state.running = running;
		state.last_active = Instant::now();
	}

	pub fn is_running(&self) -> bool {
		self.state.lock().running
	}

	pub fn idle_for(&self) -> Duration {
		self.state.lock().last_active.elapsed()
	}

	pub fn status(&self, id: &str, mode: SessionMode, created_at: u64) -> SessionStatus {
		let state = self.state.lock();
		SessionStatus {
			id: id.to_string(),
			mode,
			running: state.running,
			command_count: state.command_count,
			retries: state.retries,
			completed: state.completed,
			open_tabs: state.open_tabs,
			created_at,
			idle_secs: state.last_active.elapsed().as_secs(),
		}
	}
}

pub struct Session {
	id: String,
	mode: SessionMode,
	created_at: u64,
	pub(crate) tabs: TabCoordinator,
	pub(crate) reasoning: Box<dyn ReasoningService>,
	history: Vec<ActionRecord>,
	retries: u32,
	completed: bool,
	activity: Arc<Activity>,
}

impl Session {
	/// Creates a browsing context with one blank page and opens a conversation.
	///
	/// # Errors
	///
	/// Returns [`crate::Error::Resource`] if the context or page cannot be
	/// created; nothing is left open in that case.
	pub async fn open(
		engine: &dyn Engine,
		provider: &dyn ReasoningProvider,
		mode: SessionMode,
		tabs_config: &TabsConfig,
	) -> Result<Self> {
		let context = engine.new_context().await?;
		let mut tabs = TabCoordinator::new(Arc::clone(&context), Duration::from_millis(tabs_config.popup_load_timeout_ms));
		tabs.install_listener();

		let reasoning = match tabs.open_page().await {
			Ok(_) => provider.open(mode).await,
			Err(e) => Err(e),
		};
		let reasoning = match reasoning {
			Ok(reasoning) => reasoning,
			Err(e) => {
				tabs.close_all().await;
				if let Err(close_err) = context.close().await {
					tracing::debug!(target = "pw.session", error = %close_err, "context close after failed open");
				}
				return Err(e);
			}
		};

		let session = Self::from_parts(Uuid::new_v4().to_string(), mode, tabs, reasoning);
		tracing::info!(target = "pw.session", id = %session.id, %mode, "session opened");
		Ok(session)
	}

	pub(crate) fn from_parts(id: String, mode: SessionMode, tabs: TabCoordinator, reasoning: Box<dyn ReasoningService>) -> Self {
		let session = Self {
			id,
			mode,
			created_at: unix_now(),
			tabs,
			reasoning,
			history: Vec::new(),
			retries: 0,
			completed: false,
			activity: Arc::new(Activity::new()),
		};
		session.publish();
		session
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn mode(&self) -> SessionMode {
		self.mode
	}

	pub fn created_at(&self) -> u64 {
		self.created_at
	}

	pub fn activity(&self) -> Arc<Activity> {
		Arc::clone(&self.activity)
	}

	pub fn tabs(&mut self) -> &mut TabCoordinator {
		&mut self.tabs
	}

	/// Every action executed in this session, across goals.
	pub fn history(&self) -> &[ActionRecord] {
		&self.history
	}

	pub fn retries(&self) -> u32 {
		self.retries
	}

	pub fn is_completed(&self) -> bool {
		self.completed
	}

	/// Clears the per-goal state before a new goal runs.
	pub(crate) fn begin_goal(&mut self) {
		self.completed = false;
		self.retries = 0;
		self.activity.set_running(true);
		self.publish();
	}

	pub(crate) fn end_goal(&mut self) {
		self.activity.set_running(false);
		self.publish();
	}

	pub(crate) fn record_action(&mut self, command: &Command) {
		self.history.push(ActionRecord {
			command: command.clone(),
			description: command.to_string(),
			executed_at: unix_now(),
		});
		self.retries = 0;
		self.publish();
	}

	/// Counts one recoverable failure and returns the new total.
	pub(crate) fn count_failure(&mut self) -> u32 {
		self.retries += 1;
		self.publish();
		self.retries
	}

	pub(crate) fn mark_completed(&mut self) {
		self.completed = true;
		self.publish();
	}

	/// Pushes the current counters to the shared [`Activity`].
	pub(crate) fn publish(&self) {
		let open_tabs = self.tabs.open_count();
		let mut state = self.activity.state.lock();
		state.command_count = self.history.len();
		state.retries = self.retries;
		state.completed = self.completed;
		state.open_tabs = open_tabs;
		state.last_active = Instant::now();
	}

	pub fn status(&self) -> SessionStatus {
		self.activity.status(&self.id, self.mode, self.created_at)
	}

	/// Closes every tracked page and then the browsing context.
	pub async fn close(mut self) -> Result<()> {
		self.tabs.close_all().await;
		let result = self.tabs.context().close().await;
		tracing::info!(target = "pw.session", id = %self.id, actions = self.history.len(), "session closed");
		result
	}
}
