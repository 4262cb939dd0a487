//! [`SessionRegistry`]: create, look up, and expire sessions.
//!
//! The registry is the only process-wide structure. Each entry owns its
//! session behind an async mutex that a running goal holds for its whole
//! duration, so closing or sweeping a session never tears it down under a
//! live loop: explicit close waits for the goal to finish, the sweep skips it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use pw_agent_protocol::{GoalOutcome, SessionMode, SessionStatus};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::agent::Agent;
use crate::config::{Config, TabsConfig};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::reasoning::ReasoningProvider;
use crate::session::{Activity, Session};

struct Entry {
	id: String,
	mode: SessionMode,
	created_at: u64,
	activity: Arc<Activity>,
	/// `None` once the session has been closed.
	session: Mutex<Option<Session>>,
}

impl Entry {
	fn status(&self) -> SessionStatus {
		self.activity.status(&self.id, self.mode, self.created_at)
	}
}

pub struct SessionRegistry {
	engine: Arc<dyn Engine>,
	provider: Arc<dyn ReasoningProvider>,
	agent: Agent,
	tabs: TabsConfig,
	idle_timeout: Duration,
	sessions: DashMap<String, Arc<Entry>>,
}

impl SessionRegistry {
	pub fn new(engine: Arc<dyn Engine>, provider: Arc<dyn ReasoningProvider>, config: &Config) -> Self {
		Self {
			engine,
			provider,
			agent: Agent::from_config(config),
			tabs: config.tabs.clone(),
			idle_timeout: Duration::from_secs(config.registry.idle_timeout_secs),
			sessions: DashMap::new(),
		}
	}

	pub fn idle_timeout(&self) -> Duration {
		self.idle_timeout
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	/// Opens a new session and returns its id.
	pub async fn create(&self, mode: SessionMode) -> Result<String> {
		let session = Session::open(self.engine.as_ref(), self.provider.as_ref(), mode, &self.tabs).await?;
		let id = session.id().to_string();
		let entry = Entry {
			id: id.clone(),
			mode,
			created_at: session.created_at(),
			activity: session.activity(),
			session: Mutex::new(Some(session)),
		};
		self.sessions.insert(id.clone(), Arc::new(entry));
		tracing::debug!(target = "pw.session", %id, sessions = self.sessions.len(), "session registered");
		Ok(id)
	}

	fn entry(&self, id: &str) -> Result<Arc<Entry>> {
		self.sessions
			.get(id)
			.map(|entry| Arc::clone(entry.value()))
			.ok_or_else(|| Error::SessionNotFound(id.to_string()))
	}

	/// Never waits on a running goal.
	pub fn status(&self, id: &str) -> Result<SessionStatus> {
		self.entry(id).map(|entry| entry.status())
	}

	pub fn list(&self) -> Vec<SessionStatus> {
		let mut list: Vec<SessionStatus> = self.sessions.iter().map(|entry| entry.status()).collect();
		list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
		list
	}

	/// Runs `goal` to completion on session `id`. Goals submitted to the same
	/// session run one after another.
	pub async fn submit(&self, id: &str, goal: &str) -> Result<GoalOutcome> {
		let entry = self.entry(id)?;
		let mut slot = entry.session.lock().await;
		let session = slot.as_mut().ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
		Ok(self.agent.run_goal(session, goal).await)
	}

	/// Removes the session and closes its pages and context, waiting for a
	/// running goal to finish first.
	pub async fn close(&self, id: &str) -> Result<()> {
		let (_, entry) = self
			.sessions
			.remove(id)
			.ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
		if entry.activity.is_running() {
			tracing::info!(target = "pw.session", %id, "close deferred until the running goal finishes");
		}
		let session = entry.session.lock().await.take();
		match session {
			Some(session) => session.close().await,
			None => Ok(()),
		}
	}

	/// Closes sessions idle for longer than `idle_timeout`. Sessions with a
	/// goal in flight are left alone. Returns the ids that were closed.
	pub async fn sweep(&self, idle_timeout: Duration) -> Vec<String> {
		let candidates: Vec<Arc<Entry>> = self
			.sessions
			.iter()
			.filter(|entry| !entry.activity.is_running() && entry.activity.idle_for() > idle_timeout)
			.map(|entry| Arc::clone(entry.value()))
			.collect();

		let mut closed = Vec::new();
		for entry in candidates {
			let Ok(mut slot) = entry.session.try_lock() else {
				continue;
			};
			if entry.activity.is_running() || entry.activity.idle_for() <= idle_timeout {
				continue;
			}
			let removed = self
				.sessions
				.remove_if(&entry.id, |_, current| Arc::ptr_eq(current, &entry))
				.is_some();
			if !removed {
				continue;
			}
			if let Some(session) = slot.take() {
				let idle_secs = entry.activity.idle_for().as_secs();
				if let Err(e) = session.close().await {
					tracing::warn!(target = "pw.session", id = %entry.id, error = %e, "error closing expired session");
				}
				tracing::info!(target = "pw.session", id = %entry.id, idle_secs, "expired idle session");
			}
			closed.push(entry.id.clone());
		}
		closed
	}

	/// Runs [`Self::sweep`] every `interval` until the registry is dropped.
	pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
		let registry: Weak<Self> = Arc::downgrade(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let Some(registry) = registry.upgrade() else {
					break;
				};
				let closed = registry.sweep(registry.idle_timeout).await;
				if !closed.is_empty() {
					tracing::debug!(target = "pw.session", count = closed.len(), remaining = registry.len(), "sweep finished");
				}
			}
		})
	}

	/// Closes every session, then the engine.
	pub async fn shutdown(&self) -> Result<()> {
		let ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
		for id in ids {
			if let Err(e) = self.close(&id).await {
				tracing::warn!(target = "pw.session", %id, error = %e, "error closing session during shutdown");
			}
		}
		self.engine.close().await
	}
}
