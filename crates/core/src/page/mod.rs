//! [`Page`]: one attached DevTools target.

mod eval;
mod input;
mod page_events;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pw_agent_runtime::Connection;
use serde_json::{Value, json};

use crate::engine::EnginePage;
use crate::error::{Error, Result};

/// A browser tab reached through a flat-mode session on the shared connection.
pub struct Page {
	target_id: String,
	session_id: String,
	connection: Arc<Connection>,
	closed: AtomicBool,
}

impl Page {
	/// Attaches to `target_id` and enables the domains the agent relies on.
	pub(crate) async fn attach(connection: Arc<Connection>, target_id: &str) -> Result<Self> {
		let attached = connection
			.send("Target.attachToTarget", json!({ "targetId": target_id, "flatten": true }))
			.await?;
		let session_id = attached["sessionId"]
			.as_str()
			.ok_or_else(|| Error::Script("attachToTarget returned no sessionId".into()))?
			.to_string();

		let page = Self {
			target_id: target_id.to_string(),
			session_id,
			connection,
			closed: AtomicBool::new(false),
		};
		page.send("Page.enable", json!({})).await?;
		tracing::debug!(target = "pw.cdp", target_id, session = %page.session_id, "attached page");
		Ok(page)
	}

	pub fn target_id(&self) -> &str {
		&self.target_id
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	pub(crate) fn mark_closed(&self) {
		self.closed.store(true, Ordering::Release);
	}

	/// Sends a command on this page's session.
	pub(crate) async fn send(&self, method: &str, params: Value) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::Script(format!("page {} is closed", self.target_id)));
		}
		self.connection
			.send_to(Some(&self.session_id), method, params)
			.await
			.map_err(Error::from)
	}

	async fn target_info(&self) -> Result<Value> {
		let info = self
			.connection
			.send("Target.getTargetInfo", json!({ "targetId": self.target_id }))
			.await?;
		Ok(info["targetInfo"].clone())
	}
}

#[async_trait]
impl EnginePage for Page {
	fn id(&self) -> &str {
		&self.target_id
	}

	async fn url(&self) -> Result<String> {
		Ok(self.target_info().await?["url"].as_str().unwrap_or_default().to_string())
	}

	async fn title(&self) -> Result<String> {
		Ok(self.target_info().await?["title"].as_str().unwrap_or_default().to_string())
	}

	async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
		self.navigate(url, timeout).await
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		self.evaluate_json(expression).await
	}

	async fn click_at(&self, x: f64, y: f64) -> Result<()> {
		self.mouse_click(x, y).await
	}

	async fn press_key(&self, key: &str) -> Result<()> {
		self.keyboard_press(key).await
	}

	async fn bring_to_front(&self) -> Result<()> {
		self.send("Page.bringToFront", json!({})).await.map(|_| ())
	}

	async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
		self.wait_for_load_event(timeout).await
	}

	async fn close(&self) -> Result<()> {
		if self.closed.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		match self.connection.send("Target.closeTarget", json!({ "targetId": self.target_id })).await {
			Ok(_) => Ok(()),
			Err(e) if e.is_target_closed() => Ok(()),
			Err(e) => Err(e.into()),
		}
	}

	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire) || self.connection.is_closed()
	}
}
