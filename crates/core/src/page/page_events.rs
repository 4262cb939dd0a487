//! Load-state tracking for [`Page`].

use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use super::Page;
use crate::error::{Error, Result};

impl Page {
	/// Navigates and waits for the new document's load event.
	pub(crate) async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
		let mut events = self.connection.subscribe();
		let response = self.send("Page.navigate", json!({ "url": url })).await?;
		if let Some(error) = response["errorText"].as_str().filter(|e| !e.is_empty()) {
			return Err(Error::Script(format!("navigation to {url} failed: {error}")));
		}
		// Same-document navigations (fragment changes) produce no loaderId and no load event.
		if response.get("loaderId").is_none() {
			return Ok(());
		}

		let waited = tokio::time::timeout(timeout, async {
			loop {
				match events.recv().await {
					Ok(event) if event.method == "Page.loadEventFired" && event.session_id.as_deref() == Some(self.session_id()) => {
						return Ok(());
					}
					Ok(_) | Err(RecvError::Lagged(_)) => continue,
					Err(RecvError::Closed) => return Err(Error::Runtime(pw_agent_runtime::Error::ChannelClosed)),
				}
			}
		})
		.await;
		match waited {
			Ok(result) => result,
			Err(_) => Err(Error::Timeout(format!("navigation to {url} did not load within {}ms", timeout.as_millis()))),
		}
	}

	/// Waits until `document.readyState` is `complete`.
	pub(crate) async fn wait_for_load_event(&self, timeout: Duration) -> Result<()> {
		let mut events = self.connection.subscribe();
		if self.ready_state().await.as_deref() == Some("complete") {
			return Ok(());
		}

		let waited = tokio::time::timeout(timeout, async {
			loop {
				match events.recv().await {
					Ok(event) if event.method == "Page.loadEventFired" && event.session_id.as_deref() == Some(self.session_id()) => {
						return;
					}
					Ok(_) => continue,
					// Missed events: fall back to asking the page directly.
					Err(RecvError::Lagged(_)) => {
						if self.ready_state().await.as_deref() == Some("complete") {
							return;
						}
					}
					Err(RecvError::Closed) => return,
				}
			}
		})
		.await;
		waited.map_err(|_| Error::Timeout(format!("page {} did not finish loading within {}ms", self.target_id, timeout.as_millis())))
	}

	async fn ready_state(&self) -> Option<String> {
		self.evaluate_json("document.readyState").await.ok()?.as_str().map(str::to_string)
	}
}
