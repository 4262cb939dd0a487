//! Browser-engine boundary.
//!
//! The agent only needs a handful of automation primitives: isolated
//! browsing contexts, pages inside them, navigation, script evaluation,
//! trusted pointer/keyboard input, and a notification when a page appears.
//! [`crate::browser`] implements these over the DevTools protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;

pub type PageHandle = Arc<dyn EnginePage>;
pub type ContextHandle = Arc<dyn EngineContext>;

/// A browser process (launched or attached) that hands out isolated contexts.
#[async_trait]
pub trait Engine: Send + Sync {
	/// Creates a fresh browsing context with its own cookies and storage.
	async fn new_context(&self) -> Result<ContextHandle>;

	async fn close(&self) -> Result<()>;
}

/// An isolated set of pages owned by exactly one session.
#[async_trait]
pub trait EngineContext: Send + Sync {
	async fn new_page(&self) -> Result<PageHandle>;

	/// Open pages in creation order.
	fn pages(&self) -> Vec<PageHandle>;

	/// Receives every page created in this context after the call, including
	/// pages opened by the page itself. A page may be delivered more than once.
	fn subscribe_pages(&self) -> broadcast::Receiver<PageHandle>;

	/// Closes every page and disposes the context.
	async fn close(&self) -> Result<()>;
}

/// One tab.
#[async_trait]
pub trait EnginePage: Send + Sync {
	/// Stable identity for the lifetime of the page.
	fn id(&self) -> &str;

	async fn url(&self) -> Result<String>;

	async fn title(&self) -> Result<String>;

	/// Navigates and waits for the load event.
	async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

	/// Evaluates `expression`, awaiting promises, and returns the value as JSON.
	async fn evaluate(&self, expression: &str) -> Result<Value>;

	/// Trusted left click at viewport coordinates.
	async fn click_at(&self, x: f64, y: f64) -> Result<()>;

	/// Trusted key down/up pair sent to whatever has focus.
	async fn press_key(&self, key: &str) -> Result<()>;

	async fn bring_to_front(&self) -> Result<()>;

	/// Resolves once the page has finished its current load, or errors on timeout.
	async fn wait_for_load(&self, timeout: Duration) -> Result<()>;

	async fn close(&self) -> Result<()>;

	fn is_closed(&self) -> bool;
}
