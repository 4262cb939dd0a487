//! [`BrowserContext`]: an isolated DevTools browser context and its pages.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use pw_agent_runtime::{Connection, Event};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};

use crate::engine::{EngineContext, EnginePage, PageHandle};
use crate::error::{Error, Result};
use crate::page::Page;

const PAGE_EVENT_CAPACITY: usize = 64;

/// Pages are kept in creation order and removed when their target is destroyed.
pub struct BrowserContext {
	id: String,
	connection: Arc<Connection>,
	pages: RwLock<Vec<Arc<Page>>>,
	/// Serialises attach so an event and `new_page` never attach the same target twice.
	attach_lock: Mutex<()>,
	page_tx: broadcast::Sender<PageHandle>,
}

impl BrowserContext {
	pub(crate) async fn create(connection: Arc<Connection>) -> Result<Arc<Self>> {
		let created = connection
			.send("Target.createBrowserContext", json!({ "disposeOnDetach": true }))
			.await
			.map_err(|e| Error::Resource(format!("create browser context: {e}")))?;
		let id = created["browserContextId"]
			.as_str()
			.ok_or_else(|| Error::Resource("createBrowserContext returned no id".into()))?
			.to_string();

		let (page_tx, _) = broadcast::channel(PAGE_EVENT_CAPACITY);
		let context = Arc::new(Self {
			id,
			connection: Arc::clone(&connection),
			pages: RwLock::new(Vec::new()),
			attach_lock: Mutex::new(()),
			page_tx,
		});

		let events = connection.subscribe();
		tokio::spawn(listen(Arc::downgrade(&context), events));
		tracing::debug!(target = "pw.cdp", context = %context.id, "browser context created");
		Ok(context)
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Returns the tracked page for `target_id`, attaching it on first sight.
	async fn ensure_page(&self, target_id: &str) -> Result<Arc<Page>> {
		let _guard = self.attach_lock.lock().await;
		if let Some(page) = self.find(target_id) {
			return Ok(page);
		}
		let page = Arc::new(Page::attach(Arc::clone(&self.connection), target_id).await?);
		self.pages.write().push(Arc::clone(&page));
		let _ = self.page_tx.send(Arc::clone(&page) as PageHandle);
		Ok(page)
	}

	fn find(&self, target_id: &str) -> Option<Arc<Page>> {
		self.pages.read().iter().find(|p| p.target_id() == target_id).cloned()
	}

	fn forget(&self, target_id: &str) {
		let mut pages = self.pages.write();
		if let Some(pos) = pages.iter().position(|p| p.target_id() == target_id) {
			pages.remove(pos).mark_closed();
			tracing::debug!(target = "pw.cdp", context = %self.id, target_id, "page destroyed");
		}
	}

	async fn on_event(&self, event: Event) {
		match event.method.as_str() {
			"Target.targetCreated" => {
				let info = &event.params["targetInfo"];
				if !self.owns(info) {
					return;
				}
				let Some(target_id) = info["targetId"].as_str() else { return };
				if let Err(e) = self.ensure_page(target_id).await {
					tracing::warn!(target = "pw.cdp", target_id, error = %e, "failed to attach new page");
				}
			}
			"Target.targetDestroyed" => {
				if let Some(target_id) = event.params["targetId"].as_str() {
					self.forget(target_id);
				}
			}
			"Target.detachedFromTarget" => {
				if let Some(target_id) = event.params["targetId"].as_str() {
					self.forget(target_id);
				}
			}
			_ => {}
		}
	}

	fn owns(&self, info: &Value) -> bool {
		info["type"] == "page" && info["browserContextId"].as_str() == Some(self.id.as_str())
	}
}

/// Routes target lifecycle events to the context until it is dropped.
async fn listen(context: Weak<BrowserContext>, mut events: broadcast::Receiver<Event>) {
	loop {
		let event = match events.recv().await {
			Ok(event) => event,
			Err(RecvError::Lagged(skipped)) => {
				tracing::warn!(target = "pw.cdp", skipped, "context listener lagged");
				continue;
			}
			Err(RecvError::Closed) => break,
		};
		if !event.method.starts_with("Target.") {
			continue;
		}
		let Some(context) = context.upgrade() else { break };
		context.on_event(event).await;
	}
}

#[async_trait]
impl EngineContext for BrowserContext {
	async fn new_page(&self) -> Result<PageHandle> {
		let created = self
			.connection
			.send("Target.createTarget", json!({ "url": "about:blank", "browserContextId": self.id }))
			.await
			.map_err(|e| Error::Resource(format!("create page: {e}")))?;
		let target_id = created["targetId"]
			.as_str()
			.ok_or_else(|| Error::Resource("createTarget returned no targetId".into()))?;
		let page = self
			.ensure_page(target_id)
			.await
			.map_err(|e| Error::Resource(format!("attach page: {e}")))?;
		Ok(page as PageHandle)
	}

	fn pages(&self) -> Vec<PageHandle> {
		self.pages
			.read()
			.iter()
			.filter(|p| !p.is_closed())
			.map(|p| Arc::clone(p) as PageHandle)
			.collect()
	}

	fn subscribe_pages(&self) -> broadcast::Receiver<PageHandle> {
		self.page_tx.subscribe()
	}

	async fn close(&self) -> Result<()> {
		let pages: Vec<Arc<Page>> = self.pages.write().drain(..).collect();
		for page in pages {
			if let Err(e) = page.close().await {
				tracing::debug!(target = "pw.cdp", target_id = page.target_id(), error = %e, "page close failed");
			}
		}
		match self
			.connection
			.send("Target.disposeBrowserContext", json!({ "browserContextId": self.id }))
			.await
		{
			Ok(_) => Ok(()),
			Err(e) if self.connection.is_closed() => {
				tracing::debug!(target = "pw.cdp", error = %e, "connection gone before context dispose");
				Ok(())
			}
			Err(e) => Err(e.into()),
		}
	}
}
