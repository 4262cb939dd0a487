//! Tab bookkeeping for one session.
//!
//! Pages can appear outside the loop's control (a click that opens a popup),
//! so the coordinator subscribes once to the context's page notifications and
//! folds every new page into its tracked list. Indices handed to the reasoning
//! service are positions in the live list at the time of the call and are never
//! stored.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pw_agent_protocol::TabSnapshot;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::engine::{ContextHandle, PageHandle};
use crate::error::{Error, Result};

type Tracked = Arc<Mutex<Vec<PageHandle>>>;

pub struct TabCoordinator {
	context: ContextHandle,
	tracked: Tracked,
	current: Option<PageHandle>,
	listener: Option<JoinHandle<()>>,
	popup_load_timeout: Duration,
}

impl TabCoordinator {
	pub fn new(context: ContextHandle, popup_load_timeout: Duration) -> Self {
		Self {
			context,
			tracked: Arc::new(Mutex::new(Vec::new())),
			current: None,
			listener: None,
			popup_load_timeout,
		}
	}

	pub fn context(&self) -> &ContextHandle {
		&self.context
	}

	/// Starts folding context page notifications into the tracked list.
	/// Calling it again is a no-op.
	pub fn install_listener(&mut self) {
		if self.listener.is_some() {
			return;
		}
		let mut pages = self.context.subscribe_pages();
		let tracked = Arc::clone(&self.tracked);
		let timeout = self.popup_load_timeout;
		self.listener = Some(tokio::spawn(async move {
			loop {
				match pages.recv().await {
					Ok(page) => {
						if track(&tracked, &page) {
							tracing::info!(target = "pw.tabs", page = page.id(), "new page opened");
							tokio::spawn(settle(page, timeout));
						}
					}
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(target = "pw.tabs", skipped, "page notifications lagged");
					}
					Err(RecvError::Closed) => break,
				}
			}
		}));
	}

	/// Opens a fresh page, tracks it, and makes it current.
	///
	/// # Errors
	///
	/// Returns [`Error::Resource`] when the context cannot create a page.
	pub async fn open_page(&mut self) -> Result<PageHandle> {
		let page = self.context.new_page().await?;
		track(&self.tracked, &page);
		self.current = Some(Arc::clone(&page));
		tracing::debug!(target = "pw.tabs", page = page.id(), "opened page");
		Ok(page)
	}

	/// The active page. If it has gone away, the first remaining page is
	/// promoted.
	pub fn current(&mut self) -> Option<PageHandle> {
		if let Some(page) = &self.current
			&& !page.is_closed()
		{
			return Some(Arc::clone(page));
		}
		self.current = self.live_pages().into_iter().next();
		self.current.clone()
	}

	/// Every open page in creation order. Tracked pages the context no
	/// longer lists come last.
	pub fn live_pages(&self) -> Vec<PageHandle> {
		let mut pages = self.context.pages();
		let mut tracked = self.tracked.lock();
		tracked.retain(|p| !p.is_closed());
		for page in &pages {
			if !tracked.iter().any(|p| p.id() == page.id()) {
				tracked.push(Arc::clone(page));
			}
		}
		for page in tracked.iter() {
			if !pages.iter().any(|p| p.id() == page.id()) {
				pages.push(Arc::clone(page));
			}
		}
		pages
	}

	pub fn open_count(&self) -> usize {
		self.live_pages().len()
	}

	/// Snapshots of every open page, marking the current one.
	pub async fn get_all_pages(&mut self) -> Vec<TabSnapshot> {
		let current = self.current();
		let mut tabs = Vec::new();
		for (index, page) in self.live_pages().into_iter().enumerate() {
			tabs.push(TabSnapshot {
				index,
				title: page.title().await.unwrap_or_default(),
				url: page.url().await.unwrap_or_default(),
				current: current.as_ref().is_some_and(|c| c.id() == page.id()),
			});
		}
		tabs
	}

	/// Makes the page at `index` current and brings it to the front.
	///
	/// # Errors
	///
	/// Returns [`Error::TabOutOfRange`] if `index` is not an open tab.
	pub async fn switch_to(&mut self, index: usize) -> Result<PageHandle> {
		let pages = self.live_pages();
		let page = pages.get(index).cloned().ok_or(Error::TabOutOfRange {
			index,
			count: pages.len(),
		})?;
		page.bring_to_front().await?;
		self.current = Some(Arc::clone(&page));
		tracing::info!(target = "pw.tabs", index, page = page.id(), "switched tab");
		Ok(page)
	}

	/// Closes the page at `index`, or the current page when `None`.
	///
	/// When the closed page was current, the first remaining page becomes
	/// current and is brought to the front.
	pub async fn close_tab(&mut self, index: Option<usize>) -> Result<()> {
		let pages = self.live_pages();
		let target = match index {
			Some(index) => pages.get(index).cloned().ok_or(Error::TabOutOfRange {
				index,
				count: pages.len(),
			})?,
			None => self.current().ok_or(Error::NoActivePage)?,
		};
		let was_current = self.current.as_ref().is_some_and(|c| c.id() == target.id());

		target.close().await?;
		self.tracked.lock().retain(|p| p.id() != target.id());
		tracing::info!(target = "pw.tabs", page = target.id(), was_current, "closed tab");

		if was_current {
			self.current = None;
			if let Some(next) = self.live_pages().into_iter().next() {
				next.bring_to_front().await?;
				self.current = Some(next);
			}
		}
		Ok(())
	}

	/// Closes every open page except the current one and returns how many
	/// were closed.
	pub async fn close_other_tabs(&mut self) -> Result<usize> {
		let current = self.current().ok_or(Error::NoActivePage)?;
		let mut closed = 0;
		for page in self.live_pages() {
			if page.id() == current.id() {
				continue;
			}
			page.close().await?;
			closed += 1;
		}
		self.tracked.lock().retain(|p| p.id() == current.id());
		tracing::info!(target = "pw.tabs", closed, "closed other tabs");
		Ok(closed)
	}

	/// Stops the listener and closes every tracked page.
	pub async fn close_all(&mut self) {
		if let Some(listener) = self.listener.take() {
			listener.abort();
		}
		let pages: Vec<PageHandle> = self.tracked.lock().drain(..).collect();
		for page in pages {
			if let Err(e) = page.close().await {
				tracing::debug!(target = "pw.tabs", page = page.id(), error = %e, "page close failed");
			}
		}
		self.current = None;
	}
}

impl Drop for TabCoordinator {
	fn drop(&mut self) {
		if let Some(listener) = self.listener.take() {
			listener.abort();
		}
	}
}

/// Appends `page` unless a page with the same id is already tracked.
fn track(tracked: &Mutex<Vec<PageHandle>>, page: &PageHandle) -> bool {
	let mut tracked = tracked.lock();
	if page.is_closed() || tracked.iter().any(|p| p.id() == page.id()) {
		return false;
	}
	tracked.push(Arc::clone(page));
	true
}

/// Waits for a discovered page's first load without holding up the loop.
async fn settle(page: PageHandle, timeout: Duration) {
	if let Err(e) = page.wait_for_load(timeout).await {
		tracing::warn!(target = "pw.tabs", page = page.id(), error = %e, "new page did not finish loading");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::{EngineContext, EnginePage};
	use crate::testing::FakeContext;

	async fn coordinator_with(n: usize) -> (Arc<FakeContext>, TabCoordinator) {
		let context = FakeContext::new();
		let mut tabs = TabCoordinator::new(Arc::clone(&context) as ContextHandle, Duration::from_secs(1));
		tabs.install_listener();
		for _ in 0..n {
			tabs.open_page().await.unwrap();
		}
		(context, tabs)
	}

	#[tokio::test]
	async fn closing_an_earlier_tab_keeps_current() {
		let (_context, mut tabs) = coordinator_with(3).await;
		let second = tabs.switch_to(1).await.unwrap();

		tabs.close_tab(Some(0)).await.unwrap();

		let snapshot = tabs.get_all_pages().await;
		assert_eq!(snapshot.len(), 2);
		assert!(snapshot[0].current);
		assert_eq!(tabs.current().unwrap().id(), second.id());
	}

	#[tokio::test]
	async fn closing_current_promotes_first_remaining() {
		let (context, mut tabs) = coordinator_with(3).await;
		tabs.switch_to(2).await.unwrap();

		tabs.close_tab(None).await.unwrap();

		let first = &context.fake_pages()[0];
		assert_eq!(tabs.current().unwrap().id(), first.id());
		assert_eq!(first.front_count(), 1);
		assert_eq!(tabs.open_count(), 2);
	}

	#[tokio::test]
	async fn out_of_range_switch_is_an_error() {
		let (_context, mut tabs) = coordinator_with(1).await;
		let err = tabs.switch_to(4).await.err().unwrap();
		assert!(matches!(err, Error::TabOutOfRange { index: 4, count: 1 }));
		assert!(tabs.close_tab(Some(1)).await.is_err());
		assert_eq!(tabs.open_count(), 1);
	}

	#[tokio::test]
	async fn popup_is_tracked_once() {
		let (context, mut tabs) = coordinator_with(1).await;
		let popup = context.spawn("https://example.org/help");
		// Duplicate delivery of the same page.
		let handle = Arc::clone(&popup) as PageHandle;
		track(&tabs.tracked, &handle);
		assert!(!track(&tabs.tracked, &handle));
		tokio::task::yield_now().await;

		let snapshot = tabs.get_all_pages().await;
		assert_eq!(snapshot.len(), 2);
		assert_eq!(snapshot[1].url, "https://example.org/help");
		assert!(snapshot[0].current);
		assert_eq!(tabs.close_other_tabs().await.unwrap(), 1);
		assert_eq!(tabs.open_count(), 1);
	}

	#[tokio::test]
	async fn listener_installs_once() {
		let (context, mut tabs) = coordinator_with(0).await;
		tabs.install_listener();
		context.spawn("about:blank");
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(tabs.tracked.lock().len(), 1);
	}

	#[tokio::test]
	async fn indices_follow_creation_order() {
		let context = FakeContext::new();
		let mut tabs = TabCoordinator::new(Arc::clone(&context) as ContextHandle, Duration::from_secs(1));
		let earlier = context.spawn("https://example.org/earlier");
		let opened = tabs.open_page().await.unwrap();
		assert_eq!(tabs.tracked.lock().len(), 1);

		let snapshot = tabs.get_all_pages().await;
		assert_eq!(snapshot.len(), 2);
		assert_eq!(snapshot[0].url, "https://example.org/earlier");
		assert!(!snapshot[0].current);
		assert!(snapshot[1].current);

		assert_eq!(tabs.switch_to(0).await.unwrap().id(), earlier.id());
		tabs.close_tab(Some(1)).await.unwrap();
		assert!(opened.is_closed());
		assert_eq!(tabs.open_count(), 1);
	}

	#[tokio::test]
	async fn externally_closed_current_page_is_replaced() {
		let (context, mut tabs) = coordinator_with(2).await;
		tabs.switch_to(1).await.unwrap();
		context.fake_pages()[1].close().await.unwrap();
		assert_eq!(tabs.current().unwrap().id(), context.fake_pages()[0].id());
		assert!(context.pages().len() == 1);
	}
}
