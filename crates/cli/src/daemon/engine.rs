//! Browser started on first use, so the daemon can come up (and answer
//! pings) without one.

use async_trait::async_trait;
use pw_agent::{Browser, BrowserConfig, ContextHandle, Engine};
use tokio::sync::OnceCell;

pub struct LazyBrowser {
	config: BrowserConfig,
	browser: OnceCell<Browser>,
}

impl LazyBrowser {
	pub fn new(config: BrowserConfig) -> Self {
		Self {
			config,
			browser: OnceCell::new(),
		}
	}

	async fn browser(&self) -> pw_agent::Result<&Browser> {
		self.browser
			.get_or_try_init(|| async {
				tracing::info!(target = "pw.daemon", headless = self.config.headless, "starting browser");
				Browser::from_config(&self.config).await
			})
			.await
	}
}

#[async_trait]
impl Engine for LazyBrowser {
	async fn new_context(&self) -> pw_agent::Result<ContextHandle> {
		self.browser().await?.new_context().await
	}

	async fn close(&self) -> pw_agent::Result<()> {
		match self.browser.get() {
			Some(browser) => browser.close().await,
			None => Ok(()),
		}
	}
}
