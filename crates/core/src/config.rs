//! Runtime configuration.
//!
//! Resolution order: defaults, then the JSON config file, then `PW_AGENT_*`
//! environment overrides. Command-line flags are applied on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	pub agent: AgentConfig,
	pub executor: ExecutorConfig,
	pub tabs: TabsConfig,
	pub registry: RegistryConfig,
	pub browser: BrowserConfig,
	pub llm: LlmConfig,
}

/// Interaction-loop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
	/// Consecutive recoverable failures tolerated before a goal fails.
	pub max_retries: u32,
	/// Pause after each applied action before re-grounding.
	pub settle_delay_ms: u64,
	/// Executed actions echoed back in each prompt.
	pub history_len: usize,
	pub max_elements: usize,
	pub max_options: usize,
	/// Visible-text truncation per element descriptor.
	pub text_limit: usize,
}

impl Default for AgentConfig {
	fn default() -> Self {
		Self {
			max_retries: 5,
			settle_delay_ms: 1000,
			history_len: 5,
			max_elements: 50,
			max_options: 10,
			text_limit: 80,
		}
	}
}

impl AgentConfig {
	pub fn settle_delay(&self) -> Duration {
		Duration::from_millis(self.settle_delay_ms)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorConfig {
	pub navigation_timeout_ms: u64,
	/// Upper bound on the timeout a `wait_for_element` command may request.
	pub wait_for_element_timeout_ms: u64,
	pub poll_interval_ms: u64,
	/// Delay between opening an ARIA combobox and picking its option.
	pub combobox_open_delay_ms: u64,
}

impl Default for ExecutorConfig {
	fn default() -> Self {
		Self {
			navigation_timeout_ms: 30_000,
			wait_for_element_timeout_ms: 30_000,
			poll_interval_ms: 250,
			combobox_open_delay_ms: 300,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TabsConfig {
	/// Upper bound on waiting for a discovered page's initial load.
	pub popup_load_timeout_ms: u64,
}

impl Default for TabsConfig {
	fn default() -> Self {
		Self {
			popup_load_timeout_ms: 10_000,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
	pub idle_timeout_secs: u64,
	pub sweep_interval_secs: u64,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			idle_timeout_secs: 1800,
			sweep_interval_secs: 60,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrowserConfig {
	pub headless: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub executable: Option<PathBuf>,
	/// Attach to an existing browser instead of launching one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cdp_endpoint: Option<String>,
	pub remote_debugging_port: u16,
	pub launch_timeout_ms: u64,
	/// Upper bound on the reply to any single DevTools command.
	pub command_timeout_ms: u64,
}

impl Default for BrowserConfig {
	fn default() -> Self {
		Self {
			headless: true,
			executable: None,
			cdp_endpoint: None,
			remote_debugging_port: 9222,
			launch_timeout_ms: 15_000,
			command_timeout_ms: 30_000,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
	pub base_url: String,
	pub model: String,
	/// Name of the environment variable holding the API key.
	pub api_key_env: String,
	pub timeout_secs: u64,
	pub temperature: f32,
}

impl Default for LlmConfig {
	fn default() -> Self {
		Self {
			base_url: "https://api.openai.com/v1".to_string(),
			model: "gpt-4o-mini".to_string(),
			api_key_env: "PW_AGENT_API_KEY".to_string(),
			timeout_secs: 120,
			temperature: 0.0,
		}
	}
}

impl Config {
	/// `pw-agent/config.json` under the platform config directory
	/// (`$XDG_CONFIG_HOME` or `~/.config`, `~/Library/Application Support`,
	/// `%APPDATA%`). `None` when the platform reports no such directory.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("pw-agent").join("config.json"))
	}

	/// Loads `path` (or the default path) and applies environment overrides.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let path = path.map(Path::to_path_buf).or_else(Self::default_path);
		let mut config = match path {
			Some(path) => Self::from_file(&path)?,
			None => {
				tracing::debug!(target = "pw.agent", "no config directory, using defaults");
				Self::default()
			}
		};
		config.apply_env(|key| std::env::var(key).ok());
		Ok(config)
	}

	/// Reads a JSON config file. A missing file yields the defaults.
	pub fn from_file(path: &Path) -> Result<Self> {
		let content = match fs::read_to_string(path) {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(target = "pw.agent", path = %path.display(), "no config file, using defaults");
				return Ok(Self::default());
			}
			Err(e) => return Err(e.into()),
		};
		serde_json::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
	}

	/// Applies `PW_AGENT_*` overrides using `lookup` to read variables.
	pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

		if let Some(value) = get("PW_AGENT_MAX_RETRIES") {
			match value.trim().parse() {
				Ok(n) => self.agent.max_retries = n,
				Err(_) => tracing::warn!(target = "pw.agent", value = %value, "ignoring invalid PW_AGENT_MAX_RETRIES"),
			}
		}
		if let Some(value) = get("PW_AGENT_LLM_BASE_URL") {
			self.llm.base_url = value;
		}
		if let Some(value) = get("PW_AGENT_LLM_MODEL") {
			self.llm.model = value;
		}
		if let Some(value) = get(pw_agent_runtime::driver::CHROME_ENV) {
			self.browser.executable = Some(PathBuf::from(value));
		}
		if let Some(value) = get("PW_AGENT_CDP_ENDPOINT") {
			self.browser.cdp_endpoint = Some(value);
		}
	}
}
