//! pw-agent: a goal-driven browser agent.
//!
//! A [`Session`] owns one isolated browsing context and one conversation with
//! a reasoning service. [`Agent::run_goal`] turns a natural-language goal into
//! a sequence of browser actions:
//!
//! - **Grounding** ([`grounding`]): a bounded inventory of the visible,
//!   interactive elements of the current page
//! - **Interpretation** ([`interpreter`]): the reply's first line is decoded
//!   strictly into a [`Command`]; nothing else is ever executed
//! - **Execution** ([`executor`]): selector resolution with fallbacks for
//!   text clicks, dropdowns, focus-aware key presses, waits, and tab commands
//! - **Tabs** ([`tabs`]): every page the context opens is tracked, popups
//!   included, with exactly one current page
//! - **Recovery**: failures are fed back to the service until the retry
//!   budget is spent
//!
//! [`SessionRegistry`] hosts many sessions over one shared [`Browser`] and
//! expires idle ones.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pw_agent::{Browser, ChatCompletionsProvider, Config, SessionMode, SessionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> pw_agent::Result<()> {
//!     let config = Config::load(None)?;
//!     let browser = Arc::new(Browser::from_config(&config.browser).await?);
//!     let provider = Arc::new(ChatCompletionsProvider::from_config(&config.llm)?);
//!     let registry = SessionRegistry::new(browser, provider, &config);
//!
//!     let id = registry.create(SessionMode::Interact).await?;
//!     let outcome = registry.submit(&id, "search example.org for pricing").await?;
//!     println!("{:?} after {} actions", outcome.status, outcome.actions.len());
//!     registry.shutdown().await
//! }
//! ```

pub mod agent;
pub mod browser;
mod browser_context;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod grounding;
pub mod interpreter;
mod page;
pub mod prompt;
pub mod reasoning;
pub mod registry;
mod script;
pub mod session;
pub mod tabs;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::Agent;
pub use browser::Browser;
pub use browser_context::BrowserContext;
pub use config::{AgentConfig, BrowserConfig, Config, ExecutorConfig, LlmConfig, RegistryConfig, TabsConfig};
pub use engine::{ContextHandle, Engine, EngineContext, EnginePage, PageHandle};
pub use error::{Error, Result};
pub use executor::{Executor, Outcome};
pub use page::Page;
pub use pw_agent_protocol::{
	ActionRecord, Command, CommandError, ElementDescriptor, FailedAttempt, FailureKind, GoalOutcome, GoalStatus, SelectorKind,
	SessionMode, SessionStatus, StepEvent, StepKind, TabSnapshot,
};
pub use reasoning::{ChatCompletionsProvider, ChatConversation, ReasoningProvider, ReasoningService};
pub use registry::SessionRegistry;
pub use session::{Activity, Session};
pub use tabs::TabCoordinator;
