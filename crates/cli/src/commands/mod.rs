mod daemon;
mod run;
mod session;

use anyhow::Context;
use pw_agent::Config;

use crate::cli::{Cli, Commands, DaemonAction, SessionAction};
use crate::error::Result;
use crate::output::OutputFormat;

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	match &cli.command {
		Commands::Run { goal, mode } => {
			let config = load_config(&cli)?;
			run::run(&config, goal, mode, format).await
		}
		Commands::Session(action) => match action {
			SessionAction::Create { mode } => session::create(mode, format).await,
			SessionAction::Status { id } => session::status(id, format).await,
			SessionAction::Goal { id, goal } => session::goal(id.as_deref(), goal, format).await,
			SessionAction::Close { id } => session::close(id, format).await,
			SessionAction::List => session::list(format).await,
		},
		Commands::Daemon(action) => match action {
			DaemonAction::Start { foreground } => {
				let config = load_config(&cli)?;
				daemon::start(&config, *foreground, format).await
			}
			DaemonAction::Stop => daemon::stop(format).await,
			DaemonAction::Status => daemon::status(format).await,
		},
	}
}

/// Defaults, then the config file, then `PW_AGENT_*` variables, then flags.
pub fn load_config(cli: &Cli) -> Result<Config> {
	let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
	apply_flags(&mut config, cli);
	Ok(config)
}

fn apply_flags(config: &mut Config, cli: &Cli) {
	if let Some(endpoint) = &cli.cdp_endpoint {
		config.browser.cdp_endpoint = Some(endpoint.clone());
	}
	if cli.headful {
		config.browser.headless = false;
	}
	if let Some(chrome) = &cli.chrome {
		config.browser.executable = Some(chrome.clone());
	}
	if let Some(model) = &cli.model {
		config.llm.model = model.clone();
	}
	if let Some(max_retries) = cli.max_retries {
		config.agent.max_retries = max_retries;
	}
}
