use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "pw-agent")]
#[command(about = "Goal-driven browser agent - describe a goal, let the model drive the browser")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	/// Config file (defaults to pw-agent/config.json in the platform config directory)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Attach to an existing browser (ws:// URL, http:// URL, or port)
	#[arg(long, global = true, value_name = "URL")]
	pub cdp_endpoint: Option<String>,

	/// Show the browser window
	#[arg(long, global = true)]
	pub headful: bool,

	/// Chromium executable to launch
	#[arg(long, global = true, value_name = "PATH")]
	pub chrome: Option<PathBuf>,

	/// Model name sent to the reasoning service
	#[arg(long, global = true, value_name = "NAME")]
	pub model: Option<String>,

	/// Consecutive failures tolerated before a goal fails
	#[arg(long, global = true, value_name = "N")]
	pub max_retries: Option<u32>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run one goal in a fresh browser and exit
	#[command(alias = "r")]
	Run {
		/// What the agent should accomplish
		goal: String,

		/// Session mode
		#[arg(long, default_value = "interact")]
		mode: String,
	},

	/// Manage sessions hosted by the daemon
	#[command(subcommand, alias = "s")]
	Session(SessionAction),

	/// Run or control the session daemon
	#[command(subcommand)]
	Daemon(DaemonAction),
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
	/// Create a session and print its id
	Create {
		#[arg(long, default_value = "interact")]
		mode: String,
	},
	/// Show a session's counters
	Status { id: String },
	/// Submit a goal and wait for its outcome
	Goal {
		/// Session id; a new session is created when omitted
		#[arg(long)]
		id: Option<String>,
		goal: String,
	},
	/// Close a session and its browsing context
	Close { id: String },
	/// List every live session
	#[command(alias = "ls")]
	List,
}

#[derive(Subcommand, Debug)]
pub enum DaemonAction {
	/// Start the daemon
	Start {
		/// Stay in the foreground instead of detaching
		#[arg(long)]
		foreground: bool,
	},
	/// Stop the daemon, closing every session
	Stop,
	/// Report whether the daemon is running
	Status,
}
