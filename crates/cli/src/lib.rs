//! Command-line surface for pw-agent: one-shot `run`, the session daemon,
//! and the client subcommands that talk to it.

pub mod cli;
pub mod commands;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod output;
pub mod styles;
