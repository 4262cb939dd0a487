use clap::Parser;
use pw_agent_cli::cli::Cli;
use pw_agent_cli::error::CliError;
use pw_agent_cli::output::{self, CommandResult, OutputFormat, ResultBuilder};
use pw_agent_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;

	if let Err(err) = commands::dispatch(cli, format).await {
		if !err.is_output_already_printed() {
			handle_error(&err, format);
		}
		std::process::exit(1);
	}
}

fn handle_error(err: &CliError, format: OutputFormat) {
	let cmd_error = err.to_command_error();

	output::print_error_stderr(&cmd_error);

	// Machine consumers still get an envelope on stdout.
	if format == OutputFormat::Json {
		let result: CommandResult<()> = ResultBuilder::new("error").error(cmd_error.code, &cmd_error.message).build();
		output::print_result(&result, format);
	}
}
