// crates/fanout-bus-cli/src/main.rs
// ============================================================================
// Module: Fanout Bus CLI Entry Point
// Description: Command dispatcher for the fan-out bus server and config tools.
// Purpose: Serve channels over HTTP and inspect configuration files offline.
// Dependencies: clap, fanout-bus-cli, fanout-bus-config, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The `fanout-bus` binary runs the ingress server (`serve`) and offers
//! offline configuration checks (`config validate`, `config diff`).
//! Security posture: inputs are untrusted and must be validated before the
//! engine sees them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use fanout_bus_cli::FanoutServer;
use fanout_bus_config::FanoutBusConfig;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fanout-bus", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the channel ingress server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to fanout-bus.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
    /// Show the channel changes between two configuration files.
    Diff(ConfigDiffCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to fanout-bus.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for config diffing.
#[derive(Args, Debug)]
struct ConfigDiffCommand {
    /// Currently active configuration.
    #[arg(long, value_name = "PATH")]
    from: PathBuf,
    /// Candidate configuration.
    #[arg(long, value_name = "PATH")]
    to: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("fanout-bus {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config)?;
    let bind = config.server.bind.clone();
    let server = tokio::task::spawn_blocking(move || FanoutServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    let channels = server.config().channels.len();
    write_stderr_line(&format!("fanout-bus listening on {bind} ({channels} channels)"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
        ConfigCommand::Diff(command) => command_config_diff(&command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config)?;
    let subscriptions: usize =
        config.channels.iter().map(|channel| channel.subscriptions.len()).sum();
    write_stdout_line(&format!(
        "config ok: {} channels, {subscriptions} subscriptions",
        config.channels.len()
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config diff command.
fn command_config_diff(command: &ConfigDiffCommand) -> CliResult<ExitCode> {
    let from = load_config(Some(command.from.clone()))?
        .fanout_config()
        .map_err(|err| CliError::new(format!("{}: {err}", command.from.display())))?;
    let to = load_config(Some(command.to.clone()))?
        .fanout_config()
        .map_err(|err| CliError::new(format!("{}: {err}", command.to.display())))?;
    write_stdout_line(&from.diff(&to).to_string())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads configuration, naming the source in the error.
fn load_config(path: Option<PathBuf>) -> CliResult<FanoutBusConfig> {
    FanoutBusConfig::load(path.as_deref()).map_err(|err| match path {
        Some(path) => CliError::new(format!("failed to load {}: {err}", path.display())),
        None => CliError::new(format!("failed to load config: {err}")),
    })
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
