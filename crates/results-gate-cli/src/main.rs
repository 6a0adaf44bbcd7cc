// crates/results-gate-cli/src/main.rs
// ============================================================================
// Module: Results Gate CLI Entry Point
// Description: Command dispatcher for serving and inspecting the results gate.
// Purpose: Run the gated results server and validate its configuration.
// Dependencies: clap, results-gate-config, results-gate-server, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The `results-gate` binary starts the gated results server and offers
//! offline helpers for configuration and the method mapping table. Output is
//! written explicitly to stdout or stderr; failures exit non-zero.

// ============================================================================
// SECTION: Modules
// ============================================================================


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
use results_gate_config::PORT_ENV_VAR;
use results_gate_config::ResultsGateConfig;
use results_gate_config::apply_port_override;
use results_gate_config::config_toml_example;
use results_gate_server::MethodRegistry;
use results_gate_server::ResultsGateServer;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "results-gate", disable_help_subcommand = true, disable_version_flag = true)]
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
    /// Start the gated results server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print the method to resource and verb mapping table.
    Methods,
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to results-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
    /// Print the canonical example configuration.
    Example,
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to results-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message shown to the operator.
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
        write_stdout(&format!("results-gate {version}"))?;
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
        Commands::Methods => command_methods(),
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let help = Cli::command().render_help().to_string();
    write_stdout(&help)
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = ResultsGateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let port_override = std::env::var(PORT_ENV_VAR).ok();
    let banner = listening_line(&config, port_override.as_deref())?;
    let server = tokio::task::spawn_blocking(move || ResultsGateServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr(&banner)?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Formats the startup line for the address the listener actually binds.
fn listening_line(config: &ResultsGateConfig, port_override: Option<&str>) -> CliResult<String> {
    let addr = apply_port_override(&config.server.bind, port_override)
        .map_err(|err| CliError::new(format!("failed to resolve bind address: {err}")))?;
    let scheme = if config.server.tls.is_some() { "https" } else { "http" };
    Ok(format!("results-gate listening on {addr} ({scheme})"))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
        ConfigCommand::Example => {
            write_stdout(config_toml_example().trim_end())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = ResultsGateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout(&format!(
        "config ok (auth: {}, authority: {})",
        config.auth.mode.as_str(),
        config.authority.mode.as_str()
    ))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Methods Command
// ============================================================================

/// Prints the default method mapping table.
fn command_methods() -> CliResult<ExitCode> {
    write_stdout(render_method_table(&MethodRegistry::results_defaults()).trim_end())?;
    Ok(ExitCode::SUCCESS)
}

/// Renders the registry as an aligned text table.
fn render_method_table(registry: &MethodRegistry) -> String {
    let width = registry.rules().map(|rule| rule.method.len()).max().unwrap_or(0).max(6);
    let mut table = format!("{:<width$}  {:<8}  {:<6}  scope\n", "METHOD", "RESOURCE", "VERB");
    for rule in registry.rules() {
        let named = if rule.named { " (named)" } else { "" };
        table.push_str(&format!(
            "{:<width$}  {:<8}  {:<6}  {}{named}\n",
            rule.method,
            rule.resource_type.plural(),
            rule.verb.as_str(),
            rule.scope_field.as_str(),
        ));
    }
    table
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a line to stdout.
fn write_stdout(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr(message: &str) -> CliResult<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stderr: {err}")))
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr(message);
    ExitCode::FAILURE
}
