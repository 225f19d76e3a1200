// contrato-cli/src/main.rs
// ============================================================================
// Module: Contrato CLI Entry Point
// Description: Command dispatcher for blueprint queries and rendering.
// Purpose: Resolve blueprints against on-disk universes from the shell.
// Dependencies: clap, contrato-*, serde_json, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! `contrato query` loads a universe directory, compiles a layout into a
//! blueprint and prints every resolved context as one canonical JSON line.
//! `contrato render` renders a template per context, separated by `---`
//! lines. `contrato config validate` checks a `contrato.toml`.
//!
//! Inputs come from flags, falling back to the configuration file. Logs go
//! to stderr so stdout stays machine-readable.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use contrato_config::ContratoConfig;
use contrato_core::Blueprint;
use contrato_core::Contract;
use contrato_core::hashing::canonical_json_bytes;
use contrato_render::build_template;
use contrato_universe::LoadOptions;
use contrato_universe::load_universe;
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a layout or skeleton JSON input.
const MAX_JSON_INPUT_BYTES: usize = 1024 * 1024;
/// Maximum size of a template input.
const MAX_TEMPLATE_BYTES: usize = 1024 * 1024;
/// Environment variable holding the default log filter.
const LOG_ENV: &str = "CONTRATO_LOG";
/// Log filter used when neither flag nor environment sets one.
const DEFAULT_LOG_FILTER: &str = "warn";
/// Separator printed between rendered contexts.
const RENDER_SEPARATOR: &str = "---";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "contrato", version, disable_help_subcommand = true)]
struct Cli {
    /// Log filter directive (overrides `CONTRATO_LOG`).
    #[arg(long, value_name = "FILTER", global = true)]
    log_level: Option<String>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every context a blueprint resolves to.
    Query(QueryCommand),
    /// Render a template for every resolved context.
    Render(RenderCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Inputs shared by `query` and `render`.
#[derive(Args, Debug, Clone, Default)]
struct QueryCommand {
    /// Optional config file path (defaults to contrato.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Universe directory (overrides `universe.directory`).
    #[arg(long, value_name = "DIR")]
    universe: Option<PathBuf>,
    /// Layout JSON file (overrides `query.layout`).
    #[arg(long, value_name = "FILE")]
    layout: Option<PathBuf>,
    /// Skeleton JSON file (overrides `query.skeleton`).
    #[arg(long, value_name = "FILE")]
    skeleton: Option<PathBuf>,
    /// Load canonical contracts only, ignoring aliases.
    #[arg(long, action = ArgAction::SetTrue)]
    canonical_only: bool,
    /// Maximum number of contexts to print.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

/// Configuration for the `render` command.
#[derive(Args, Debug)]
struct RenderCommand {
    /// Query inputs.
    #[command(flatten)]
    query: QueryCommand,
    /// Template file (overrides `render.template`).
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,
    /// Partials directory (overrides `render.partials`).
    #[arg(long, value_name = "DIR")]
    partials: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a contrato configuration file.
    Validate(ConfigValidateCommand),
}

/// Configuration for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to contrato.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
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
    init_tracing(cli.log_level.as_deref())?;
    match cli.command {
        Commands::Query(command) => command_query(&command).await,
        Commands::Render(command) => command_render(&command).await,
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
    }
}

/// Installs the stderr tracing subscriber.
fn init_tracing(log_level: Option<&str>) -> CliResult<()> {
    let filter = match log_level {
        Some(directive) => EnvFilter::try_new(directive)
            .map_err(|err| CliError::new(format!("invalid log filter: {err}")))?,
        None => EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| CliError::new(format!("failed to install logger: {err}")))
}

// ============================================================================
// SECTION: Query Command
// ============================================================================

/// Executes the `query` command.
async fn command_query(command: &QueryCommand) -> CliResult<ExitCode> {
    let inputs = resolve_query_inputs(command)?;
    let universe = load(&inputs).await?;
    let mut printed = 0_usize;
    for context in inputs.blueprint.reproduce(&universe).take(inputs.limit.unwrap_or(usize::MAX)) {
        let context =
            context.map_err(|err| CliError::new(format!("failed to resolve context: {err}")))?;
        write_canonical_json(&context.to_json())?;
        printed += 1;
    }
    info!(contexts = printed, "query complete");
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Render Command
// ============================================================================

/// Executes the `render` command.
async fn command_render(command: &RenderCommand) -> CliResult<ExitCode> {
    let inputs = resolve_query_inputs(&command.query)?;
    let render_config = inputs.config.as_ref().and_then(|config| config.render.as_ref());
    let template_path = command
        .template
        .clone()
        .or_else(|| render_config.map(|render| render.template.clone()))
        .ok_or_else(|| CliError::new("no template given (use --template or [render])".to_string()))?;
    let partials = command
        .partials
        .clone()
        .or_else(|| render_config.map(|render| render.partials.clone()))
        .ok_or_else(|| CliError::new("no partials given (use --partials or [render])".to_string()))?;
    let template = read_text(&template_path, MAX_TEMPLATE_BYTES, "template")?;

    let universe = load(&inputs).await?;
    let mut rendered = 0_usize;
    for context in inputs.blueprint.reproduce(&universe).take(inputs.limit.unwrap_or(usize::MAX)) {
        let context =
            context.map_err(|err| CliError::new(format!("failed to resolve context: {err}")))?;
        let output = render_context(&template, &context, &partials)?;
        if rendered > 0 {
            write_stdout_line(RENDER_SEPARATOR)
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        write_stdout_line(&output).map_err(|err| CliError::new(output_error("stdout", &err)))?;
        rendered += 1;
    }
    info!(contexts = rendered, "render complete");
    Ok(ExitCode::SUCCESS)
}

/// Renders one context.
fn render_context(template: &str, context: &Contract, partials: &Path) -> CliResult<String> {
    build_template(template, context, partials)
        .map_err(|err| CliError::new(format!("failed to render template: {err}")))
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config validate`.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = ContratoConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Resolution
// ============================================================================

/// Fully resolved inputs for a query.
#[derive(Debug)]
struct QueryInputs {
    /// Loaded configuration, when one was needed or requested.
    config: Option<ContratoConfig>,
    /// Universe directory.
    directory: PathBuf,
    /// Loader options.
    options: LoadOptions,
    /// Compiled blueprint.
    blueprint: Blueprint,
    /// Cap on yielded contexts.
    limit: Option<usize>,
}

/// Merges flags over the configuration file.
///
/// The configuration is loaded when explicitly requested or when the flags
/// do not name both a universe and a layout.
fn resolve_query_inputs(command: &QueryCommand) -> CliResult<QueryInputs> {
    let needs_config =
        command.config.is_some() || command.universe.is_none() || command.layout.is_none();
    let config = if needs_config {
        Some(
            ContratoConfig::load(command.config.as_deref())
                .map_err(|err| CliError::new(format!("failed to load config: {err}")))?,
        )
    } else {
        None
    };

    let directory = command
        .universe
        .clone()
        .or_else(|| config.as_ref().map(|config| config.universe.directory.clone()))
        .ok_or_else(|| CliError::new("no universe directory given".to_string()))?;
    let mut options = config.as_ref().map_or_else(LoadOptions::default, ContratoConfig::load_options);
    if command.canonical_only {
        options.canonical_only = true;
    }

    let layout = match &command.layout {
        Some(path) => read_json(path, "layout")?,
        None => config
            .as_ref()
            .and_then(|config| config.query.layout.clone())
            .ok_or_else(|| CliError::new("no layout given (use --layout or [query.layout])".to_string()))?,
    };
    let skeleton = match &command.skeleton {
        Some(path) => Some(read_json(path, "skeleton")?),
        None => config.as_ref().and_then(|config| config.query.skeleton.clone()),
    };
    let blueprint = Blueprint::new(layout, skeleton)
        .map_err(|err| CliError::new(format!("invalid blueprint: {err}")))?;

    let limit = command.limit.or_else(|| config.as_ref().and_then(|config| config.query.limit));
    if limit == Some(0) {
        return Err(CliError::new("limit must be positive".to_string()));
    }
    Ok(QueryInputs {
        config,
        directory,
        options,
        blueprint,
        limit,
    })
}

/// Loads the universe named by `inputs`.
async fn load(inputs: &QueryInputs) -> CliResult<Contract> {
    load_universe(&inputs.directory, &inputs.options)
        .await
        .map_err(|err| CliError::new(format!("failed to load universe: {err}")))
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

impl ReadLimitError {
    /// Formats the error for `kind` input at `path`.
    fn describe(&self, kind: &str, path: &Path) -> String {
        match self {
            Self::Io(err) => format!("failed to read {kind} {}: {err}", path.display()),
            Self::TooLarge {
                size,
                limit,
            } => format!("{kind} {} is too large ({size} > {limit} bytes)", path.display()),
        }
    }
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads a bounded JSON input.
fn read_json(path: &Path, kind: &str) -> CliResult<Value> {
    let bytes = read_bytes_with_limit(path, MAX_JSON_INPUT_BYTES)
        .map_err(|err| CliError::new(err.describe(kind, path)))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid {kind} json {}: {err}", path.display())))
}

/// Reads a bounded UTF-8 text input.
fn read_text(path: &Path, max_bytes: usize, kind: &str) -> CliResult<String> {
    let bytes = read_bytes_with_limit(path, max_bytes)
        .map_err(|err| CliError::new(err.describe(kind, path)))?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(format!("{kind} {} must be utf-8", path.display())))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a canonical JSON value to stdout as one line.
fn write_canonical_json(value: &Value) -> CliResult<()> {
    let mut bytes = canonical_json_bytes(value)
        .map_err(|err| CliError::new(format!("failed to serialize context: {err}")))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
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
