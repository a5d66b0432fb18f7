use std::io;

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::{Span, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::cli::control::{self, ControlAction};
use crate::cli::{CliCommand, FakeArgs, LogLevel, RunOptions, scan, timers};
use crate::hw::HardwareBackend;
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

const SERVICE_NAME: &str = "switchbot";

/// Selects the fake BLE backend configured by `fake_args`.
#[must_use]
pub fn fake_backend(fake_args: FakeArgs) -> HardwareBackend {
    HardwareBackend::Fake(fake_args.into_backend_config())
}

/// Runs the CLI command against `backend`.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = switchbot::Args::try_parse_from([
///     "switchbot",
///     "--fake",
///     "--fake-devices",
///     "AA:BB:CC:DD:EE:01|Bot|switchbot",
///     "--mac",
///     "AA:BB:CC:DD:EE:01",
///     "press",
/// ])?;
/// let (command, options, maybe_fake_args) = args.into_parts(switchbot::OutputFormat::Json)?;
/// let backend = match maybe_fake_args {
///     Some(fake_args) => switchbot::fake_backend(fake_args),
///     None => switchbot::HardwareBackend::Real,
/// };
/// let mut out = Vec::new();
/// switchbot::run(command, &options, &mut out, backend).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run<W>(
    command: CliCommand,
    options: &RunOptions,
    out: &mut W,
    backend: HardwareBackend,
) -> Result<()>
where
    W: io::Write,
{
    run_with_log_level(command, options, out, backend, None).await
}

/// Runs the CLI command with an explicit telemetry log-level override.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run_with_log_level<W>(
    command: CliCommand,
    options: &RunOptions,
    out: &mut W,
    backend: HardwareBackend,
    log_level: Option<LogLevel>,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients_and_log_level(
        command,
        options,
        out,
        &SystemTerminalClient,
        backend,
        log_level,
    )
    .await
}

/// Runs the CLI command with an injected terminal client.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run_with_clients<W>(
    command: CliCommand,
    options: &RunOptions,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    backend: HardwareBackend,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients_and_log_level(command, options, out, terminal_client, backend, None).await
}

/// Runs the CLI command with injected clients and explicit telemetry settings.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// struct FakeTerminal;
/// impl switchbot::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let args = switchbot::Args::try_parse_from([
///     "switchbot",
///     "--log-level",
///     "trace",
///     "--fake",
///     "--fake-devices",
///     "AA:BB:CC:DD:EE:01|Bot|switchbot",
///     "--mac",
///     "AA:BB:CC:DD:EE:01",
///     "settings",
/// ])?;
/// let log_level = args.log_level();
/// let (command, options, maybe_fake_args) = args.into_parts(switchbot::OutputFormat::Json)?;
/// let backend = match maybe_fake_args {
///     Some(fake_args) => switchbot::fake_backend(fake_args),
///     None => switchbot::HardwareBackend::Real,
/// };
/// let mut out = Vec::new();
/// switchbot::run_with_clients_and_log_level(
///     command,
///     &options,
///     &mut out,
///     &FakeTerminal,
///     backend,
///     log_level,
/// ).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run_with_clients_and_log_level<W>(
    command: CliCommand,
    options: &RunOptions,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    backend: HardwareBackend,
    log_level: Option<LogLevel>,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        SERVICE_NAME,
        terminal_client.stderr_is_terminal(),
        log_level.map(LogLevel::as_level_filter),
    )?;

    dispatch(command, options, out, terminal_client, backend).await
}

#[instrument(skip_all, level = "info", fields(command = command.name()))]
async fn dispatch<W>(
    command: CliCommand,
    options: &RunOptions,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    backend: HardwareBackend,
) -> Result<()>
where
    W: io::Write,
{
    let span = Span::current();
    span.pb_set_message(&progress_message(&command, options));

    let transport = backend.into_transport().await?;
    let result = match command {
        CliCommand::Scan(args) => {
            scan::run(&args, options, transport, out, terminal_client).await
        }
        CliCommand::Timers(args) => {
            timers::run(args, options, transport, out, terminal_client).await
        }
        CliCommand::Press => {
            control::run(ControlAction::Press, options, transport, out, terminal_client).await
        }
        CliCommand::Switch(args) => {
            control::run(args.into(), options, transport, out, terminal_client).await
        }
        CliCommand::Settings => {
            control::run(ControlAction::Settings, options, transport, out, terminal_client).await
        }
        CliCommand::HoldTime(args) => {
            control::run(args.into(), options, transport, out, terminal_client).await
        }
        CliCommand::Mode(args) => {
            control::run(args.into(), options, transport, out, terminal_client).await
        }
        CliCommand::SyncTime => {
            control::run(ControlAction::SyncTime, options, transport, out, terminal_client).await
        }
    };

    let finish_message = match &result {
        Ok(()) => format!("{} Done", "✓".green()),
        Err(_error) => format!("{} Failed", "✗".red()),
    };
    span.pb_set_finish_message(&finish_message);
    result
}

fn progress_message(command: &CliCommand, options: &RunOptions) -> String {
    match (command, options.mac()) {
        (CliCommand::Scan(_args), _) => "Scanning for Switchbots".to_string(),
        (_, Ok(mac)) => format!("Talking to {mac}"),
        (_, Err(_error)) => format!("Running {}", command.name()),
    }
}
