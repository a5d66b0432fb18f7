use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::cli::control::{HoldTimeArgs, ModeArgs, SwitchArgs};
use crate::cli::scan::ScanArgs;
use crate::cli::timers::TimersArgs;
use crate::error::{CliConfigError, FixtureError};
use crate::hw::{DeviceFixture, FakeBackendConfig, MacAddress};
use crate::protocol::DEFAULT_RESPONSE_TIMEOUT;

/// Command-line options for the Switchbot BLE tool.
#[derive(Debug, Parser)]
#[command(name = "switchbot", about = "Control Switchbot BLE switches.")]
pub struct Args {
    /// Address of the target Switchbot (`AA:BB:CC:DD:EE:FF`).
    #[arg(long, global = true)]
    mac: Option<MacAddress>,
    /// Password configured on the device.
    #[arg(long, global = true)]
    password: Option<String>,
    /// How long each command waits for the device to answer (e.g. `500ms`, `5s`).
    #[arg(long, global = true, value_parser = parse_duration, default_value = "5s")]
    response_timeout: Duration,
    /// Overrides `RUST_LOG` for this tool's own log output.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format. Defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    /// Scan classification cache file.
    #[arg(long, global = true)]
    scan_cache: Option<PathBuf>,
    /// Uses the fake BLE backend with simulated peripherals.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake peripherals in the form `mac|name|switchbot|public|other;...`.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_devices: Option<DeviceFixture>,
    /// Password configured on every fake Switchbot.
    #[arg(long, global = true, requires = "fake")]
    fake_password: Option<String>,
    /// Status byte the fake devices answer every command with.
    #[arg(long, global = true, requires = "fake")]
    fake_status: Option<u8>,
    /// Fake devices never answer written frames.
    #[arg(long, global = true, requires = "fake")]
    fake_silent: bool,
    /// Artificial fake discovery delay (e.g. `250ms`, `2s`).
    #[arg(long, global = true, requires = "fake", value_parser = parse_duration)]
    fake_discovery_delay: Option<Duration>,
    #[command(subcommand)]
    command: CliCommand,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use switchbot::{Args, CliCommand};
    ///
    /// let args = Args::new(CliCommand::Press);
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(command: CliCommand) -> Self {
        Self {
            mac: None,
            password: None,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            log_level: None,
            output: None,
            scan_cache: None,
            fake: false,
            fake_devices: None,
            fake_password: None,
            fake_status: None,
            fake_silent: false,
            fake_discovery_delay: None,
            command,
        }
    }

    /// Targets one device.
    #[must_use]
    pub fn with_mac(mut self, mac: MacAddress) -> Self {
        self.mac = Some(mac);
        self
    }

    /// Enables fake backend mode with pre-parsed fake configuration.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            devices,
            password,
            status,
            silent,
            discovery_delay,
        } = fake;

        self.fake = true;
        self.fake_devices = Some(devices);
        self.fake_password = password;
        self.fake_status = status;
        self.fake_silent = silent;
        self.fake_discovery_delay = Some(discovery_delay);
        self
    }

    /// Returns the explicit log level, if any.
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    /// Returns the explicit output format, if any.
    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Splits parsed CLI arguments into command, run options and optional
    /// fake-backend settings.
    ///
    /// `default_output` applies when `--output` was not given.
    ///
    /// # Errors
    ///
    /// Returns an error if CLI backend configuration is invalid.
    pub fn into_parts(
        self,
        default_output: OutputFormat,
    ) -> anyhow::Result<(CliCommand, RunOptions, Option<FakeArgs>)> {
        let Args {
            mac,
            password,
            response_timeout,
            log_level: _,
            output,
            scan_cache,
            fake,
            fake_devices,
            fake_password,
            fake_status,
            fake_silent,
            fake_discovery_delay,
            command,
        } = self;

        let fake_args = if fake {
            let Some(devices) = fake_devices else {
                return Err(CliConfigError::MissingFakeDeviceFixture.into());
            };
            Some(FakeArgs {
                devices,
                password: fake_password,
                status: fake_status,
                silent: fake_silent,
                discovery_delay: fake_discovery_delay.unwrap_or(Duration::ZERO),
            })
        } else {
            None
        };

        let options = RunOptions {
            mac,
            password,
            response_timeout,
            output: output.unwrap_or(default_output),
            scan_cache,
        };

        Ok((command, options, fake_args))
    }
}

/// Settings shared by every command.
#[derive(Debug, Clone, Builder)]
pub struct RunOptions {
    mac: Option<MacAddress>,
    #[builder(into)]
    password: Option<String>,
    #[builder(default = DEFAULT_RESPONSE_TIMEOUT)]
    response_timeout: Duration,
    #[builder(default)]
    output: OutputFormat,
    scan_cache: Option<PathBuf>,
}

impl RunOptions {
    pub(crate) fn mac(&self) -> Result<MacAddress, CliConfigError> {
        self.mac.ok_or(CliConfigError::MissingMacAddress)
    }

    pub(crate) fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub(crate) fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub(crate) fn output(&self) -> OutputFormat {
        self.output
    }

    pub(crate) fn scan_cache(&self) -> Option<&std::path::Path> {
        self.scan_cache.as_deref()
    }
}

/// Fake backend arguments for programmatic runs.
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    devices: DeviceFixture,
    #[builder(into)]
    password: Option<String>,
    status: Option<u8>,
    #[builder(default)]
    silent: bool,
    #[builder(default)]
    discovery_delay: Duration,
}

impl FakeArgs {
    pub(crate) fn into_backend_config(self) -> FakeBackendConfig {
        let Self {
            devices,
            password,
            status,
            silent,
            discovery_delay,
        } = self;

        FakeBackendConfig::builder()
            .devices(devices)
            .maybe_password(password)
            .maybe_forced_status(status)
            .silent(silent)
            .discovery_delay(discovery_delay)
            .build()
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Converts to the `tracing` filter level.
    #[must_use]
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Coloured tables for people.
    #[default]
    Pretty,
    /// One JSON document per command.
    Json,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Discover nearby peripherals and report which are Switchbots.
    Scan(ScanArgs),
    /// Extend, hold and retract the arm.
    Press,
    /// Turn a dual-state Switchbot on or off.
    Switch(SwitchArgs),
    /// Read battery, firmware, timer count, mode and hold time.
    Settings,
    /// Set how long the arm stays extended on a press (0..=60 seconds).
    HoldTime(HoldTimeArgs),
    /// Change the device mode. Clears every timer first.
    Mode(ModeArgs),
    /// Set the device clock to the local time of this host.
    SyncTime,
    /// Read or write the on-device timers.
    Timers(TimersArgs),
}

impl CliCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Scan(_args) => "scan",
            Self::Press => "press",
            Self::Switch(_args) => "switch",
            Self::Settings => "settings",
            Self::HoldTime(_args) => "hold-time",
            Self::Mode(_args) => "mode",
            Self::SyncTime => "sync-time",
            Self::Timers(_args) => "timers",
        }
    }
}

pub(crate) fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
