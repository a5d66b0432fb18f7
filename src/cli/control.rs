use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::instrument;

use crate::bot::Bot;
use crate::cli::{OutputFormat, RunOptions};
use crate::hw::BleTransport;
use crate::terminal::TerminalClient;

use super::ui::{Painter, SettingsView};

/// JSON result emitted by a device command.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ControlResult {
    Press,
    Switch { state: SwitchTarget },
    HoldTime { seconds: i64 },
    Mode { dual_state: bool, inverse: bool },
    SyncTime,
}

impl ControlResult {
    fn summary(&self) -> String {
        match self {
            Self::Press => "Pressed".to_string(),
            Self::Switch { state } => format!("Switched {state}"),
            Self::HoldTime { seconds } => format!("Hold time set to {seconds}s"),
            Self::Mode {
                dual_state,
                inverse,
            } => format!("Mode set (dual_state={dual_state}, inverse={inverse})"),
            Self::SyncTime => "Clock synchronised".to_string(),
        }
    }
}

/// Arguments for `switch`.
#[derive(Debug, Args)]
pub struct SwitchArgs {
    #[arg(value_enum)]
    state: SwitchTarget,
}

impl SwitchArgs {
    /// Creates switch arguments.
    ///
    /// ```
    /// use switchbot::{SwitchArgs, SwitchTarget};
    ///
    /// let args = SwitchArgs::new(SwitchTarget::On);
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(state: SwitchTarget) -> Self {
        Self { state }
    }
}

/// Requested switch state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, ValueEnum, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum SwitchTarget {
    #[display("on")]
    On,
    #[display("off")]
    Off,
}

/// Arguments for `hold-time`.
#[derive(Debug, Args)]
pub struct HoldTimeArgs {
    /// Seconds the arm stays extended (0..=60).
    #[arg(allow_negative_numbers = true)]
    seconds: i64,
}

impl HoldTimeArgs {
    /// Creates hold-time arguments. Range checks happen when the command runs.
    #[must_use]
    pub fn new(seconds: i64) -> Self {
        Self { seconds }
    }
}

/// Arguments for `mode`.
#[derive(Debug, Args)]
pub struct ModeArgs {
    /// Stay extended after `switch on` instead of retracting.
    #[arg(long)]
    dual_state: bool,
    /// Reverse the arm direction.
    #[arg(long)]
    inverse: bool,
}

impl ModeArgs {
    /// Creates mode arguments.
    #[must_use]
    pub fn new(dual_state: bool, inverse: bool) -> Self {
        Self {
            dual_state,
            inverse,
        }
    }
}

/// Device command executed by [`run`].
#[derive(Debug)]
pub(crate) enum ControlAction {
    Press,
    Switch(SwitchTarget),
    HoldTime(i64),
    Mode { dual_state: bool, inverse: bool },
    SyncTime,
    Settings,
}

impl From<SwitchArgs> for ControlAction {
    fn from(args: SwitchArgs) -> Self {
        Self::Switch(args.state)
    }
}

impl From<HoldTimeArgs> for ControlAction {
    fn from(args: HoldTimeArgs) -> Self {
        Self::HoldTime(args.seconds)
    }
}

impl From<ModeArgs> for ControlAction {
    fn from(args: ModeArgs) -> Self {
        Self::Mode {
            dual_state: args.dual_state,
            inverse: args.inverse,
        }
    }
}

pub(crate) fn bot_for(options: &RunOptions, transport: Arc<dyn BleTransport>) -> Result<Bot> {
    let mac = options.mac()?;
    let bot = Bot::from_address(0, mac, mac.to_string(), transport)
        .with_response_timeout(options.response_timeout());
    Ok(match options.password() {
        Some(password) => bot.encrypted(password),
        None => bot,
    })
}

/// Executes one device command.
#[instrument(skip(options, transport, out, terminal_client), level = "debug")]
pub(crate) async fn run<W>(
    action: ControlAction,
    options: &RunOptions,
    transport: Arc<dyn BleTransport>,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<()>
where
    W: io::Write,
{
    let mut bot = bot_for(options, transport)?;
    let painter = Painter::new(terminal_client.stdout_is_terminal());

    let result = match action {
        ControlAction::Press => {
            bot.press().await?;
            ControlResult::Press
        }
        ControlAction::Switch(state) => {
            bot.switch(state == SwitchTarget::On).await?;
            ControlResult::Switch { state }
        }
        ControlAction::HoldTime(seconds) => {
            bot.set_hold_time(seconds).await?;
            ControlResult::HoldTime { seconds }
        }
        ControlAction::Mode {
            dual_state,
            inverse,
        } => {
            bot.set_mode(dual_state, inverse).await?;
            ControlResult::Mode {
                dual_state,
                inverse,
            }
        }
        ControlAction::SyncTime => {
            bot.set_current_timestamp().await?;
            ControlResult::SyncTime
        }
        ControlAction::Settings => {
            let settings = bot.get_settings().await?;
            match options.output() {
                OutputFormat::Pretty => {
                    writeln!(out, "{}", SettingsView::new(bot.mac(), &settings, &painter))?;
                }
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut *out, &settings)?;
                    writeln!(out)?;
                }
            }
            return Ok(());
        }
    };

    match options.output() {
        OutputFormat::Pretty => {
            writeln!(
                out,
                "{} {} {}",
                painter.success("✓"),
                result.summary(),
                painter.muted(format!("({})", bot.mac()))
            )?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &result)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
