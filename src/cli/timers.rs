use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::cli::control::bot_for;
use crate::cli::{OutputFormat, RunOptions};
use crate::error::InvalidInputError;
use crate::handlers::{Action, IntervalTimer, StandardTimer, Timer, Weekdays};
use crate::hw::BleTransport;
use crate::terminal::TerminalClient;

use super::ui::{Painter, TimersView};

/// JSON result emitted by a timer write.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum TimersResult {
    Add { timer: Timer },
    SetAll { count: usize, clock_synced: bool },
    Remove { index: u8, timer: Timer },
    Clear,
}

impl TimersResult {
    fn summary(&self) -> String {
        match self {
            Self::Add { timer } => format!("Added {} timer", timer.mode()),
            Self::SetAll {
                count,
                clock_synced: true,
            } => format!("Wrote {count} timer(s) and synchronised the clock"),
            Self::SetAll { count, .. } => format!("Wrote {count} timer(s)"),
            Self::Remove { index, .. } => format!("Removed timer {index}"),
            Self::Clear => "Cleared every timer".to_string(),
        }
    }
}

/// Arguments for the `timers` command.
#[derive(Debug, Args)]
pub struct TimersArgs {
    #[command(subcommand)]
    action: TimersAction,
}

impl TimersArgs {
    /// Creates timer arguments for one action.
    ///
    /// ```
    /// use switchbot::{TimersAction, TimersArgs};
    ///
    /// let args = TimersArgs::new(TimersAction::List);
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(action: TimersAction) -> Self {
        Self { action }
    }
}

/// Action performed by the `timers` command.
#[derive(Debug, Subcommand)]
pub enum TimersAction {
    /// List configured timers, in slot order.
    List,
    /// Read one raw timer slot (0..5).
    Get(TimerIndexArgs),
    /// Append one timer to the schedule.
    Add(TimerSpecArgs),
    /// Replace the schedule with the timers in a JSON file.
    ///
    /// The file holds the array printed by `timers list --output json`.
    SetAll(SetAllArgs),
    /// Remove one timer. Later timers move down one slot.
    Remove(TimerIndexArgs),
    /// Delete every timer.
    Clear,
}

/// Arguments selecting one timer slot.
#[derive(Debug, Args)]
pub struct TimerIndexArgs {
    index: u8,
}

impl TimerIndexArgs {
    #[must_use]
    pub fn new(index: u8) -> Self {
        Self { index }
    }
}

/// Arguments describing one timer.
#[derive(Debug, Args)]
pub struct TimerSpecArgs {
    /// Time of day as `HH:MM`.
    #[arg(long)]
    at: ClockTime,
    /// What the timer does.
    #[arg(long, default_value = "press")]
    action: Action,
    /// ISO weekdays (1 = Monday .. 7 = Sunday), comma separated. Empty fires once.
    #[arg(long, value_delimiter = ',', conflicts_with = "repeat")]
    days: Vec<u8>,
    /// Creates an interval timer with this repeat count instead.
    #[arg(long)]
    repeat: Option<u8>,
    /// Stores the timer disabled.
    #[arg(long)]
    disabled: bool,
}

impl TimerSpecArgs {
    /// Creates a standard-timer specification.
    #[must_use]
    pub fn standard(at: ClockTime, action: Action, days: Vec<u8>) -> Self {
        Self {
            at,
            action,
            days,
            repeat: None,
            disabled: false,
        }
    }

    fn into_timer(self) -> Result<Timer, InvalidInputError> {
        let Self {
            at,
            action,
            days,
            repeat,
            disabled,
        } = self;
        let enabled = !disabled;

        Ok(match repeat {
            Some(timer_sum) => {
                IntervalTimer::new(enabled, action, timer_sum, at.hour, at.minute).into()
            }
            None => {
                StandardTimer::new(enabled, Weekdays::from_iso(days)?, at.hour, at.minute, action)?
                    .into()
            }
        })
    }
}

/// Arguments for `timers set-all`.
#[derive(Debug, Args)]
pub struct SetAllArgs {
    /// JSON file holding an array of timers.
    file: PathBuf,
    /// Synchronise the device clock in the same connection first.
    #[arg(long)]
    sync_clock: bool,
}

impl SetAllArgs {
    #[must_use]
    pub fn new(file: PathBuf, sync_clock: bool) -> Self {
        Self { file, sync_clock }
    }
}

/// A wall-clock time of day.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

/// Errors returned when parsing `HH:MM` values.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("expected a time of day as HH:MM, got `{value}`")]
pub struct ClockTimeError {
    value: String,
}

impl FromStr for ClockTime {
    type Err = ClockTimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ClockTimeError {
            value: value.to_string(),
        };
        let (hour, minute) = value.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            hour: hour.parse().map_err(|_error| invalid())?,
            minute: minute.parse().map_err(|_error| invalid())?,
        })
    }
}

/// Executes the `timers` command.
#[instrument(skip(options, transport, out, terminal_client), level = "debug")]
pub(crate) async fn run<W>(
    args: TimersArgs,
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

    let result = match args.action {
        TimersAction::List => {
            let timers = bot.get_timers().await?;
            match options.output() {
                OutputFormat::Pretty => {
                    let rows = timers.iter().enumerate().map(|(index, timer)| (index, *timer));
                    writeln!(out, "{}", TimersView::new(rows, &painter))?;
                }
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut *out, &timers)?;
                    writeln!(out)?;
                }
            }
            return Ok(());
        }
        TimersAction::Get(TimerIndexArgs { index }) => {
            let decoded = bot.get_timer(index).await?;
            match options.output() {
                OutputFormat::Pretty => {
                    let rows = decoded.timer.map(|timer| (usize::from(index), timer));
                    writeln!(out, "{}", TimersView::new(rows, &painter))?;
                    writeln!(
                        out,
                        "{} {}",
                        painter.muted("timers configured:"),
                        painter.value(decoded.num_timer.to_string())
                    )?;
                }
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut *out, &decoded)?;
                    writeln!(out)?;
                }
            }
            return Ok(());
        }
        TimersAction::Add(spec) => {
            let timer = spec.into_timer()?;
            bot.add_timer(timer).await?;
            TimersResult::Add { timer }
        }
        TimersAction::SetAll(SetAllArgs { file, sync_clock }) => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("failed to read timers from {}", file.display()))?;
            let timers: Vec<Timer> = serde_json::from_str(&contents)
                .with_context(|| format!("invalid timers in {}", file.display()))?;
            if sync_clock {
                bot.set_timers_with_clock(&timers).await?;
            } else {
                bot.set_timers(&timers).await?;
            }
            TimersResult::SetAll {
                count: timers.len(),
                clock_synced: sync_clock,
            }
        }
        TimersAction::Remove(TimerIndexArgs { index }) => {
            let timer = bot.remove_timer(index).await?;
            TimersResult::Remove { index, timer }
        }
        TimersAction::Clear => {
            bot.set_timers(&[]).await?;
            TimersResult::Clear
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

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("07:30", 7, 30)]
    #[case("0:05", 0, 5)]
    fn clock_time_parses(#[case] value: &str, #[case] hour: u8, #[case] minute: u8) {
        assert_eq!(Ok(ClockTime { hour, minute }), value.parse());
    }

    #[rstest]
    #[case("0730")]
    #[case("7:xx")]
    #[case("300:00")]
    fn clock_time_rejects_malformed_values(#[case] value: &str) {
        assert!(value.parse::<ClockTime>().is_err());
    }

    #[test]
    fn timer_args_build_standard_timer() {
        let spec = TimerSpecArgs::standard(
            ClockTime {
                hour: 6,
                minute: 45,
            },
            Action::TurnOn,
            vec![1, 2],
        );

        let timer = spec.into_timer().expect("valid timer arguments");
        assert_eq!(
            Timer::Standard(
                StandardTimer::new(
                    true,
                    Weekdays::from_iso([1, 2]).expect("valid weekdays"),
                    6,
                    45,
                    Action::TurnOn
                )
                .expect("valid timer")
            ),
            timer
        );
    }

    #[test]
    fn timer_args_with_repeat_build_interval_timer() {
        let spec = TimerSpecArgs {
            repeat: Some(4),
            disabled: true,
            ..TimerSpecArgs::standard(ClockTime { hour: 1, minute: 0 }, Action::Press, Vec::new())
        };

        assert_eq!(
            Timer::Interval(IntervalTimer::new(false, Action::Press, 4, 1, 0)),
            spec.into_timer().expect("valid timer arguments")
        );
    }

    #[test]
    fn timer_args_reject_out_of_range_time() {
        let spec = TimerSpecArgs::standard(
            ClockTime {
                hour: 24,
                minute: 0,
            },
            Action::Press,
            Vec::new(),
        );

        assert_matches!(
            spec.into_timer(),
            Err(InvalidInputError::HourOutOfRange { value: 24 })
        );
    }
}
