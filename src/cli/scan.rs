use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::{instrument, warn};

use crate::cli::command::parse_duration;
use crate::cli::{OutputFormat, RunOptions};
use crate::hw::{BleTransport, ScanCache};
use crate::scanner::{DEFAULT_SCAN_DURATION, Scanner};
use crate::terminal::TerminalClient;

use super::ui::{Painter, ScanView};

/// Arguments for `scan`.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Discovery window (e.g. `3s`).
    #[arg(long, value_parser = parse_duration)]
    duration: Option<Duration>,
    /// Probes every peripheral again instead of trusting cached classifications.
    #[arg(long)]
    refresh: bool,
}

impl ScanArgs {
    /// Creates scan arguments.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use switchbot::ScanArgs;
    ///
    /// let args = ScanArgs::new(Some(Duration::from_secs(2)), false);
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(duration: Option<Duration>, refresh: bool) -> Self {
        Self { duration, refresh }
    }
}

/// Executes the `scan` command.
#[instrument(skip(options, transport, out, terminal_client), level = "debug")]
pub(crate) async fn run<W>(
    args: &ScanArgs,
    options: &RunOptions,
    transport: Arc<dyn BleTransport>,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<()>
where
    W: io::Write,
{
    let mut cache = ScanCache::load(options.scan_cache())?;
    let empty = HashMap::new();
    let known = if args.refresh { &empty } else { cache.known() };

    let scanner =
        Scanner::new(transport).with_duration(args.duration.unwrap_or(DEFAULT_SCAN_DURATION));
    let classifications = scanner.classify(known).await?;

    cache.extend(
        classifications
            .iter()
            .map(|classification| (classification.mac, classification.is_switchbot)),
    );
    if let Err(error) = cache.save() {
        warn!(%error, "failed to persist scan cache");
    }

    match options.output() {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", ScanView::new(&classifications, &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &classifications)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
