use std::fmt::{self, Display, Formatter};

use crate::handlers::{Timer, Weekdays};

use super::painter::Painter;
use super::table::Table;

/// Renders timers as a table keyed by slot.
pub(crate) struct TimersView<'a> {
    rows: Vec<(usize, Timer)>,
    painter: &'a Painter,
}

impl<'a> TimersView<'a> {
    pub(crate) fn new(rows: impl IntoIterator<Item = (usize, Timer)>, painter: &'a Painter) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            painter,
        }
    }
}

impl Display for TimersView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return write!(f, "{}", self.painter.warning("No timers configured."));
        }

        let rows = self
            .rows
            .iter()
            .map(|(slot, timer)| {
                let enabled = if timer.enabled() {
                    self.painter.success("yes")
                } else {
                    self.painter.muted("no")
                };
                vec![
                    slot.to_string(),
                    timer.mode().to_string(),
                    enabled,
                    self.painter.value(timer.action().to_string()),
                    schedule(timer),
                ]
            })
            .collect();
        let table = Table::grid(["slot", "mode", "enabled", "action", "schedule"], rows);
        write!(f, "{table}")
    }
}

fn schedule(timer: &Timer) -> String {
    match timer {
        Timer::Standard(timer) => format!(
            "{:02}:{:02} {}",
            timer.hour(),
            timer.minute(),
            weekday_names(timer.weekdays())
        ),
        Timer::Interval(timer) => format!(
            "{:02}:{:02} sum {}",
            timer.hour(),
            timer.minute(),
            timer.timer_sum()
        ),
    }
}

fn weekday_names(weekdays: Weekdays) -> String {
    if weekdays.is_empty() {
        return "once".to_string();
    }
    weekdays
        .iter()
        .map(|weekday| weekday.to_string().chars().take(3).collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
}
