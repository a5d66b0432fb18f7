use std::fmt::{self, Display, Formatter};

use crate::scanner::Classification;
use crate::utils::format_rssi;

use super::painter::Painter;
use super::table::Table;

/// Renders scan classifications as a table, Switchbots highlighted.
pub(crate) struct ScanView<'a> {
    classifications: &'a [Classification],
    painter: &'a Painter,
}

impl<'a> ScanView<'a> {
    pub(crate) fn new(classifications: &'a [Classification], painter: &'a Painter) -> Self {
        Self {
            classifications,
            painter,
        }
    }
}

impl Display for ScanView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let switchbots = self
            .classifications
            .iter()
            .filter(|classification| classification.is_switchbot)
            .count();
        write!(
            f,
            "{}",
            self.painter.heading(format!(
                "{switchbots} Switchbot(s) among {} peripheral(s):",
                self.classifications.len()
            ))
        )?;
        if self.classifications.is_empty() {
            return Ok(());
        }

        let rows = self
            .classifications
            .iter()
            .map(|classification| {
                let switchbot = if classification.is_switchbot {
                    self.painter.success("yes")
                } else {
                    self.painter.muted("no")
                };
                let source = if classification.cached {
                    "cache"
                } else {
                    "probe"
                };
                vec![
                    self.painter.value(classification.mac.to_string()),
                    classification
                        .name
                        .clone()
                        .unwrap_or_else(|| "<unknown>".to_string()),
                    format_rssi(classification.rssi),
                    switchbot,
                    self.painter.muted(source),
                ]
            })
            .collect();
        let table = Table::grid(["mac", "name", "rssi", "switchbot", "source"], rows);
        write!(f, "\n{table}")
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hw::MacAddress;

    fn classification(mac: &str, name: Option<&str>, is_switchbot: bool) -> Classification {
        Classification {
            mac: MacAddress::parse(mac).expect("valid test address"),
            name: name.map(String::from),
            rssi: Some(-58),
            is_switchbot,
            cached: !is_switchbot,
        }
    }

    #[test]
    fn scan_view_lists_every_peripheral() {
        let classifications = vec![
            classification("AA:BB:CC:DD:EE:01", Some("WoHand"), true),
            classification("AA:BB:CC:DD:EE:02", None, false),
        ];
        let painter = Painter::new(false);

        assert_snapshot!(ScanView::new(&classifications, &painter).to_string(), @r"
        1 Switchbot(s) among 2 peripheral(s):
        ╭───────────────────┬───────────┬─────────┬───────────┬────────╮
        │ mac               │ name      │ rssi    │ switchbot │ source │
        ├───────────────────┼───────────┼─────────┼───────────┼────────┤
        │ AA:BB:CC:DD:EE:01 │ WoHand    │ -58 dBm │ yes       │ probe  │
        │ AA:BB:CC:DD:EE:02 │ <unknown> │ -58 dBm │ no        │ cache  │
        ╰───────────────────┴───────────┴─────────┴───────────┴────────╯
        ");
    }

    #[test]
    fn scan_view_without_peripherals_prints_only_heading() {
        let painter = Painter::new(false);
        assert_eq!(
            "0 Switchbot(s) among 0 peripheral(s):",
            ScanView::new(&[], &painter).to_string()
        );
    }
}
