use std::fmt::{self, Display, Formatter};

use crate::handlers::Settings;
use crate::hw::MacAddress;

use super::painter::Painter;
use super::table::Table;

/// Renders a settings snapshot as a key-value table.
pub(crate) struct SettingsView<'a> {
    mac: MacAddress,
    settings: &'a Settings,
    painter: &'a Painter,
}

impl<'a> SettingsView<'a> {
    pub(crate) fn new(mac: MacAddress, settings: &'a Settings, painter: &'a Painter) -> Self {
        Self {
            mac,
            settings,
            painter,
        }
    }
}

impl Display for SettingsView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let table = Table::key_value(
            self.painter,
            vec![
                ("battery", self.painter.battery(self.settings.battery)),
                (
                    "firmware",
                    self.painter.value(self.settings.firmware.to_string()),
                ),
                (
                    "timers",
                    self.painter.value(self.settings.timer_count.to_string()),
                ),
                ("dual_state", self.painter.yes_no(self.settings.dual_state_mode)),
                ("inverse", self.painter.yes_no(self.settings.inverse_direction)),
                (
                    "hold_time",
                    self.painter.value(format!("{}s", self.settings.hold_seconds)),
                ),
            ],
        );

        write!(
            f,
            "{}",
            self.painter.heading(format!("Settings for {}:", self.mac))
        )?;
        write!(f, "\n{table}")
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::handlers::SettingsHandler;

    #[test]
    fn settings_view_renders_every_field() {
        let settings = SettingsHandler::parse(&[
            0x01, 0x57, 0x2D, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x10, 0x0A,
        ])
        .expect("valid settings payload");
        let mac = MacAddress::parse("E4:F0:2B:0A:11:9C").expect("valid test address");
        let painter = Painter::new(false);

        assert_snapshot!(SettingsView::new(mac, &settings, &painter).to_string(), @r"
        Settings for E4:F0:2B:0A:11:9C:
        ╭────────────┬───────╮
        │ field      │ value │
        ├────────────┼───────┤
        │ battery    │ 87%   │
        │ firmware   │ 4.5   │
        │ timers     │ 2     │
        │ dual_state │ yes   │
        │ inverse    │ no    │
        │ hold_time  │ 10s   │
        ╰────────────┴───────╯
        ");
    }
}
