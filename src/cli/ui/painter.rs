use owo_colors::{OwoColorize, Style as OwoStyle};

const LOW_BATTERY_PERCENT: u8 = 20;

/// Applies colour and style to terminal text.
#[derive(Debug)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    /// Creates a painter with explicit colour control.
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().cyan())
    }

    pub(crate) fn success<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().green())
    }

    pub(crate) fn warning<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().yellow())
    }

    pub(crate) fn muted<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().dimmed())
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold())
    }

    /// Renders a boolean as `yes` (bold) or `no` (dimmed).
    pub(crate) fn yes_no(&self, value: bool) -> String {
        if value {
            self.value("yes")
        } else {
            self.muted("no")
        }
    }

    /// Renders a battery percentage, highlighting low charge.
    pub(crate) fn battery(&self, percent: u8) -> String {
        let text = format!("{percent}%");
        if percent < LOW_BATTERY_PERCENT {
            self.warning(text)
        } else {
            self.value(text)
        }
    }

    fn paint(&self, text: &str, style: OwoStyle) -> String {
        if self.use_colour {
            format!("{}", text.style(style))
        } else {
            text.to_string()
        }
    }
}
