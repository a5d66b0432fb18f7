mod painter;
mod scan_view;
mod settings_view;
mod table;
mod timers_view;

pub(crate) use self::painter::Painter;
pub(crate) use self::scan_view::ScanView;
pub(crate) use self::settings_view::SettingsView;
pub(crate) use self::timers_view::TimersView;
