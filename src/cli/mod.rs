pub(crate) mod command;
pub(crate) mod control;
pub(crate) mod scan;
pub(crate) mod timers;
pub(crate) mod ui;

pub use self::command::{Args, CliCommand, FakeArgs, LogLevel, OutputFormat, RunOptions};
pub use self::control::{HoldTimeArgs, ModeArgs, SwitchArgs, SwitchTarget};
pub use self::scan::ScanArgs;
pub use self::timers::{
    ClockTime, ClockTimeError, SetAllArgs, TimerIndexArgs, TimerSpecArgs, TimersAction, TimersArgs,
};
