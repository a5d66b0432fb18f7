mod auth;
mod command_codec;
mod settings;
mod time_sync;
mod timer_codec;

pub use self::auth::PasswordToken;
pub use self::command_codec::{Command, CommandEncoder, SwitchState};
pub use self::settings::{
    BotMode, FirmwareVersion, HoldTime, Settings, SettingsDecodeError, SettingsHandler,
};
pub use self::time_sync::TimeSyncHandler;
pub use self::timer_codec::{
    Action, DecodedTimer, IntervalTimer, StandardTimer, Timer, TimerCodec, TimerCodecError,
    TimerIndex, TimerMode, TimerSlot, Weekdays,
};
