mod app;
mod bot;
mod cli;
mod error;
mod handlers;
mod hw;
mod protocol;
mod scanner;
mod status;
mod telemetry;
mod terminal;
mod utils;

pub use app::{
    fake_backend, run, run_with_clients, run_with_clients_and_log_level, run_with_log_level,
};
pub use bot::Bot;
pub use cli::{
    Args, CliCommand, ClockTime, ClockTimeError, FakeArgs, HoldTimeArgs, LogLevel, ModeArgs,
    OutputFormat, RunOptions, ScanArgs, SetAllArgs, SwitchArgs, SwitchTarget, TimerIndexArgs,
    TimerSpecArgs, TimersAction, TimersArgs,
};
pub use error::{
    ErrorKind, FixtureError, InvalidInputError, ProtocolError, ScanCacheError, TransportError,
};
pub use handlers::{
    Action, BotMode, Command, CommandEncoder, DecodedTimer, FirmwareVersion, HoldTime,
    IntervalTimer, PasswordToken, Settings, SettingsDecodeError, SettingsHandler, StandardTimer,
    SwitchState, TimeSyncHandler, Timer, TimerCodec, TimerCodecError, TimerIndex, TimerMode,
    TimerSlot, Weekdays,
};
pub use hw::{
    AddressType, BleTransport, DeviceFixture, FakeBackend, FakeBackendConfig, FakeBotSnapshot,
    FakeDeviceKind, FakeDeviceRecord, FakeEvent, FoundDevice, GattConnection, HardwareBackend,
    MacAddress, Notification, ScanCache,
};
pub use protocol::{
    CONTROL_HANDLE, DEFAULT_RESPONSE_TIMEOUT, EndpointId, TIMER_PAYLOAD_LEN, TIMER_SLOT_COUNT,
};
pub use scanner::{Classification, DEFAULT_SCAN_DURATION, Scanner};
pub use status::{ActionStatus, NotificationHandler, StatusDecodeError};
pub use terminal::{SystemTerminalClient, TerminalClient};
