use std::time::Duration;

use derive_more::From;
use thiserror::Error;

use crate::handlers::{SettingsDecodeError, TimerCodecError};
use crate::hw::AddressType;
use crate::protocol::{EndpointId, endpoint_metadata};
use crate::status::{ActionStatus, StatusDecodeError};

/// Errors raised by the BLE transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("peripheral `{mac}` was not seen within {timeout:?} of scanning")]
    PeripheralNotFound { mac: String, timeout: Duration },
    #[error("peripheral `{mac}` refused a connection using {address_type} addressing")]
    ConnectionRefused {
        mac: String,
        address_type: AddressType,
    },
    #[error(
        "required endpoint `{name}` ({uuid}) was not found on the connected device",
        name = endpoint_metadata(*endpoint).name(),
        uuid = endpoint_metadata(*endpoint).uuid()
    )]
    MissingEndpoint { endpoint: EndpointId },
    #[error("no writable characteristic is bound to handle {handle:#06x}")]
    UnknownHandle { handle: u16 },
    #[error("characteristic `{uuid}` is not present on the connected device")]
    UnknownCharacteristic { uuid: String },
    #[error("command frames cannot be written before notifications are subscribed")]
    NotSubscribed,
    #[error("the notification channel closed before a response arrived")]
    NotificationChannelClosed,
    #[error("no notification arrived within {timeout:?}")]
    ResponseTimeout { timeout: Duration },
    #[error("the connection to `{mac}` was already closed")]
    Disconnected { mac: String },
}

/// Errors raised when caller input is rejected before any transport activity.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum InvalidInputError {
    #[error("illegal MAC address `{value}`")]
    InvalidMacAddress { value: String },
    #[error("hold time {value}s is out of range ({min}..={max})")]
    HoldTimeOutOfRange { value: i64, min: i64, max: i64 },
    #[error("timer index {index} is out of range (0..{max})")]
    TimerIndexOutOfRange { index: u8, max: u8 },
    #[error("timer index {index} must be lower than the timer count {num_timer} (at most {max})")]
    TimerSlotOutOfRange { index: u8, num_timer: u8, max: u8 },
    #[error("at most {max} timers are supported, got {count}")]
    TooManyTimers { count: usize, max: u8 },
    #[error("weekday {value} is not an ISO weekday (1..=7)")]
    WeekdayOutOfRange { value: u8 },
    #[error("hour {value} is out of range (0..=23)")]
    HourOutOfRange { value: u8 },
    #[error("minute {value} is out of range (0..=59)")]
    MinuteOutOfRange { value: u8 },
    #[error("interval mode tag {value} must be a non-zero nibble (1..=15)")]
    IntervalModeOutOfRange { value: u8 },
}

/// Errors returned when parsing fake backend fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake device fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain three pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain empty fields")]
    EmptyRecordField,
    #[error("unknown fake device kind `{value}`; expected switchbot, public or other")]
    UnknownDeviceKind { value: String },
    #[error("invalid fake device address")]
    InvalidAddress(#[from] InvalidInputError),
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing fake device fixture while fake mode is enabled")]
    MissingFakeDeviceFixture,
    #[error("`--mac` is required for this command")]
    MissingMacAddress,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Errors returned while reading or writing the scan classification cache.
#[derive(Debug, Error)]
pub enum ScanCacheError {
    #[error("failed while reading or writing the scan cache")]
    Io(#[from] std::io::Error),
    #[error("invalid scan cache record `{record}`")]
    InvalidRecord { record: String },
}

/// Coarse classification of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum ErrorKind {
    /// The request was rejected before touching the transport.
    #[display("invalid_input")]
    InvalidInput,
    /// Connecting, subscribing, writing or waiting for a notification failed.
    #[display("transport_failure")]
    TransportFailure,
    /// The device answered with a status other than `complete`.
    #[display("protocol_status")]
    ProtocolStatus,
    /// The device answered with bytes this protocol version cannot decode.
    #[display("decode_failure")]
    DecodeFailure,
}

/// Errors returned by Switchbot operations.
#[derive(Debug, Error, From)]
pub enum ProtocolError {
    #[error(transparent)]
    #[from(InvalidInputError, Box<InvalidInputError>)]
    InvalidInput(Box<InvalidInputError>),
    #[error("communication with ble device failed")]
    #[from(TransportError, Box<TransportError>)]
    Communication(#[source] Box<TransportError>),
    #[error("{}", status.message())]
    #[from(skip)]
    Status { status: ActionStatus },
    #[error(transparent)]
    #[from(StatusDecodeError, Box<StatusDecodeError>)]
    StatusDecode(Box<StatusDecodeError>),
    #[error(transparent)]
    #[from(TimerCodecError, Box<TimerCodecError>)]
    TimerCodec(Box<TimerCodecError>),
    #[error(transparent)]
    #[from(SettingsDecodeError, Box<SettingsDecodeError>)]
    SettingsDecode(Box<SettingsDecodeError>),
}

impl ProtocolError {
    /// Returns the error kind used to decide how a caller should react.
    ///
    /// ```
    /// use switchbot::{ErrorKind, InvalidInputError, ProtocolError};
    ///
    /// let error = ProtocolError::from(InvalidInputError::HourOutOfRange { value: 24 });
    /// assert_eq!(ErrorKind::InvalidInput, error.kind());
    /// ```
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Communication(_) => ErrorKind::TransportFailure,
            Self::Status { .. } => ErrorKind::ProtocolStatus,
            Self::StatusDecode(_) | Self::TimerCodec(_) | Self::SettingsDecode(_) => {
                ErrorKind::DecodeFailure
            }
        }
    }

    /// Returns the device status carried by a [`ProtocolError::Status`] error.
    #[must_use]
    pub fn action_status(&self) -> Option<ActionStatus> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// Returns whether the device rejected the configured password.
    #[must_use]
    pub fn is_wrong_password(&self) -> bool {
        self.action_status() == Some(ActionStatus::WrongPassword)
    }
}
