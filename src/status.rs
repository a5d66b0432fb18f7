use std::collections::HashMap;
use std::sync::LazyLock;

use serde_with::SerializeDisplay;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use thiserror::Error;
use tracing::instrument;

use crate::error::ProtocolError;

/// Status codes carried in the first byte of every Switchbot response.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, SerializeDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum ActionStatus {
    /// The command completed.
    Complete,
    /// The device is busy with another action.
    DeviceBusy,
    /// The device could not be reached.
    DeviceUnreachable,
    /// A password is configured on the device but the command carried none.
    DeviceEncrypted,
    /// The command carried a password but the device has none configured.
    DeviceUnencrypted,
    /// The command carried a password that does not match.
    WrongPassword,
    /// The device did not respond.
    UnableToRespond,
    /// The device could not connect.
    UnableToConnect,
}

impl ActionStatus {
    /// Returns the raw status byte.
    ///
    /// ```
    /// use switchbot::ActionStatus;
    ///
    /// assert_eq!(9, ActionStatus::WrongPassword.code());
    /// ```
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Complete => 1,
            Self::DeviceBusy => 3,
            Self::DeviceEncrypted => 7,
            Self::DeviceUnencrypted => 8,
            Self::WrongPassword => 9,
            Self::DeviceUnreachable => 11,
            Self::UnableToRespond => 254,
            Self::UnableToConnect => 255,
        }
    }

    /// Returns the human-readable message for this status.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Complete => "action complete",
            Self::DeviceBusy => "switchbot is busy",
            Self::DeviceUnreachable => "switchbot is unreachable",
            Self::DeviceEncrypted => "switchbot is encrypted",
            Self::DeviceUnencrypted => "switchbot is unencrypted",
            Self::WrongPassword => "switchbot password is wrong",
            Self::UnableToRespond => "switchbot does not respond",
            Self::UnableToConnect => "switchbot unable to connect",
        }
    }

    /// Looks up a status by its raw byte.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        STATUS_BY_CODE.get(&code).copied()
    }
}

impl TryFrom<u8> for ActionStatus {
    type Error = StatusDecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or(StatusDecodeError::UnknownStatus { value })
    }
}

static STATUS_BY_CODE: LazyLock<HashMap<u8, ActionStatus>> = LazyLock::new(|| {
    ActionStatus::iter()
        .map(|status| (status.code(), status))
        .collect()
});

/// Errors returned while decoding the status byte of a notification.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum StatusDecodeError {
    #[error("notification payload was empty")]
    EmptyPayload,
    #[error("unknown action status byte {value}")]
    UnknownStatus { value: u8 },
}

/// Decodes the leading status byte of raw notification payloads.
pub struct NotificationHandler;

impl NotificationHandler {
    /// Decodes the status byte of one notification payload.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is empty or the status byte is not a
    /// known [`ActionStatus`].
    #[instrument(skip(payload), level = "trace", fields(payload_len = payload.len()))]
    pub fn decode(payload: &[u8]) -> Result<ActionStatus, StatusDecodeError> {
        let Some(first) = payload.first() else {
            return Err(StatusDecodeError::EmptyPayload);
        };
        ActionStatus::try_from(*first)
    }

    /// Checks that a notification reports [`ActionStatus::Complete`].
    ///
    /// ```
    /// use switchbot::{ActionStatus, NotificationHandler, ProtocolError};
    ///
    /// assert!(NotificationHandler::ensure_complete(&[0x01]).is_ok());
    /// let error = NotificationHandler::ensure_complete(&[0x03]).unwrap_err();
    /// assert_eq!(Some(ActionStatus::DeviceBusy), error.action_status());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Status`] for any other known status and a
    /// decode error for an unknown status byte.
    pub fn ensure_complete(payload: &[u8]) -> Result<(), ProtocolError> {
        match Self::decode(payload)? {
            ActionStatus::Complete => Ok(()),
            status => Err(ProtocolError::Status { status }),
        }
    }
}
