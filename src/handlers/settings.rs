use std::fmt;

use serde::Serialize;
use serde_with::SerializeDisplay;
use thiserror::Error;

use crate::error::InvalidInputError;

const MIN_HOLD_SECONDS: i64 = 0;
const MAX_HOLD_SECONDS: i64 = 60;

const SETTINGS_PAYLOAD_LEN: usize = 11;
const DUAL_STATE_BIT: u8 = 0x10;
const INVERSE_BIT: u8 = 0x01;

/// Errors returned while parsing a settings response.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum SettingsDecodeError {
    #[error("settings payload is too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },
}

/// Validated hold time in the inclusive range `0..=60` seconds.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
#[display("{_0}s")]
pub struct HoldTime(u8);

impl HoldTime {
    /// Creates a validated hold time.
    ///
    /// ```
    /// use switchbot::HoldTime;
    ///
    /// assert_eq!(60, HoldTime::new(60)?.seconds());
    /// assert!(HoldTime::new(-1).is_err());
    /// # Ok::<(), switchbot::InvalidInputError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when `seconds` is outside `0..=60`.
    pub fn new(seconds: i64) -> Result<Self, InvalidInputError> {
        if !(MIN_HOLD_SECONDS..=MAX_HOLD_SECONDS).contains(&seconds) {
            return Err(InvalidInputError::HoldTimeOutOfRange {
                value: seconds,
                min: MIN_HOLD_SECONDS,
                max: MAX_HOLD_SECONDS,
            });
        }
        let seconds = u8::try_from(seconds).map_err(|_| InvalidInputError::HoldTimeOutOfRange {
            value: seconds,
            min: MIN_HOLD_SECONDS,
            max: MAX_HOLD_SECONDS,
        })?;
        Ok(Self(seconds))
    }

    /// Returns the hold time in seconds.
    #[must_use]
    pub fn seconds(self) -> u8 {
        self.0
    }
}

/// Device operating mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize)]
pub struct BotMode {
    /// Switch on and off are independent commands.
    pub dual_state: bool,
    /// Arm direction is inverted.
    pub inverse: bool,
}

impl BotMode {
    /// Returns the config byte (bit 4 dual state, bit 0 inverse).
    #[must_use]
    pub fn config_byte(self) -> u8 {
        let mut byte = 0;
        if self.dual_state {
            byte |= DUAL_STATE_BIT;
        }
        if self.inverse {
            byte |= INVERSE_BIT;
        }
        byte
    }

    fn from_config_byte(byte: u8) -> Self {
        Self {
            dual_state: byte & DUAL_STATE_BIT != 0,
            inverse: byte & INVERSE_BIT != 0,
        }
    }
}

/// Firmware version stored in tenths (`45` is `4.5`).
#[derive(Debug, Clone, Copy, Eq, PartialEq, SerializeDisplay)]
pub struct FirmwareVersion(u8);

impl FirmwareVersion {
    /// Returns the raw version byte.
    #[must_use]
    pub fn tenths(self) -> u8 {
        self.0
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// Snapshot of the device settings, read fresh on every query.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct Settings {
    /// Battery percentage.
    pub battery: u8,
    pub firmware: FirmwareVersion,
    /// Number of configured timers.
    #[serde(rename = "n_timers")]
    pub timer_count: u8,
    pub dual_state_mode: bool,
    pub inverse_direction: bool,
    pub hold_seconds: u8,
}

impl Settings {
    /// Returns the device mode encoded in the snapshot.
    #[must_use]
    pub fn mode(&self) -> BotMode {
        BotMode {
            dual_state: self.dual_state_mode,
            inverse: self.inverse_direction,
        }
    }
}

/// Parser for settings responses.
pub struct SettingsHandler;

impl SettingsHandler {
    /// Parses a settings response.
    ///
    /// Byte `0` is the status byte. Battery is byte `1`, firmware byte `2`,
    /// the timer count byte `8`, the mode config byte `9` and hold seconds
    /// byte `10`.
    ///
    /// ```
    /// use switchbot::SettingsHandler;
    ///
    /// let settings = SettingsHandler::parse(&[1, 87, 45, 0, 0, 0, 0, 0, 2, 0x10, 3])?;
    /// assert_eq!("4.5", settings.firmware.to_string());
    /// assert!(settings.dual_state_mode);
    /// # Ok::<(), switchbot::SettingsDecodeError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is shorter than 11 bytes.
    pub fn parse(payload: &[u8]) -> Result<Settings, SettingsDecodeError> {
        let Some(bytes) = payload.get(..SETTINGS_PAYLOAD_LEN) else {
            return Err(SettingsDecodeError::PayloadTooShort {
                expected: SETTINGS_PAYLOAD_LEN,
                actual: payload.len(),
            });
        };
        let mode = BotMode::from_config_byte(bytes[9]);

        Ok(Settings {
            battery: bytes[1],
            firmware: FirmwareVersion(bytes[2]),
            timer_count: bytes[8],
            dual_state_mode: mode.dual_state,
            inverse_direction: mode.inverse,
            hold_seconds: bytes[10],
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(60)]
    fn hold_time_accepts_inclusive_range(#[case] seconds: i64) {
        assert!(HoldTime::new(seconds).is_ok());
    }

    #[rstest]
    #[case(-1)]
    #[case(61)]
    #[case(i64::from(u8::MAX) + 1)]
    fn hold_time_rejects_out_of_range(#[case] seconds: i64) {
        assert_eq!(
            Err(InvalidInputError::HoldTimeOutOfRange {
                value: seconds,
                min: 0,
                max: 60,
            }),
            HoldTime::new(seconds)
        );
    }

    #[rstest]
    #[case(BotMode { dual_state: false, inverse: false }, 0x00)]
    #[case(BotMode { dual_state: true, inverse: false }, 0x10)]
    #[case(BotMode { dual_state: false, inverse: true }, 0x01)]
    #[case(BotMode { dual_state: true, inverse: true }, 0x11)]
    fn mode_config_byte_sets_flag_bits(#[case] mode: BotMode, #[case] expected: u8) {
        assert_eq!(expected, mode.config_byte());
    }

    #[test]
    fn parse_reads_fixed_offsets() {
        let settings = SettingsHandler::parse(&[
            0x01, 0x5A, 0x2D, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x03, 0x11, 0x0A,
        ])
        .expect("settings should parse");

        assert_eq!(
            Settings {
                battery: 90,
                firmware: FirmwareVersion(45),
                timer_count: 3,
                dual_state_mode: true,
                inverse_direction: true,
                hold_seconds: 10,
            },
            settings
        );
    }

    #[test]
    fn parse_rejects_short_payload() {
        assert_eq!(
            Err(SettingsDecodeError::PayloadTooShort {
                expected: 11,
                actual: 3,
            }),
            SettingsHandler::parse(&[0x01, 0x5A, 0x2D])
        );
    }

    #[test]
    fn settings_serialize_with_short_field_names() {
        let settings = SettingsHandler::parse(&[1, 99, 61, 0, 0, 0, 0, 0, 0, 0, 0])
            .expect("settings should parse");

        insta::assert_json_snapshot!(settings, @r#"
        {
          "battery": 99,
          "firmware": "6.1",
          "n_timers": 0,
          "dual_state_mode": false,
          "inverse_direction": false,
          "hold_seconds": 0
        }
        "#);
    }
}
