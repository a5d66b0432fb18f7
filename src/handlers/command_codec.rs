use crate::protocol::{COMMAND_PREFIX, TIMER_PAYLOAD_LEN, TOKEN_OPCODE_FLAG};

use super::{BotMode, HoldTime, PasswordToken, TimerIndex};

const OP_PRESS: u8 = 0x01;
const OP_GET_SETTINGS: u8 = 0x02;
const OP_SET_MODE: u8 = 0x03;
const OP_GET_TIMER: u8 = 0x08;
const OP_WRITE_TIMER: u8 = 0x09;
const OP_SET_HOLD_TIME: u8 = 0x0F;

const HOLD_TIME_MARKER: u8 = 0x08;
const MODE_MARKER: u8 = 0x64;
const CLOCK_MARKER: u8 = 0x01;

/// Arm state requested by a dual-state switch command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SwitchState {
    /// Extend the arm and keep it extended.
    On,
    /// Retract the arm.
    Off,
}

impl SwitchState {
    fn as_payload_byte(self) -> u8 {
        match self {
            Self::On => 0x01,
            Self::Off => 0x02,
        }
    }
}

impl From<bool> for SwitchState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// One command frame understood by the device.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Command {
    Press,
    Switch(SwitchState),
    SetHoldTime(HoldTime),
    GetSettings,
    GetTimer(TimerIndex),
    /// Writes (or clears) one timer slot using an encoded timer payload.
    WriteTimer([u8; TIMER_PAYLOAD_LEN]),
    SetMode(BotMode),
    /// Sets the device clock to local epoch seconds.
    SetClock(u64),
}

impl Command {
    /// Returns the sub-opcode sent when no token is present.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Press | Self::Switch(_) => OP_PRESS,
            Self::GetSettings => OP_GET_SETTINGS,
            Self::SetMode(_) => OP_SET_MODE,
            Self::GetTimer(_) => OP_GET_TIMER,
            Self::WriteTimer(_) | Self::SetClock(_) => OP_WRITE_TIMER,
            Self::SetHoldTime(_) => OP_SET_HOLD_TIME,
        }
    }

    /// Returns whether the response carries a payload beyond the status byte.
    #[must_use]
    pub fn expects_payload(&self) -> bool {
        matches!(self, Self::GetSettings | Self::GetTimer(_))
    }

    fn extend_payload(&self, frame: &mut Vec<u8>) {
        match self {
            Self::Press | Self::GetSettings => {}
            Self::Switch(state) => frame.push(state.as_payload_byte()),
            Self::SetHoldTime(hold_time) => {
                frame.extend_from_slice(&[HOLD_TIME_MARKER, hold_time.seconds()]);
            }
            Self::GetTimer(index) => frame.push(index.selector()),
            Self::WriteTimer(payload) => frame.extend_from_slice(payload),
            Self::SetMode(mode) => frame.extend_from_slice(&[MODE_MARKER, mode.config_byte()]),
            Self::SetClock(epoch_seconds) => {
                frame.push(CLOCK_MARKER);
                frame.extend_from_slice(&epoch_seconds.to_be_bytes());
            }
        }
    }
}

/// Builds command frames: `0x57`, sub-opcode, optional token, payload.
pub struct CommandEncoder;

impl CommandEncoder {
    /// Encodes a command, flagging the sub-opcode and inserting the token when
    /// one is present.
    ///
    /// ```
    /// use switchbot::{Command, CommandEncoder, PasswordToken};
    ///
    /// assert_eq!(vec![0x57, 0x01], CommandEncoder::encode(&Command::Press, None));
    ///
    /// let token = PasswordToken::from_password("secret");
    /// assert_eq!(
    ///     vec![0x57, 0x11, 0x5C, 0xA2, 0xE8, 0xE5],
    ///     CommandEncoder::encode(&Command::Press, Some(&token))
    /// );
    /// ```
    #[must_use]
    pub fn encode(command: &Command, token: Option<&PasswordToken>) -> Vec<u8> {
        let mut frame = Vec::with_capacity(2 + 4 + 1 + TIMER_PAYLOAD_LEN);
        frame.push(COMMAND_PREFIX);
        match token {
            Some(token) => {
                frame.push(command.opcode() | TOKEN_OPCODE_FLAG);
                frame.extend_from_slice(token.as_bytes());
            }
            None => frame.push(command.opcode()),
        }
        command.extend_payload(&mut frame);
        frame
    }
}
