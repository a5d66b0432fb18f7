use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use time::Weekday;
use tracing::instrument;

use crate::error::InvalidInputError;
use crate::protocol::{TIMER_PAYLOAD_LEN, TIMER_SLOT_COUNT};

/// Repeat byte used when a timer has no active weekday.
const NO_REPEAT: u8 = 0x80;
const WEEKDAY_MASK: u8 = 0x7F;
const LOW_NIBBLE: u8 = 0x0F;
const HIGH_NIBBLE: u8 = 0xF0;
const MAX_HOUR: u8 = 23;
const MAX_MINUTE: u8 = 59;

const ISO_WEEKDAYS: [Weekday; 7] = [
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
    Weekday::Sunday,
];

/// Errors returned while decoding timer slot payloads.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TimerCodecError {
    #[error("timer payload is too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },
    #[error("unknown timer action value {value}")]
    UnknownAction { value: u8 },
}

/// Action a timer (or a direct command) performs.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    EnumIter,
    EnumString,
    Display,
    SerializeDisplay,
    DeserializeFromStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// Extend, hold, retract.
    Press,
    /// Extend and stay (dual-state mode).
    TurnOn,
    /// Retract and stay (dual-state mode).
    TurnOff,
}

impl Action {
    /// Returns the wire value.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Press => 0,
            Self::TurnOn => 1,
            Self::TurnOff => 2,
        }
    }
}

impl TryFrom<u8> for Action {
    type Error = TimerCodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Press),
            1 => Ok(Self::TurnOn),
            2 => Ok(Self::TurnOff),
            _ => Err(TimerCodecError::UnknownAction { value }),
        }
    }
}

/// Timer scheduling mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, SerializeDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum TimerMode {
    /// Fires at a wall-clock time on selected weekdays.
    Standard,
    /// Fires repeatedly at an interval.
    Interval,
}

impl TimerMode {
    /// Returns the wire value of the mode nibble.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Standard => 0,
            Self::Interval => 1,
        }
    }
}

/// Set of ISO weekdays on which a standard timer repeats.
///
/// Bit `k` is set for ISO weekday `k + 1` (Monday is bit 0, Sunday bit 6).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Weekdays(u8);

impl Weekdays {
    /// The empty set (a one-shot timer).
    pub const EMPTY: Self = Self(0);

    /// Builds a set from ISO weekday numbers (`1` = Monday .. `7` = Sunday).
    ///
    /// ```
    /// use switchbot::Weekdays;
    /// use time::Weekday;
    ///
    /// let days = Weekdays::from_iso([1, 3])?;
    /// assert!(days.contains(Weekday::Wednesday));
    /// assert_eq!(vec![1, 3], days.iso_numbers());
    /// # Ok::<(), switchbot::InvalidInputError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error for numbers outside `1..=7`.
    pub fn from_iso(days: impl IntoIterator<Item = u8>) -> Result<Self, InvalidInputError> {
        let mut mask = 0u8;
        for day in days {
            if !(1..=7).contains(&day) {
                return Err(InvalidInputError::WeekdayOutOfRange { value: day });
            }
            mask |= 1 << (day - 1);
        }
        Ok(Self(mask))
    }

    /// Returns whether the set contains a weekday.
    #[must_use]
    pub fn contains(self, weekday: Weekday) -> bool {
        self.0 & bit_for(weekday) != 0
    }

    /// Returns whether no weekday is selected.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the selected weekdays, Monday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        ISO_WEEKDAYS
            .into_iter()
            .filter(move |weekday| self.contains(*weekday))
    }

    /// Returns the selected weekdays as ISO numbers, ascending.
    #[must_use]
    pub fn iso_numbers(self) -> Vec<u8> {
        self.iter().map(Weekday::number_from_monday).collect()
    }

    /// Returns the raw weekday bitmask.
    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    pub(crate) fn repeat_byte(self) -> u8 {
        if self.0 == 0 { NO_REPEAT } else { self.0 }
    }

    pub(crate) fn from_repeat_byte(value: u8) -> Self {
        Self(value & WEEKDAY_MASK)
    }
}

impl FromIterator<Weekday> for Weekdays {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        Self(iter.into_iter().fold(0, |mask, weekday| mask | bit_for(weekday)))
    }
}

impl Serialize for Weekdays {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iso_numbers())
    }
}

impl<'de> Deserialize<'de> for Weekdays {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let days = Vec::<u8>::deserialize(deserializer)?;
        Self::from_iso(days).map_err(D::Error::custom)
    }
}

fn bit_for(weekday: Weekday) -> u8 {
    1 << (weekday.number_from_monday() - 1)
}

/// Timer firing at a wall-clock time on selected weekdays.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StandardTimerFields")]
pub struct StandardTimer {
    action: Action,
    enabled: bool,
    weekdays: Weekdays,
    hour: u8,
    #[serde(rename = "min")]
    minute: u8,
}

impl StandardTimer {
    /// Creates a validated standard timer.
    ///
    /// ```
    /// use switchbot::{Action, StandardTimer, Weekdays};
    ///
    /// let timer = StandardTimer::new(true, Weekdays::from_iso([1, 5])?, 7, 30, Action::Press)?;
    /// assert_eq!(7, timer.hour());
    /// # Ok::<(), switchbot::InvalidInputError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when `hour > 23` or `minute > 59`.
    pub fn new(
        enabled: bool,
        weekdays: Weekdays,
        hour: u8,
        minute: u8,
        action: Action,
    ) -> Result<Self, InvalidInputError> {
        if hour > MAX_HOUR {
            return Err(InvalidInputError::HourOutOfRange { value: hour });
        }
        if minute > MAX_MINUTE {
            return Err(InvalidInputError::MinuteOutOfRange { value: minute });
        }
        Ok(Self {
            action,
            enabled,
            weekdays,
            hour,
            minute,
        })
    }

    /// Returns whether the timer is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the repeat weekdays.
    #[must_use]
    pub fn weekdays(&self) -> Weekdays {
        self.weekdays
    }

    /// Returns the firing hour.
    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Returns the firing minute.
    #[must_use]
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Returns the timer action.
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Returns a copy with a different enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Deserialize)]
struct StandardTimerFields {
    action: Action,
    enabled: bool,
    #[serde(default)]
    weekdays: Weekdays,
    hour: u8,
    min: u8,
}

impl TryFrom<StandardTimerFields> for StandardTimer {
    type Error = InvalidInputError;

    fn try_from(fields: StandardTimerFields) -> Result<Self, Self::Error> {
        Self::new(
            fields.enabled,
            fields.weekdays,
            fields.hour,
            fields.min,
            fields.action,
        )
    }
}

/// Timer firing repeatedly at an interval.
///
/// The interval feature is only known at the byte level: fields are encoded
/// and decoded symmetrically without further interpretation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalTimerFields")]
pub struct IntervalTimer {
    action: Action,
    enabled: bool,
    #[serde(rename = "interval_mode")]
    mode_tag: u8,
    timer_sum: u8,
    hour: u8,
    #[serde(rename = "min")]
    minute: u8,
}

impl IntervalTimer {
    /// Creates an interval timer using the interval mode tag.
    #[must_use]
    pub fn new(enabled: bool, action: Action, timer_sum: u8, hour: u8, minute: u8) -> Self {
        Self {
            action,
            enabled,
            mode_tag: TimerMode::Interval.code(),
            timer_sum,
            hour,
            minute,
        }
    }

    /// Overrides the raw interval mode nibble.
    ///
    /// # Errors
    ///
    /// Returns an error when `mode_tag` is zero or does not fit in a nibble.
    pub fn with_mode_tag(mut self, mode_tag: u8) -> Result<Self, InvalidInputError> {
        if mode_tag == 0 || mode_tag > LOW_NIBBLE {
            return Err(InvalidInputError::IntervalModeOutOfRange { value: mode_tag });
        }
        self.mode_tag = mode_tag;
        Ok(self)
    }

    /// Returns whether the timer is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the raw interval mode nibble.
    #[must_use]
    pub fn mode_tag(&self) -> u8 {
        self.mode_tag
    }

    /// Returns the timer action.
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Returns the total interval count.
    #[must_use]
    pub fn timer_sum(&self) -> u8 {
        self.timer_sum
    }

    /// Returns the interval hour field.
    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Returns the interval minute field.
    #[must_use]
    pub fn minute(&self) -> u8 {
        self.minute
    }
}

#[derive(Deserialize)]
struct IntervalTimerFields {
    action: Action,
    enabled: bool,
    interval_mode: Option<u8>,
    timer_sum: u8,
    hour: u8,
    min: u8,
}

impl TryFrom<IntervalTimerFields> for IntervalTimer {
    type Error = InvalidInputError;

    fn try_from(fields: IntervalTimerFields) -> Result<Self, Self::Error> {
        let timer = Self::new(
            fields.enabled,
            fields.action,
            fields.timer_sum,
            fields.hour,
            fields.min,
        );
        match fields.interval_mode {
            Some(mode_tag) => timer.with_mode_tag(mode_tag),
            None => Ok(timer),
        }
    }
}

/// One on-device schedule entry.
///
/// Serializes as a flat object tagged by `mode`, and deserializes from the
/// same shape with full validation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, derive_more::From)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Timer {
    Standard(StandardTimer),
    Interval(IntervalTimer),
}

impl Timer {
    /// Returns the scheduling mode.
    #[must_use]
    pub fn mode(&self) -> TimerMode {
        match self {
            Self::Standard(_) => TimerMode::Standard,
            Self::Interval(_) => TimerMode::Interval,
        }
    }

    /// Returns whether the timer is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        match self {
            Self::Standard(timer) => timer.enabled(),
            Self::Interval(timer) => timer.enabled(),
        }
    }

    /// Returns the timer action.
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Standard(timer) => timer.action(),
            Self::Interval(timer) => timer.action(),
        }
    }
}

/// Index of one of the five timer slots.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, derive_more::Display, derive_more::Into)]
#[display("{_0}")]
pub struct TimerIndex(u8);

impl TimerIndex {
    /// Creates a validated slot index in `0..5`.
    ///
    /// # Errors
    ///
    /// Returns an error when `index >= 5`.
    pub fn new(index: u8) -> Result<Self, InvalidInputError> {
        if index >= TIMER_SLOT_COUNT {
            return Err(InvalidInputError::TimerIndexOutOfRange {
                index,
                max: TIMER_SLOT_COUNT,
            });
        }
        Ok(Self(index))
    }

    /// Iterates over every slot index.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..TIMER_SLOT_COUNT).map(Self)
    }

    /// Returns the raw index.
    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Returns the slot selector byte (`index * 16 + 3`).
    ///
    /// ```
    /// use switchbot::TimerIndex;
    ///
    /// assert_eq!(0x23, TimerIndex::new(2)?.selector());
    /// # Ok::<(), switchbot::InvalidInputError>(())
    /// ```
    #[must_use]
    pub fn selector(self) -> u8 {
        self.0 * 16 + 3
    }
}

/// A timer slot being written together with the resulting timer count.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TimerSlot {
    index: TimerIndex,
    num_timer: u8,
}

impl TimerSlot {
    /// Creates a validated slot where `index < num_timer <= 5`.
    ///
    /// # Errors
    ///
    /// Returns an error when the index is not covered by the timer count or the
    /// count exceeds the number of slots.
    pub fn new(index: u8, num_timer: u8) -> Result<Self, InvalidInputError> {
        if num_timer == 0 || num_timer > TIMER_SLOT_COUNT || index >= num_timer {
            return Err(InvalidInputError::TimerSlotOutOfRange {
                index,
                num_timer,
                max: TIMER_SLOT_COUNT,
            });
        }
        Ok(Self {
            index: TimerIndex(index),
            num_timer,
        })
    }

    /// Returns the slot index.
    #[must_use]
    pub fn index(&self) -> TimerIndex {
        self.index
    }

    /// Returns the configured timer count.
    #[must_use]
    pub fn num_timer(&self) -> u8 {
        self.num_timer
    }
}

/// A decoded timer slot read back from the device.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct DecodedTimer {
    /// The timer, or `None` when the slot is unset.
    pub timer: Option<Timer>,
    /// Number of timers the device reports as configured.
    pub num_timer: u8,
}

/// Raw field values shared by both timer variants on the wire.
struct WireFields {
    enabled: bool,
    repeat: u8,
    hour: u8,
    minute: u8,
    mode: u8,
    action: u8,
    timer_sum: u8,
    interval_hour: u8,
    interval_minute: u8,
}

impl From<&Timer> for WireFields {
    fn from(timer: &Timer) -> Self {
        match timer {
            Timer::Standard(timer) => Self {
                enabled: timer.enabled,
                repeat: timer.weekdays.repeat_byte(),
                hour: timer.hour,
                minute: timer.minute,
                mode: TimerMode::Standard.code(),
                action: timer.action.code(),
                timer_sum: 0,
                interval_hour: 0,
                interval_minute: 0,
            },
            Timer::Interval(timer) => Self {
                enabled: timer.enabled,
                repeat: Weekdays::EMPTY.repeat_byte(),
                hour: 0,
                minute: 0,
                mode: timer.mode_tag,
                action: timer.action.code(),
                timer_sum: timer.timer_sum,
                interval_hour: timer.hour,
                interval_minute: timer.minute,
            },
        }
    }
}

/// Encoder/decoder for the 11-byte timer slot layout.
///
/// Layout: `selector, num_timer, 0x00, repeat, hour, minute, mode, action,
/// timer_sum, interval_hour, interval_minute`. A zero repeat byte marks a
/// disabled timer, in which case the repeat mask is split across the upper
/// nibbles of the mode byte (low nibble of the mask) and the action byte
/// (high nibble of the mask).
pub struct TimerCodec;

impl TimerCodec {
    /// Encodes a timer for a slot.
    ///
    /// ```
    /// use switchbot::{Action, StandardTimer, Timer, TimerCodec, TimerSlot, Weekdays};
    ///
    /// let timer = StandardTimer::new(true, Weekdays::from_iso([1, 3])?, 7, 30, Action::Press)?;
    /// let bytes = TimerCodec::encode(&Timer::from(timer), TimerSlot::new(1, 3)?);
    /// assert_eq!([0x13, 0x03, 0x00, 0x05, 0x07, 0x1E, 0x00, 0x00, 0x00, 0x00, 0x00], bytes);
    /// # Ok::<(), switchbot::InvalidInputError>(())
    /// ```
    #[must_use]
    pub fn encode(timer: &Timer, slot: TimerSlot) -> [u8; TIMER_PAYLOAD_LEN] {
        let fields = WireFields::from(timer);
        let (repeat, mode, action) = if fields.enabled {
            (fields.repeat, fields.mode, fields.action)
        } else {
            (
                0x00,
                fields.mode | ((fields.repeat & LOW_NIBBLE) << 4),
                fields.action | (fields.repeat & HIGH_NIBBLE),
            )
        };

        [
            slot.index.selector(),
            slot.num_timer,
            0x00,
            repeat,
            fields.hour,
            fields.minute,
            mode,
            action,
            fields.timer_sum,
            fields.interval_hour,
            fields.interval_minute,
        ]
    }

    /// Encodes a slot-clearing payload.
    #[must_use]
    pub fn encode_delete(index: TimerIndex, num_timer: u8) -> [u8; TIMER_PAYLOAD_LEN] {
        let mut bytes = [0u8; TIMER_PAYLOAD_LEN];
        bytes[0] = index.selector();
        bytes[1] = num_timer;
        bytes
    }

    /// Decodes a timer slot response.
    ///
    /// Byte `0` (the status byte in responses, the selector in requests) is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is shorter than 11 bytes or carries
    /// an unknown action.
    #[instrument(skip(payload), level = "trace", fields(payload_len = payload.len()))]
    pub fn decode(payload: &[u8]) -> Result<DecodedTimer, TimerCodecError> {
        let Some(bytes) = payload.get(..TIMER_PAYLOAD_LEN) else {
            return Err(TimerCodecError::PayloadTooShort {
                expected: TIMER_PAYLOAD_LEN,
                actual: payload.len(),
            });
        };

        let num_timer = bytes[1];
        let enabled = bytes[3] != 0;
        let repeat = if enabled {
            bytes[3]
        } else {
            (bytes[6] >> 4) | (bytes[7] & HIGH_NIBBLE)
        };
        let hour = bytes[4];
        let minute = bytes[5];
        let mode_tag = bytes[6] & LOW_NIBBLE;
        let action_code = bytes[7] & LOW_NIBBLE;
        let timer_sum = bytes[8];
        let interval_hour = bytes[9];
        let interval_minute = bytes[10];

        let unset = !enabled
            && hour == 0
            && minute == 0
            && timer_sum == 0
            && interval_hour == 0
            && interval_minute == 0;
        if unset {
            return Ok(DecodedTimer {
                timer: None,
                num_timer,
            });
        }

        let action = Action::try_from(action_code)?;
        let timer = if mode_tag != 0 {
            Timer::Interval(IntervalTimer {
                action,
                enabled,
                mode_tag,
                timer_sum,
                hour: interval_hour,
                minute: interval_minute,
            })
        } else {
            Timer::Standard(StandardTimer {
                action,
                enabled,
                weekdays: Weekdays::from_repeat_byte(repeat),
                hour,
                minute,
            })
        };

        Ok(DecodedTimer {
            timer: Some(timer),
            num_timer,
        })
    }
}
