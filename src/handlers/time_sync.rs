use time::OffsetDateTime;
use tracing::warn;

use super::Command;

/// Builds device clock synchronisation commands.
pub struct TimeSyncHandler;

impl TimeSyncHandler {
    /// Returns local epoch seconds: UTC seconds plus the UTC offset of `timestamp`.
    ///
    /// Timestamps before the epoch clamp to zero.
    ///
    /// ```
    /// use switchbot::TimeSyncHandler;
    /// use time::{OffsetDateTime, UtcOffset};
    ///
    /// let offset = UtcOffset::from_hms(2, 0, 0)?;
    /// let timestamp = OffsetDateTime::from_unix_timestamp(1_000)?.to_offset(offset);
    /// assert_eq!(8_200, TimeSyncHandler::local_epoch_seconds(timestamp));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn local_epoch_seconds(timestamp: OffsetDateTime) -> u64 {
        let local = timestamp.unix_timestamp() + i64::from(timestamp.offset().whole_seconds());
        u64::try_from(local).unwrap_or_default()
    }

    /// Builds the clock command for a timestamp.
    #[must_use]
    pub fn command_for(timestamp: OffsetDateTime) -> Command {
        Command::SetClock(Self::local_epoch_seconds(timestamp))
    }

    /// Returns the current time in the host's local offset.
    ///
    /// Falls back to UTC when the local offset cannot be determined.
    #[must_use]
    pub fn now_local() -> OffsetDateTime {
        OffsetDateTime::now_local().unwrap_or_else(|error| {
            warn!(?error, "local UTC offset unavailable; syncing clock as UTC");
            OffsetDateTime::now_utc()
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use time::{Date, Month, PrimitiveDateTime, Time, UtcOffset};

    use super::*;
    use crate::handlers::CommandEncoder;

    fn timestamp(offset_hours: i8) -> OffsetDateTime {
        let date = Date::from_calendar_date(2024, Month::March, 1)
            .expect("calendar date used in tests should be valid");
        let time = Time::from_hms(12, 0, 0).expect("time used in tests should be valid");
        let offset =
            UtcOffset::from_hms(offset_hours, 0, 0).expect("offset used in tests should be valid");
        PrimitiveDateTime::new(date, time).assume_offset(offset)
    }

    #[test]
    fn utc_timestamp_is_unchanged() {
        // 2024-03-01T12:00:00Z
        assert_eq!(1_709_294_400, TimeSyncHandler::local_epoch_seconds(timestamp(0)));
    }

    #[test]
    fn offset_is_added_to_utc_seconds() {
        // 12:00+01:00 is 11:00Z; the device expects wall-clock seconds
        assert_eq!(
            1_709_290_800 + 3_600,
            TimeSyncHandler::local_epoch_seconds(timestamp(1))
        );
        assert_eq!(
            1_709_312_400 - 5 * 3_600,
            TimeSyncHandler::local_epoch_seconds(timestamp(-5))
        );
    }

    #[test]
    fn clock_frame_carries_big_endian_seconds() {
        let frame = CommandEncoder::encode(&TimeSyncHandler::command_for(timestamp(0)), None);
        assert_eq!(
            vec![0x57, 0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x65, 0xE1, 0xC3, 0x40],
            frame
        );
    }
}
