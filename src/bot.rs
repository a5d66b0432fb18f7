use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::error::{InvalidInputError, ProtocolError};
use crate::handlers::{
    BotMode, Command, CommandEncoder, DecodedTimer, HoldTime, PasswordToken, Settings,
    SettingsHandler, SwitchState, TimeSyncHandler, Timer, TimerCodec, TimerIndex, TimerSlot,
};
use crate::hw::session::BotSession;
use crate::hw::{BleTransport, MacAddress};
use crate::protocol::{DEFAULT_RESPONSE_TIMEOUT, TIMER_SLOT_COUNT};

/// A Switchbot addressed by MAC, optionally protected by a password.
///
/// Every operation opens its own connection and closes it before returning.
/// Operations take `&mut self`, so one `Bot` never runs two exchanges at once.
/// Nothing is retried: a failed or timed-out exchange is returned as is.
pub struct Bot {
    id: u32,
    mac: MacAddress,
    name: String,
    token: Option<PasswordToken>,
    response_timeout: Duration,
    transport: Arc<dyn BleTransport>,
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("id", &self.id)
            .field("mac", &self.mac)
            .field("name", &self.name)
            .field("encrypted", &self.token.is_some())
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

impl Bot {
    /// Creates a bot after validating its MAC address.
    ///
    /// ```
    /// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    /// use switchbot::{Bot, FakeBackendConfig, HardwareBackend};
    ///
    /// let config = FakeBackendConfig::builder()
    ///     .devices("AA:BB:CC:DD:EE:01|Kettle|switchbot".parse()?)
    ///     .build();
    /// let transport = HardwareBackend::Fake(config).into_transport().await?;
    /// let mut bot = Bot::new(1, "aa:bb:cc:dd:ee:01", "Kettle", transport)?;
    /// bot.press().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when `mac` is not six separated hex pairs.
    pub fn new(
        id: u32,
        mac: &str,
        name: impl Into<String>,
        transport: Arc<dyn BleTransport>,
    ) -> Result<Self, InvalidInputError> {
        Ok(Self::from_address(id, MacAddress::parse(mac)?, name, transport))
    }

    /// Creates a bot from an already validated address.
    #[must_use]
    pub fn from_address(
        id: u32,
        mac: MacAddress,
        name: impl Into<String>,
        transport: Arc<dyn BleTransport>,
    ) -> Self {
        Self {
            id,
            mac,
            name: name.into(),
            token: None,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            transport,
        }
    }

    /// Uses the token derived from `password` for every later command.
    #[must_use]
    pub fn encrypted(mut self, password: &str) -> Self {
        info!(mac = %self.mac, "using encrypted communication");
        self.token = Some(PasswordToken::from_password(password));
        self
    }

    /// Overrides how long each command waits for its notification.
    #[must_use]
    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    /// Returns the application-assigned identifier.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether commands carry a password token.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.token.is_some()
    }

    /// Extends, holds and retracts the arm.
    ///
    /// # Errors
    ///
    /// Returns an error when the exchange fails or the device reports a
    /// status other than complete.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn press(&mut self) -> Result<(), ProtocolError> {
        self.send_all(&[Command::Press]).await.map(drop)
    }

    /// Extends (`on`) or retracts the arm in dual-state mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the exchange fails or the device reports a
    /// status other than complete.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn switch(&mut self, on: bool) -> Result<(), ProtocolError> {
        self.send_all(&[Command::Switch(SwitchState::from(on))])
            .await
            .map(drop)
    }

    /// Sets how long a press holds the arm extended.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error before connecting when `seconds` is
    /// outside `0..=60`, otherwise any exchange failure.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn set_hold_time(&mut self, seconds: i64) -> Result<(), ProtocolError> {
        let hold_time = HoldTime::new(seconds)?;
        self.send_all(&[Command::SetHoldTime(hold_time)])
            .await
            .map(drop)
    }

    /// Reads a fresh settings snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the exchange fails or the response is too short.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn get_settings(&mut self) -> Result<Settings, ProtocolError> {
        let responses = self.send_all(&[Command::GetSettings]).await?;
        let response = responses.first().map_or(&[][..], Vec::as_slice);
        Ok(SettingsHandler::parse(response)?)
    }

    /// Reads one timer slot along with the device's timer count.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for `idx >= 5`, otherwise any exchange
    /// or decode failure.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn get_timer(&mut self, idx: u8) -> Result<DecodedTimer, ProtocolError> {
        let index = TimerIndex::new(idx)?;
        let responses = self.send_all(&[Command::GetTimer(index)]).await?;
        let response = responses.first().map_or(&[][..], Vec::as_slice);
        Ok(TimerCodec::decode(response)?)
    }

    /// Reads timer slots in order, stopping at the first unset slot.
    ///
    /// # Errors
    ///
    /// Returns an error when any exchange or decode fails.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn get_timers(&mut self) -> Result<Vec<Timer>, ProtocolError> {
        let mut session = self.open_session().await?;
        let result = async {
            let mut timers = Vec::new();
            for index in TimerIndex::all() {
                let response = session
                    .request(&self.frame(&Command::GetTimer(index)))
                    .await?;
                let Some(timer) = TimerCodec::decode(&response)?.timer else {
                    debug!(%index, "slot unset; later slots are not read");
                    break;
                };
                timers.push(timer);
            }
            Ok::<_, ProtocolError>(timers)
        }
        .await;
        session.finish(result).await
    }

    /// Writes one timer slot.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error unless `idx < num_timer <= 5`, otherwise
    /// any exchange failure.
    #[instrument(skip(self, timer), level = "info", fields(mac = %self.mac))]
    pub async fn set_timer(
        &mut self,
        timer: &Timer,
        idx: u8,
        num_timer: u8,
    ) -> Result<(), ProtocolError> {
        let slot = TimerSlot::new(idx, num_timer)?;
        self.send_all(&[Command::WriteTimer(TimerCodec::encode(timer, slot))])
            .await
            .map(drop)
    }

    /// Replaces the whole schedule: writes each timer then clears every
    /// remaining slot.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for more than five timers, otherwise any
    /// exchange failure.
    #[instrument(skip(self, timers), level = "info", fields(mac = %self.mac, count = timers.len()))]
    pub async fn set_timers(&mut self, timers: &[Timer]) -> Result<(), ProtocolError> {
        let commands = schedule_commands(timers)?;
        self.send_all(&commands).await.map(drop)
    }

    /// Syncs the device clock, then replaces the schedule, in one connection.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for more than five timers, otherwise any
    /// exchange failure.
    #[instrument(skip(self, timers), level = "info", fields(mac = %self.mac, count = timers.len()))]
    pub async fn set_timers_with_clock(&mut self, timers: &[Timer]) -> Result<(), ProtocolError> {
        let mut commands = vec![TimeSyncHandler::command_for(TimeSyncHandler::now_local())];
        commands.extend(schedule_commands(timers)?);
        self.send_all(&commands).await.map(drop)
    }

    /// Appends a timer to the current schedule.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error when five timers are already configured,
    /// otherwise any exchange failure.
    #[instrument(skip(self, timer), level = "info", fields(mac = %self.mac))]
    pub async fn add_timer(&mut self, timer: Timer) -> Result<(), ProtocolError> {
        let mut timers = self.get_timers().await?;
        if timers.len() >= usize::from(TIMER_SLOT_COUNT) {
            return Err(InvalidInputError::TooManyTimers {
                count: timers.len() + 1,
                max: TIMER_SLOT_COUNT,
            }
            .into());
        }
        timers.push(timer);
        self.set_timers(&timers).await
    }

    /// Removes one timer and shifts later timers down.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error when no timer is configured at `idx`,
    /// otherwise any exchange failure.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn remove_timer(&mut self, idx: u8) -> Result<Timer, ProtocolError> {
        let mut timers = self.get_timers().await?;
        if usize::from(idx) >= timers.len() {
            return Err(InvalidInputError::TimerIndexOutOfRange {
                index: idx,
                max: u8::try_from(timers.len()).unwrap_or(TIMER_SLOT_COUNT),
            }
            .into());
        }
        let removed = timers.remove(usize::from(idx));
        self.set_timers(&timers).await?;
        Ok(removed)
    }

    /// Clears every timer, then changes the device mode.
    ///
    /// Timer actions depend on the mode, so the schedule is cleared first.
    ///
    /// # Errors
    ///
    /// Returns an error when any exchange fails.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn set_mode(&mut self, dual_state: bool, inverse: bool) -> Result<(), ProtocolError> {
        let mut commands = schedule_commands(&[])?;
        commands.push(Command::SetMode(BotMode {
            dual_state,
            inverse,
        }));
        self.send_all(&commands).await.map(drop)
    }

    /// Sets the device clock to the host's local time.
    ///
    /// # Errors
    ///
    /// Returns an error when the exchange fails.
    #[instrument(skip(self), level = "info", fields(mac = %self.mac))]
    pub async fn set_current_timestamp(&mut self) -> Result<(), ProtocolError> {
        let command = TimeSyncHandler::command_for(TimeSyncHandler::now_local());
        self.send_all(&[command]).await.map(drop)
    }

    fn frame(&self, command: &Command) -> Vec<u8> {
        CommandEncoder::encode(command, self.token.as_ref())
    }

    async fn open_session(&self) -> Result<BotSession, ProtocolError> {
        Ok(BotSession::open(self.transport.as_ref(), self.mac, self.response_timeout).await?)
    }

    /// Runs commands in order over one connection, stopping at the first failure.
    async fn send_all(&self, commands: &[Command]) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut session = self.open_session().await?;
        let result = async {
            let mut responses = Vec::with_capacity(commands.len());
            for command in commands {
                responses.push(session.request(&self.frame(command)).await?);
            }
            Ok::<_, ProtocolError>(responses)
        }
        .await;
        session.finish(result).await
    }
}

/// Commands writing `timers` into the first slots and clearing the rest.
fn schedule_commands(timers: &[Timer]) -> Result<Vec<Command>, InvalidInputError> {
    let too_many = || InvalidInputError::TooManyTimers {
        count: timers.len(),
        max: TIMER_SLOT_COUNT,
    };
    let num_timer = u8::try_from(timers.len()).map_err(|_| too_many())?;
    if num_timer > TIMER_SLOT_COUNT {
        return Err(too_many());
    }

    let mut commands = Vec::with_capacity(usize::from(TIMER_SLOT_COUNT));
    for (index, timer) in (0..num_timer).zip(timers) {
        let slot = TimerSlot::new(index, num_timer)?;
        commands.push(Command::WriteTimer(TimerCodec::encode(timer, slot)));
    }
    for index in TimerIndex::all().skip(usize::from(num_timer)) {
        commands.push(Command::WriteTimer(TimerCodec::encode_delete(index, num_timer)));
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::handlers::{Action, StandardTimer, Weekdays};

    fn timer(hour: u8) -> Timer {
        Timer::Standard(
            StandardTimer::new(true, Weekdays::EMPTY, hour, 0, Action::Press)
                .expect("valid test timer"),
        )
    }

    #[test]
    fn empty_schedule_clears_every_slot() {
        let commands = schedule_commands(&[]).expect("empty schedule is valid");
        let selectors: Vec<u8> = commands
            .iter()
            .map(|command| match command {
                Command::WriteTimer(payload) => {
                    assert_eq!(&[0u8; 10], &payload[1..]);
                    payload[0]
                }
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert_eq!(vec![0x03, 0x13, 0x23, 0x33, 0x43], selectors);
    }

    #[test]
    fn partial_schedule_writes_then_clears() {
        let commands = schedule_commands(&[timer(6), timer(7)]).expect("two timers are valid");
        assert_eq!(5, commands.len());
        assert_matches!(
            commands[1],
            Command::WriteTimer(payload) if payload[..3] == [0x13, 0x02, 0x00] && payload[4] == 7
        );

        let cleared = TimerCodec::encode_delete(TimerIndex::new(2).expect("valid index"), 2);
        assert_matches!(commands[2], Command::WriteTimer(payload) if payload == cleared);
    }

    #[test]
    fn schedule_rejects_six_timers() {
        let timers = vec![timer(1); 6];
        assert_eq!(
            Err(InvalidInputError::TooManyTimers { count: 6, max: 5 }),
            schedule_commands(&timers)
        );
    }
}
