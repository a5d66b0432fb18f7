use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use super::model::{FoundDevice, MacAddress};
use super::transport::{AddressType, BleTransport, GattConnection, Notification};
use crate::error::{FixtureError, TransportError};
use crate::handlers::PasswordToken;
use crate::protocol::{self, COMMAND_PREFIX, CONTROL_HANDLE, TIMER_PAYLOAD_LEN, TOKEN_OPCODE_FLAG};
use crate::status::ActionStatus;

const FAKE_ADAPTER_NAME: &str = "fake";
const DEFAULT_BATTERY: u8 = 87;
const DEFAULT_FIRMWARE_TENTHS: u8 = 45;
const DEFAULT_RSSI: i16 = -60;
const SLOT_COUNT: usize = 5;
const CLOCK_MARKER: u8 = 0x01;
const CLOCK_PAYLOAD_LEN: usize = 9;
const TOKEN_LEN: usize = 4;
const UNSUPPORTED_CHARACTERISTICS: [&str; 2] = [
    "00002a00-0000-1000-8000-00805f9b34fb",
    "00002a19-0000-1000-8000-00805f9b34fb",
];

/// How a fixture peripheral behaves when probed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum FakeDeviceKind {
    /// A Switchbot reachable with random addressing.
    Switchbot,
    /// A Switchbot that refuses random-address connections.
    PublicOnly,
    /// A peripheral without the Switchbot characteristics.
    Other,
}

impl FromStr for FakeDeviceKind {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "switchbot" => Ok(Self::Switchbot),
            "public" => Ok(Self::PublicOnly),
            "other" => Ok(Self::Other),
            _ => Err(FixtureError::UnknownDeviceKind {
                value: value.to_string(),
            }),
        }
    }
}

/// One fixture peripheral.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FakeDeviceRecord {
    mac: MacAddress,
    name: String,
    kind: FakeDeviceKind,
}

/// Parsed fake device fixture: `mac|name|kind` records separated by `;`.
///
/// ```
/// use switchbot::DeviceFixture;
///
/// let fixture: DeviceFixture = "AA:BB:CC:DD:EE:01|Bot|switchbot;AA:BB:CC:DD:EE:02|Lamp|other".parse()?;
/// assert_eq!(2, fixture.len());
/// # Ok::<(), switchbot::FixtureError>(())
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeviceFixture {
    records: Vec<FakeDeviceRecord>,
}

impl DeviceFixture {
    /// Returns the number of fixture peripherals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the fixture declares no peripheral.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromStr for DeviceFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(FixtureError::EmptyFixture);
        }
        let records = value
            .split(';')
            .map(parse_device_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }
}

fn parse_device_record(raw_record: &str) -> Result<FakeDeviceRecord, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    let [mac, name, kind] = fields.as_slice() else {
        return Err(FixtureError::InvalidRecordFieldCount);
    };
    if mac.is_empty() || name.is_empty() || kind.is_empty() {
        return Err(FixtureError::EmptyRecordField);
    }

    Ok(FakeDeviceRecord {
        mac: MacAddress::parse(mac)?,
        name: (*name).to_string(),
        kind: kind.parse()?,
    })
}

/// Settings for constructing a fake BLE backend.
#[derive(Debug, Clone, Builder)]
pub struct FakeBackendConfig {
    devices: DeviceFixture,
    /// Password configured on every fixture Switchbot.
    #[builder(into)]
    password: Option<String>,
    /// Status byte returned for every command instead of simulating it.
    forced_status: Option<u8>,
    /// Never answer written frames.
    #[builder(default)]
    silent: bool,
    /// Delay before each answer is delivered.
    #[builder(default)]
    response_delay: Duration,
    /// Delay applied to discovery.
    #[builder(default)]
    discovery_delay: Duration,
    /// Fail every disconnect after recording it.
    #[builder(default)]
    fail_disconnect: bool,
}

/// Lifecycle events recorded by the fake backend.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FakeEvent {
    Connected {
        mac: MacAddress,
        address_type: AddressType,
    },
    Subscribed {
        mac: MacAddress,
        uuid: String,
    },
    Wrote {
        mac: MacAddress,
        handle: u16,
        frame: Vec<u8>,
    },
    Disconnected {
        mac: MacAddress,
    },
}

/// Observable state of one simulated Switchbot.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FakeBotSnapshot {
    pub battery: u8,
    pub firmware_tenths: u8,
    pub hold_seconds: u8,
    pub mode_byte: u8,
    pub timer_count: u8,
    /// Raw 11-byte slots as last written.
    pub timer_slots: [[u8; TIMER_PAYLOAD_LEN]; SLOT_COUNT],
    /// Local epoch seconds from the last clock sync.
    pub clock: Option<u64>,
    pub press_count: u32,
    pub arm_extended: bool,
}

impl FakeBotSnapshot {
    fn new() -> Self {
        Self {
            battery: DEFAULT_BATTERY,
            firmware_tenths: DEFAULT_FIRMWARE_TENTHS,
            hold_seconds: 0,
            mode_byte: 0,
            timer_count: 0,
            timer_slots: [[0; TIMER_PAYLOAD_LEN]; SLOT_COUNT],
            clock: None,
            press_count: 0,
            arm_extended: false,
        }
    }
}

#[derive(Debug)]
struct FakeState {
    events: Vec<FakeEvent>,
    bots: HashMap<MacAddress, FakeBotSnapshot>,
}

#[derive(Debug)]
struct Shared {
    records: Vec<FakeDeviceRecord>,
    token: Option<PasswordToken>,
    forced_status: Option<u8>,
    silent: bool,
    response_delay: Duration,
    discovery_delay: Duration,
    fail_disconnect: bool,
    state: Mutex<FakeState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: FakeEvent) {
        self.state().events.push(event);
    }

    fn device(&self, mac: MacAddress) -> Option<&FakeDeviceRecord> {
        self.records.iter().find(|record| record.mac == mac)
    }
}

/// In-process BLE transport simulating Switchbot peripherals.
///
/// Clones share the same simulated devices and event log.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    shared: Arc<Shared>,
}

impl FakeBackend {
    /// Creates a fake backend from explicit settings.
    #[must_use]
    pub fn new(config: FakeBackendConfig) -> Self {
        let bots = config
            .devices
            .records
            .iter()
            .filter(|record| record.kind != FakeDeviceKind::Other)
            .map(|record| (record.mac, FakeBotSnapshot::new()))
            .collect();

        Self {
            shared: Arc::new(Shared {
                records: config.devices.records,
                token: config.password.as_deref().map(PasswordToken::from_password),
                forced_status: config.forced_status,
                silent: config.silent,
                response_delay: config.response_delay,
                discovery_delay: config.discovery_delay,
                fail_disconnect: config.fail_disconnect,
                state: Mutex::new(FakeState {
                    events: Vec::new(),
                    bots,
                }),
            }),
        }
    }

    /// Returns every recorded lifecycle event in order.
    #[must_use]
    pub fn events(&self) -> Vec<FakeEvent> {
        self.shared.state().events.clone()
    }

    /// Returns every frame written to one device, in order.
    #[must_use]
    pub fn frames(&self, mac: MacAddress) -> Vec<Vec<u8>> {
        self.shared
            .state()
            .events
            .iter()
            .filter_map(|event| match event {
                FakeEvent::Wrote {
                    mac: written_to,
                    frame,
                    ..
                } if *written_to == mac => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the simulated state of one Switchbot.
    #[must_use]
    pub fn snapshot(&self, mac: MacAddress) -> Option<FakeBotSnapshot> {
        self.shared.state().bots.get(&mac).cloned()
    }
}

#[async_trait]
impl BleTransport for FakeBackend {
    #[instrument(skip(self), level = "debug")]
    async fn discover(&self, duration: Duration) -> Result<Vec<FoundDevice>, TransportError> {
        let delay = self.shared.discovery_delay.min(duration);
        if !delay.is_zero() {
            sleep(delay).await;
        }

        Ok(self
            .shared
            .records
            .iter()
            .map(|record| {
                FoundDevice::new(
                    FAKE_ADAPTER_NAME.to_string(),
                    record.mac,
                    Some(record.name.clone()),
                    Some(DEFAULT_RSSI),
                )
            })
            .collect())
    }

    #[instrument(skip(self), level = "debug", fields(%mac, %address_type))]
    async fn connect(
        &self,
        mac: MacAddress,
        address_type: AddressType,
    ) -> Result<Box<dyn GattConnection>, TransportError> {
        let Some(record) = self.shared.device(mac) else {
            return Err(TransportError::PeripheralNotFound {
                mac: mac.to_string(),
                timeout: self.shared.discovery_delay,
            });
        };
        if record.kind == FakeDeviceKind::PublicOnly && address_type == AddressType::Random {
            return Err(TransportError::ConnectionRefused {
                mac: mac.to_string(),
                address_type,
            });
        }

        let characteristics = match record.kind {
            FakeDeviceKind::Other => UNSUPPORTED_CHARACTERISTICS
                .iter()
                .map(|uuid| (*uuid).to_string())
                .collect(),
            FakeDeviceKind::Switchbot | FakeDeviceKind::PublicOnly => {
                protocol::identification_uuids()
                    .chain(UNSUPPORTED_CHARACTERISTICS.iter().copied())
                    .map(str::to_string)
                    .collect()
            }
        };
        self.shared.record(FakeEvent::Connected { mac, address_type });
        info!("fake peripheral connected");

        Ok(Box::new(FakeConnection {
            mac,
            shared: Arc::clone(&self.shared),
            characteristics,
            sink: None,
        }))
    }
}

struct FakeConnection {
    mac: MacAddress,
    shared: Arc<Shared>,
    characteristics: BTreeSet<String>,
    sink: Option<mpsc::Sender<Notification>>,
}

impl FakeConnection {
    fn respond(&self, frame: &[u8]) -> Option<Vec<u8>> {
        if self.shared.silent {
            return None;
        }
        if let Some(status) = self.shared.forced_status {
            return Some(vec![status]);
        }

        let mut state = self.shared.state();
        let bot = state.bots.get_mut(&self.mac)?;
        Some(simulate(bot, self.shared.token.as_ref(), frame))
    }
}

#[async_trait]
impl GattConnection for FakeConnection {
    async fn discover_characteristics(&mut self) -> Result<BTreeSet<String>, TransportError> {
        Ok(self.characteristics.clone())
    }

    async fn subscribe(
        &mut self,
        uuid: &str,
        sink: mpsc::Sender<Notification>,
    ) -> Result<(), TransportError> {
        let uuid = uuid.to_ascii_lowercase();
        if !self.characteristics.contains(&uuid) {
            return Err(TransportError::UnknownCharacteristic { uuid });
        }
        self.shared.record(FakeEvent::Subscribed {
            mac: self.mac,
            uuid,
        });
        self.sink = Some(sink);
        Ok(())
    }

    async fn write_characteristic(
        &mut self,
        handle: u16,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let control_uuid =
            protocol::endpoint_metadata(protocol::EndpointId::ControlCharacteristic).uuid();
        if handle != CONTROL_HANDLE || !self.characteristics.contains(control_uuid) {
            return Err(TransportError::UnknownHandle { handle });
        }
        let Some(sink) = self.sink.clone() else {
            return Err(TransportError::NotSubscribed);
        };

        self.shared.record(FakeEvent::Wrote {
            mac: self.mac,
            handle,
            frame: value.to_vec(),
        });
        let Some(response) = self.respond(value) else {
            debug!("fake peripheral stays silent");
            return Ok(());
        };

        let notification = Notification {
            uuid: protocol::notify_uuid().to_string(),
            value: response,
        };
        let delay = self.shared.response_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            if sink.send(notification).await.is_err() {
                debug!("session closed before the fake response was delivered");
            }
        });
        Ok(())
    }

    async fn disconnect(self: Box<Self>) -> Result<(), TransportError> {
        self.shared.record(FakeEvent::Disconnected { mac: self.mac });
        if self.shared.fail_disconnect {
            return Err(TransportError::Disconnected {
                mac: self.mac.to_string(),
            });
        }
        Ok(())
    }
}

fn status(status: ActionStatus) -> Vec<u8> {
    vec![status.code()]
}

/// Applies one command frame to a simulated device and returns its answer.
fn simulate(bot: &mut FakeBotSnapshot, token: Option<&PasswordToken>, frame: &[u8]) -> Vec<u8> {
    let [prefix, opcode, rest @ ..] = frame else {
        return status(ActionStatus::UnableToRespond);
    };
    if *prefix != COMMAND_PREFIX {
        return status(ActionStatus::UnableToRespond);
    }

    let payload = if opcode & TOKEN_OPCODE_FLAG != 0 {
        let Some((sent, payload)) = rest.split_at_checked(TOKEN_LEN) else {
            return status(ActionStatus::UnableToRespond);
        };
        match token {
            None => return status(ActionStatus::DeviceUnencrypted),
            Some(expected) if expected.as_bytes().as_slice() != sent => {
                return status(ActionStatus::WrongPassword);
            }
            Some(_) => payload,
        }
    } else {
        if token.is_some() {
            return status(ActionStatus::DeviceEncrypted);
        }
        rest
    };

    match (opcode & !TOKEN_OPCODE_FLAG, payload) {
        (0x01, []) => {
            bot.press_count += 1;
            status(ActionStatus::Complete)
        }
        (0x01, [state @ (0x01 | 0x02)]) => {
            bot.arm_extended = *state == 0x01;
            status(ActionStatus::Complete)
        }
        (0x02, []) => vec![
            ActionStatus::Complete.code(),
            bot.battery,
            bot.firmware_tenths,
            0,
            0,
            0,
            0,
            0,
            bot.timer_count,
            bot.mode_byte,
            bot.hold_seconds,
        ],
        (0x03, [0x64, config]) => {
            bot.mode_byte = *config;
            status(ActionStatus::Complete)
        }
        (0x08, [selector]) => match slot_for(*selector) {
            Some(slot) => {
                let mut response = bot.timer_slots[slot];
                response[0] = ActionStatus::Complete.code();
                response[1] = bot.timer_count;
                response.to_vec()
            }
            None => status(ActionStatus::UnableToRespond),
        },
        (0x09, [CLOCK_MARKER, clock @ ..]) if payload.len() == CLOCK_PAYLOAD_LEN => {
            let mut seconds = [0u8; 8];
            seconds.copy_from_slice(clock);
            bot.clock = Some(u64::from_be_bytes(seconds));
            status(ActionStatus::Complete)
        }
        (0x09, timer) if timer.len() == TIMER_PAYLOAD_LEN => match slot_for(timer[0]) {
            Some(slot) => {
                bot.timer_slots[slot].copy_from_slice(timer);
                bot.timer_count = timer[1];
                status(ActionStatus::Complete)
            }
            None => status(ActionStatus::UnableToRespond),
        },
        (0x0F, [0x08, seconds]) => {
            bot.hold_seconds = *seconds;
            status(ActionStatus::Complete)
        }
        _ => status(ActionStatus::UnableToRespond),
    }
}

fn slot_for(selector: u8) -> Option<usize> {
    let index = usize::from(selector.checked_sub(3)? / 16);
    (selector % 16 == 3 && index < SLOT_COUNT).then_some(index)
}
