mod btleplug_backend;
mod fake_backend;
mod hardware;
mod model;
mod scan_cache;
pub(crate) mod session;
mod transport;

pub use self::fake_backend::{
    DeviceFixture, FakeBackend, FakeBackendConfig, FakeBotSnapshot, FakeDeviceKind,
    FakeDeviceRecord, FakeEvent,
};
pub use self::hardware::HardwareBackend;
pub use self::model::{FoundDevice, MacAddress};
pub use self::scan_cache::ScanCache;
pub use self::transport::{AddressType, BleTransport, GattConnection, Notification};
