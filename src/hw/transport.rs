use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::model::{FoundDevice, MacAddress};
use crate::error::TransportError;

/// BLE address type used when connecting.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, derive_more::Display)]
pub enum AddressType {
    #[display("public")]
    Public,
    #[display("random")]
    Random,
}

/// One notification delivered by a connected peripheral.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Notification {
    /// UUID of the notifying characteristic (lower case).
    pub uuid: String,
    pub value: Vec<u8>,
}

/// Transport collaborator able to discover and connect to peripherals.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Lists peripherals seen during a bounded discovery window.
    async fn discover(&self, duration: Duration) -> Result<Vec<FoundDevice>, TransportError>;

    /// Connects to one peripheral.
    async fn connect(
        &self,
        mac: MacAddress,
        address_type: AddressType,
    ) -> Result<Box<dyn GattConnection>, TransportError>;
}

/// A live connection to one peripheral.
#[async_trait]
pub trait GattConnection: Send + Sync {
    /// Returns the lower-case UUIDs of every discovered characteristic.
    async fn discover_characteristics(&mut self) -> Result<BTreeSet<String>, TransportError>;

    /// Subscribes to a characteristic and forwards its notifications to `sink`.
    async fn subscribe(
        &mut self,
        uuid: &str,
        sink: mpsc::Sender<Notification>,
    ) -> Result<(), TransportError>;

    /// Writes a value to the characteristic bound to an attribute handle.
    async fn write_characteristic(&mut self, handle: u16, value: &[u8])
    -> Result<(), TransportError>;

    /// Closes the connection.
    async fn disconnect(self: Box<Self>) -> Result<(), TransportError>;
}
