use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{ProtocolError, TransportError};
use crate::hw::{AddressType, BleTransport, FoundDevice, MacAddress};
use crate::protocol;

/// Default length of the discovery window.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(5);

/// Classification of one discovered peripheral.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Classification {
    pub mac: MacAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i16>,
    pub is_switchbot: bool,
    /// Whether the answer came from the `known` mapping instead of a probe.
    pub cached: bool,
}

/// Finds Switchbots among nearby peripherals.
pub struct Scanner {
    transport: Arc<dyn BleTransport>,
    duration: Duration,
}

impl Scanner {
    /// Creates a scanner using the default discovery window.
    #[must_use]
    pub fn new(transport: Arc<dyn BleTransport>) -> Self {
        Self {
            transport,
            duration: DEFAULT_SCAN_DURATION,
        }
    }

    /// Overrides the discovery window.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Returns the addresses believed to be Switchbots.
    ///
    /// Addresses present in `known` are trusted without connecting.
    ///
    /// ```
    /// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    /// use std::collections::HashMap;
    ///
    /// use switchbot::{FakeBackendConfig, HardwareBackend, Scanner};
    ///
    /// let config = FakeBackendConfig::builder()
    ///     .devices("AA:BB:CC:DD:EE:01|Bot|switchbot;AA:BB:CC:DD:EE:02|Lamp|other".parse()?)
    ///     .build();
    /// let transport = HardwareBackend::Fake(config).into_transport().await?;
    /// let found = Scanner::new(transport).scan(&HashMap::new()).await?;
    /// assert_eq!(1, found.len());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when discovery fails or a connected peripheral cannot
    /// be inspected. A peripheral that cannot be connected to is not a
    /// Switchbot.
    pub async fn scan(
        &self,
        known: &HashMap<MacAddress, bool>,
    ) -> Result<Vec<MacAddress>, ProtocolError> {
        Ok(self
            .classify(known)
            .await?
            .into_iter()
            .filter(|classification| classification.is_switchbot)
            .map(|classification| classification.mac)
            .collect())
    }

    /// Classifies every discovered peripheral.
    ///
    /// # Errors
    ///
    /// Returns an error when discovery fails or a connected peripheral cannot
    /// be inspected. A peripheral that cannot be connected to is not a
    /// Switchbot.
    #[instrument(skip(self, known), level = "info", fields(known = known.len(), duration = ?self.duration))]
    pub async fn classify(
        &self,
        known: &HashMap<MacAddress, bool>,
    ) -> Result<Vec<Classification>, ProtocolError> {
        let mut devices = self.transport.discover(self.duration).await?;
        devices.sort_by_key(FoundDevice::mac);
        devices.dedup_by_key(|device| device.mac());
        info!(device_count = devices.len(), "discovery finished");

        let mut classifications = Vec::with_capacity(devices.len());
        for device in devices {
            let (is_switchbot, cached) = match known.get(&device.mac()) {
                Some(is_switchbot) => (*is_switchbot, true),
                None => (self.probe(device.mac()).await?, false),
            };
            debug!(mac = %device.mac(), is_switchbot, cached, "classified peripheral");
            classifications.push(Classification {
                mac: device.mac(),
                name: device.local_name().map(str::to_string),
                rssi: device.rssi(),
                is_switchbot,
                cached,
            });
        }
        Ok(classifications)
    }

    /// Connects transiently and checks for both vendor characteristics.
    #[instrument(skip(self), level = "debug", fields(%mac))]
    async fn probe(&self, mac: MacAddress) -> Result<bool, TransportError> {
        let mut connection = match self.transport.connect(mac, AddressType::Random).await {
            Ok(connection) => connection,
            Err(
                error @ (TransportError::ConnectionRefused { .. }
                | TransportError::PeripheralNotFound { .. }
                | TransportError::Ble(_)),
            ) => {
                debug!(%error, "connect failed; not a switchbot");
                return Ok(false);
            }
            Err(error) => return Err(error),
        };

        let discovered = connection.discover_characteristics().await;
        if let Err(error) = connection.disconnect().await {
            warn!(%error, "failed to disconnect after probing");
        }
        let characteristics = discovered?;

        Ok(protocol::identification_uuids().all(|uuid| characteristics.contains(uuid)))
    }
}
