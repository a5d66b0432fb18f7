use std::sync::Arc;

use tracing::info;

use super::btleplug_backend::BtleplugBackend;
use super::fake_backend::{FakeBackend, FakeBackendConfig};
use super::transport::BleTransport;
use crate::error::TransportError;

/// Runtime BLE backend selection.
#[derive(Debug, Clone)]
pub enum HardwareBackend {
    /// The platform Bluetooth stack through `btleplug`.
    Real,
    /// Simulated peripherals.
    Fake(FakeBackendConfig),
}

impl HardwareBackend {
    /// Builds the transport for the selected backend.
    ///
    /// ```
    /// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    /// use switchbot::{FakeBackendConfig, HardwareBackend};
    ///
    /// let config = FakeBackendConfig::builder()
    ///     .devices("AA:BB:CC:DD:EE:01|Bot|switchbot".parse()?)
    ///     .build();
    /// let transport = HardwareBackend::Fake(config).into_transport().await?;
    /// # let _ = transport;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the platform BLE manager cannot be created.
    pub async fn into_transport(self) -> Result<Arc<dyn BleTransport>, TransportError> {
        let transport: Arc<dyn BleTransport> = match self {
            Self::Real => Arc::new(BtleplugBackend::new().await?),
            Self::Fake(config) => {
                info!("using fake BLE backend");
                Arc::new(FakeBackend::new(config))
            }
        };
        Ok(transport)
    }
}
