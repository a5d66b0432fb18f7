use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    AddressType as BtleAddressType, BDAddr, Central, Characteristic, Manager as _,
    Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_stream::StreamExt;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, trace};

use super::model::{FoundDevice, MacAddress};
use super::transport::{AddressType, BleTransport, GattConnection, Notification};
use crate::error::TransportError;
use crate::protocol;

/// Maximum time spent scanning for a peripheral before connecting to it.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// BLE transport backed by `btleplug`.
#[derive(Debug)]
pub(crate) struct BtleplugBackend {
    manager: Manager,
    discovery_timeout: Duration,
}

impl BtleplugBackend {
    /// Creates the real BLE backend.
    pub(crate) async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        Ok(Self {
            manager,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        })
    }

    #[instrument(skip(self), level = "trace")]
    async fn adapters(&self) -> Result<Vec<AdapterHandle>, TransportError> {
        let adapters = self.manager.adapters().await?;
        if adapters.is_empty() {
            return Err(TransportError::NoAdapters);
        }

        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let name = adapter.adapter_info().await?;
            handles.push(AdapterHandle { adapter, name });
        }
        Ok(handles)
    }

    /// Scans all adapters until a peripheral with `mac` shows up.
    #[instrument(skip(self, adapters), level = "debug", fields(%mac))]
    async fn find_peripheral(
        &self,
        adapters: &[AdapterHandle],
        mac: MacAddress,
    ) -> Result<(Peripheral, Option<BtleAddressType>), TransportError> {
        let address = BDAddr::from(mac.octets());
        for handle in adapters {
            handle.adapter.start_scan(ScanFilter::default()).await?;
        }

        let search = async {
            loop {
                for handle in adapters {
                    for peripheral in handle.adapter.peripherals().await? {
                        if peripheral.address() != address {
                            continue;
                        }
                        let address_type = peripheral
                            .properties()
                            .await?
                            .and_then(|properties| properties.address_type);
                        return Ok::<_, TransportError>((peripheral, address_type));
                    }
                }
                sleep(SCAN_POLL_INTERVAL).await;
            }
        };
        let found = timeout(self.discovery_timeout, search).await;
        stop_scans(adapters).await;

        found.map_err(|_elapsed| TransportError::PeripheralNotFound {
            mac: mac.to_string(),
            timeout: self.discovery_timeout,
        })?
    }
}

#[async_trait]
impl BleTransport for BtleplugBackend {
    #[instrument(skip(self), level = "debug")]
    async fn discover(&self, duration: Duration) -> Result<Vec<FoundDevice>, TransportError> {
        let adapters = self.adapters().await?;
        info!(adapter_count = adapters.len(), "starting bounded BLE scan");
        for handle in &adapters {
            handle.adapter.start_scan(ScanFilter::default()).await?;
        }
        sleep(duration).await;
        stop_scans(&adapters).await;

        let mut devices = Vec::new();
        for handle in &adapters {
            for peripheral in handle.adapter.peripherals().await? {
                let Some(properties) = peripheral.properties().await? else {
                    continue;
                };
                devices.push(FoundDevice::new(
                    handle.name.clone(),
                    MacAddress::from(properties.address.into_inner()),
                    properties.local_name,
                    properties.rssi,
                ));
            }
        }
        debug!(device_count = devices.len(), "scan finished");
        Ok(devices)
    }

    #[instrument(skip(self), level = "debug", fields(%mac, %address_type))]
    async fn connect(
        &self,
        mac: MacAddress,
        address_type: AddressType,
    ) -> Result<Box<dyn GattConnection>, TransportError> {
        let adapters = self.adapters().await?;
        let (peripheral, advertised_type) = self.find_peripheral(&adapters, mac).await?;

        if let Some(advertised_type) = advertised_type
            && !address_types_match(advertised_type, address_type)
        {
            return Err(TransportError::ConnectionRefused {
                mac: mac.to_string(),
                address_type,
            });
        }

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;
        info!("connected to peripheral");

        Ok(Box::new(BtleplugConnection {
            mac,
            peripheral,
            forwarder: None,
        }))
    }
}

struct BtleplugConnection {
    mac: MacAddress,
    peripheral: Peripheral,
    forwarder: Option<DropGuard>,
}

impl BtleplugConnection {
    fn characteristic(&self, uuid: &str) -> Result<Characteristic, TransportError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| characteristic.uuid.to_string().eq_ignore_ascii_case(uuid))
            .ok_or_else(|| TransportError::UnknownCharacteristic {
                uuid: uuid.to_string(),
            })
    }
}

#[async_trait]
impl GattConnection for BtleplugConnection {
    async fn discover_characteristics(&mut self) -> Result<BTreeSet<String>, TransportError> {
        Ok(self
            .peripheral
            .characteristics()
            .iter()
            .map(|characteristic| characteristic.uuid.to_string().to_ascii_lowercase())
            .collect())
    }

    #[instrument(skip(self, sink), level = "debug", fields(mac = %self.mac))]
    async fn subscribe(
        &mut self,
        uuid: &str,
        sink: mpsc::Sender<Notification>,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(uuid)?;
        let mut notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&characteristic).await?;

        let cancel = CancellationToken::new();
        let stopped = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = stopped.cancelled() => break,
                    maybe_notification = notifications.next() => {
                        let Some(notification) = maybe_notification else {
                            trace!("notification stream closed");
                            break;
                        };
                        if notification.uuid != characteristic.uuid {
                            continue;
                        }
                        let forwarded = Notification {
                            uuid: notification.uuid.to_string(),
                            value: notification.value,
                        };
                        if sink.send(forwarded).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.forwarder = Some(cancel.drop_guard());
        Ok(())
    }

    #[instrument(skip(self, value), level = "trace", fields(mac = %self.mac, value_len = value.len()))]
    async fn write_characteristic(
        &mut self,
        handle: u16,
        value: &[u8],
    ) -> Result<(), TransportError> {
        if self.forwarder.is_none() {
            return Err(TransportError::NotSubscribed);
        }
        let endpoint =
            protocol::endpoint_for_handle(handle).ok_or(TransportError::UnknownHandle { handle })?;
        let uuid = protocol::endpoint_metadata(endpoint).uuid();
        let characteristic = self
            .characteristic(uuid)
            .map_err(|_error| TransportError::MissingEndpoint { endpoint })?;

        self.peripheral
            .write(&characteristic, value, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(mac = %self.mac))]
    async fn disconnect(mut self: Box<Self>) -> Result<(), TransportError> {
        drop(self.forwarder.take());
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct AdapterHandle {
    adapter: Adapter,
    name: String,
}

async fn stop_scans(adapters: &[AdapterHandle]) {
    for handle in adapters {
        if let Err(error) = handle.adapter.stop_scan().await {
            debug!(?error, "failed to stop adapter scan cleanly");
        }
    }
}

fn address_types_match(advertised: BtleAddressType, requested: AddressType) -> bool {
    matches!(
        (advertised, requested),
        (BtleAddressType::Public, AddressType::Public)
            | (BtleAddressType::Random, AddressType::Random)
    )
}
