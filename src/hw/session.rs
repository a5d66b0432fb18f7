use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, instrument, trace, warn};

use super::model::MacAddress;
use super::transport::{AddressType, BleTransport, GattConnection, Notification};
use crate::error::{ProtocolError, TransportError};
use crate::protocol::{self, CONTROL_HANDLE};
use crate::status::NotificationHandler;
use crate::utils::format_hex;

/// Capacity of the per-session notification hand-off.
const NOTIFICATION_SLOT: usize = 1;

/// One connect, subscribe, request..., disconnect cycle against a Switchbot.
///
/// A session is consumed by [`BotSession::finish`], which always disconnects.
/// Dropping an unfinished session schedules a disconnect on the current
/// runtime.
pub(crate) struct BotSession {
    mac: MacAddress,
    connection: Option<Box<dyn GattConnection>>,
    notifications: mpsc::Receiver<Notification>,
    response_timeout: Duration,
}

impl BotSession {
    /// Connects with random addressing and subscribes to the response characteristic.
    #[instrument(skip(transport), level = "debug", fields(%mac, ?response_timeout))]
    pub(crate) async fn open(
        transport: &dyn BleTransport,
        mac: MacAddress,
        response_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut connection = transport.connect(mac, AddressType::Random).await?;
        let (sender, notifications) = mpsc::channel(NOTIFICATION_SLOT);

        if let Err(error) = connection.subscribe(protocol::notify_uuid(), sender).await {
            if let Err(disconnect_error) = connection.disconnect().await {
                warn!(
                    error = %disconnect_error,
                    "failed to disconnect after subscribe failure"
                );
            }
            return Err(error);
        }
        debug!("subscribed to response notifications");

        Ok(Self {
            mac,
            connection: Some(connection),
            notifications,
            response_timeout,
        })
    }

    /// Writes one frame and waits for the notification answering it.
    ///
    /// Returns the full notification payload once its status byte reports
    /// completion.
    #[instrument(skip(self, frame), level = "debug", fields(mac = %self.mac, frame = %format_hex(frame)))]
    pub(crate) async fn request(&mut self, frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let mac = self.mac;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| TransportError::Disconnected {
                mac: mac.to_string(),
            })?;

        while let Ok(stale) = self.notifications.try_recv() {
            debug!(payload = %format_hex(&stale.value), "discarding stale notification");
        }

        connection
            .write_characteristic(CONTROL_HANDLE, frame)
            .await?;

        let notifications = &mut self.notifications;
        let response = timeout(self.response_timeout, async {
            loop {
                let notification = notifications
                    .recv()
                    .await
                    .ok_or(TransportError::NotificationChannelClosed)?;
                if notification.uuid.eq_ignore_ascii_case(protocol::notify_uuid()) {
                    return Ok::<_, TransportError>(notification.value);
                }
                trace!(uuid = %notification.uuid, "ignoring notification from another characteristic");
            }
        })
        .await
        .map_err(|_elapsed| TransportError::ResponseTimeout {
            timeout: self.response_timeout,
        })??;

        debug!(response = %format_hex(&response), "received response");
        NotificationHandler::ensure_complete(&response)?;
        Ok(response)
    }

    /// Disconnects and merges the disconnect outcome into `result`.
    ///
    /// A failed disconnect after a successful operation is reported as a
    /// transport failure. When the operation already failed its error wins and
    /// the disconnect failure is only logged.
    #[instrument(skip(self, result), level = "debug", fields(mac = %self.mac, ok = result.is_ok()))]
    pub(crate) async fn finish<T>(
        mut self,
        result: Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let disconnected = match self.connection.take() {
            Some(connection) => connection.disconnect().await,
            None => Ok(()),
        };

        match (result, disconnected) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_value), Err(error)) => Err(error.into()),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(disconnect_error)) => {
                warn!(
                    error = %disconnect_error,
                    "failed to disconnect after operation error"
                );
                Err(error)
            }
        }
    }
}

impl Drop for BotSession {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let mac = self.mac;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(error) = connection.disconnect().await {
                        warn!(%mac, %error, "failed to disconnect dropped session");
                    }
                });
            }
            Err(_error) => warn!(%mac, "session dropped outside a runtime; connection left open"),
        }
    }
}
