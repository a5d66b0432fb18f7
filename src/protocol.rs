use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// Fixed first byte of every command frame.
pub(crate) const COMMAND_PREFIX: u8 = 0x57;

/// Flag OR'd into the sub-opcode when a password token follows it.
pub(crate) const TOKEN_OPCODE_FLAG: u8 = 0x10;

/// GATT handle of the control characteristic that accepts command frames.
pub const CONTROL_HANDLE: u16 = 0x16;

/// Number of on-device timer slots.
pub const TIMER_SLOT_COUNT: u8 = 5;

/// Length of one encoded timer slot and of a timer read response.
pub const TIMER_PAYLOAD_LEN: usize = 11;

/// Default time to wait for the notification answering one command frame.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Known Switchbot GATT endpoints.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum EndpointId {
    /// Characteristic accepting command frames (handle `0x16`).
    #[strum(to_string = "control_characteristic")]
    ControlCharacteristic,
    /// Characteristic delivering command responses as notifications.
    #[strum(to_string = "notify_characteristic")]
    NotifyCharacteristic,
}

/// Descriptive metadata for one protocol endpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct EndpointMetadata {
    name: &'static str,
    uuid: &'static str,
    handle: Option<u16>,
}

impl EndpointMetadata {
    /// Human-readable endpoint name.
    pub(crate) fn name(self) -> &'static str {
        self.name
    }

    /// Endpoint UUID.
    pub(crate) fn uuid(self) -> &'static str {
        self.uuid
    }

    /// Fixed attribute handle, when the protocol addresses the endpoint by handle.
    pub(crate) fn handle(self) -> Option<u16> {
        self.handle
    }
}

/// Endpoint metadata keyed by typed endpoint IDs.
pub(crate) static ENDPOINTS_BY_ID: LazyLock<HashMap<EndpointId, EndpointMetadata>> =
    LazyLock::new(|| {
        EndpointId::iter()
            .map(|endpoint| (endpoint, metadata_for(endpoint)))
            .collect()
    });

/// Returns metadata for one endpoint.
pub(crate) fn endpoint_metadata(endpoint: EndpointId) -> EndpointMetadata {
    *ENDPOINTS_BY_ID
        .get(&endpoint)
        .unwrap_or(&metadata_for(endpoint))
}

/// Resolves the endpoint bound to a GATT handle.
pub(crate) fn endpoint_for_handle(handle: u16) -> Option<EndpointId> {
    EndpointId::iter().find(|endpoint| endpoint_metadata(*endpoint).handle() == Some(handle))
}

/// Resolves the endpoint with a given UUID, ignoring case.
pub(crate) fn endpoint_for_uuid(uuid: &str) -> Option<EndpointId> {
    EndpointId::iter().find(|endpoint| {
        endpoint_metadata(*endpoint)
            .uuid()
            .eq_ignore_ascii_case(uuid)
    })
}

/// UUIDs that must all be present for a peripheral to be treated as a Switchbot.
pub(crate) fn identification_uuids() -> impl Iterator<Item = &'static str> {
    EndpointId::iter().map(|endpoint| endpoint_metadata(endpoint).uuid())
}

/// UUID of the characteristic carrying command responses.
pub(crate) fn notify_uuid() -> &'static str {
    endpoint_metadata(EndpointId::NotifyCharacteristic).uuid()
}

fn metadata_for(endpoint: EndpointId) -> EndpointMetadata {
    match endpoint {
        EndpointId::ControlCharacteristic => EndpointMetadata {
            name: "Switchbot control",
            uuid: "cba20002-224d-11e6-9fb8-0002a5d5c51b",
            handle: Some(CONTROL_HANDLE),
        },
        EndpointId::NotifyCharacteristic => EndpointMetadata {
            name: "Switchbot response notify",
            uuid: "cba20003-224d-11e6-9fb8-0002a5d5c51b",
            handle: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn control_handle_resolves_to_control_characteristic() {
        assert_eq!(
            Some(EndpointId::ControlCharacteristic),
            endpoint_for_handle(0x16)
        );
        assert_eq!(None, endpoint_for_handle(0x17));
    }

    #[test]
    fn uuid_lookup_ignores_case() {
        assert_eq!(
            Some(EndpointId::NotifyCharacteristic),
            endpoint_for_uuid("CBA20003-224D-11E6-9FB8-0002A5D5C51B")
        );
    }

    #[test]
    fn identification_requires_both_vendor_characteristics() {
        let mut uuids: Vec<&str> = identification_uuids().collect();
        uuids.sort_unstable();
        assert_eq!(
            vec![
                "cba20002-224d-11e6-9fb8-0002a5d5c51b",
                "cba20003-224d-11e6-9fb8-0002a5d5c51b",
            ],
            uuids
        );
    }
}
