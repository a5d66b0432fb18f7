use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::InvalidInputError;

const MAC_OCTETS: usize = 6;

/// A validated Bluetooth device address.
///
/// Accepts six hex pairs separated by `:` or `-` (in either case) and always
/// displays as upper-case, colon-separated pairs.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, SerializeDisplay, DeserializeFromStr)]
pub struct MacAddress([u8; MAC_OCTETS]);

impl MacAddress {
    /// Parses and validates an address.
    ///
    /// ```
    /// use switchbot::MacAddress;
    ///
    /// let mac = MacAddress::parse("e4-f0-2b-0a-11-9c")?;
    /// assert_eq!("E4:F0:2B:0A:11:9C", mac.to_string());
    /// assert!(MacAddress::parse("E4:F0:2B:0A:11").is_err());
    /// # Ok::<(), switchbot::InvalidInputError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than six separated hex pairs.
    pub fn parse(value: &str) -> Result<Self, InvalidInputError> {
        let invalid = || InvalidInputError::InvalidMacAddress {
            value: value.to_string(),
        };

        let pairs: Vec<&str> = value.split([':', '-']).collect();
        if pairs.len() != MAC_OCTETS {
            return Err(invalid());
        }

        let mut octets = [0u8; MAC_OCTETS];
        for (octet, pair) in octets.iter_mut().zip(pairs) {
            if pair.len() != 2 || !pair.bytes().all(|byte| byte.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }

    /// Returns the raw address octets.
    #[must_use]
    pub fn octets(&self) -> [u8; MAC_OCTETS] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = InvalidInputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl From<[u8; MAC_OCTETS]> for MacAddress {
    fn from(octets: [u8; MAC_OCTETS]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

/// A peripheral seen during discovery.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FoundDevice {
    adapter_name: String,
    mac: MacAddress,
    local_name: Option<String>,
    rssi: Option<i16>,
}

impl FoundDevice {
    /// Creates a new discovered-device record.
    pub(crate) fn new(
        adapter_name: String,
        mac: MacAddress,
        local_name: Option<String>,
        rssi: Option<i16>,
    ) -> Self {
        Self {
            adapter_name,
            mac,
            local_name,
            rssi,
        }
    }

    /// Returns the adapter name used to discover this device.
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Returns the device address.
    #[must_use]
    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    /// Returns the advertised local name, if present.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// Returns the latest observed RSSI value, if present.
    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("AA:BB:CC:DD:EE:FF", "AA:BB:CC:DD:EE:FF")]
    #[case("aa:bb:cc:dd:ee:ff", "AA:BB:CC:DD:EE:FF")]
    #[case("01-23-45-67-89-ab", "01:23:45:67:89:AB")]
    #[case("01:23-45:67-89:ab", "01:23:45:67:89:AB")]
    fn parse_normalises_display(#[case] raw: &str, #[case] expected: &str) {
        let mac = MacAddress::parse(raw).expect("address should parse");
        assert_eq!(expected, mac.to_string());
    }

    #[rstest]
    #[case("")]
    #[case("AA:BB:CC:DD:EE")]
    #[case("AA:BB:CC:DD:EE:FF:00")]
    #[case("AABBCCDDEEFF")]
    #[case("AA:BB:CC:DD:EE:GG")]
    #[case("A:BB:CC:DD:EE:FFF")]
    #[case("+A:BB:CC:DD:EE:FF")]
    #[case("AA BB CC DD EE FF")]
    fn parse_rejects_malformed_addresses(#[case] raw: &str) {
        assert_matches!(
            MacAddress::parse(raw),
            Err(InvalidInputError::InvalidMacAddress { value }) if value == raw
        );
    }

    #[test]
    fn addresses_serialize_as_strings() {
        let mac = MacAddress::from([0xE4, 0xF0, 0x2B, 0x0A, 0x11, 0x9C]);
        assert_eq!(
            "\"E4:F0:2B:0A:11:9C\"",
            serde_json::to_string(&mac).expect("address should serialize")
        );
    }
}
