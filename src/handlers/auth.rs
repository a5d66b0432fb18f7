use std::fmt;

/// Four-byte authentication token derived from a device password.
///
/// The token is the big-endian CRC32 checksum of the UTF-8 password and is
/// inserted after the sub-opcode of every command sent to a protected device.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct PasswordToken([u8; 4]);

impl PasswordToken {
    /// Derives the token for a password.
    ///
    /// ```
    /// use switchbot::PasswordToken;
    ///
    /// let token = PasswordToken::from_password("secret");
    /// assert_eq!(&[0x5C, 0xA2, 0xE8, 0xE5], token.as_bytes());
    /// ```
    #[must_use]
    pub fn from_password(password: &str) -> Self {
        Self(crc32fast::hash(password.as_bytes()).to_be_bytes())
    }

    /// Returns the raw token bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Debug for PasswordToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordToken(<redacted>)")
    }
}
