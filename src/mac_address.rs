//! Bluetooth device address type.
//!
//! The target scale is identified by its 6-byte hardware address, supplied on
//! the command line in the usual colon-separated form. HCI advertising reports
//! carry the address in reversed (little-endian) byte order, so there is a
//! dedicated constructor for bytes taken off the wire.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A Bluetooth MAC address stored as a compact 6-byte array, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Build an address from the byte order used inside HCI advertising
    /// reports (least significant byte first).
    pub fn from_hci_bytes(mut bytes: [u8; 6]) -> Self {
        bytes.reverse();
        MacAddress(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Errors returned when parsing a MAC address string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseMacError {
    #[error("invalid MAC address: expected 6 colon-separated octets, got {0}")]
    WrongOctetCount(usize),
    #[error("invalid MAC address: '{0}' is not a two-digit hex octet")]
    BadOctet(String),
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut count = 0;

        for part in s.split(':') {
            if count == 6 {
                return Err(ParseMacError::WrongOctetCount(count + 1));
            }
            if part.len() != 2 {
                return Err(ParseMacError::BadOctet(part.to_string()));
            }
            bytes[count] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseMacError::BadOctet(part.to_string()))?;
            count += 1;
        }

        if count != 6 {
            return Err(ParseMacError::WrongOctetCount(count));
        }
        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}
