//! SDL-style joystick GUID decoding

use std::fmt;

use super::{HidError, HidIdentifier};

/// Fields packed into a 16-byte joystick GUID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedGuid {
    pub bus: u16,
    pub crc: u16,
    pub vendor: u16,
    pub product: Option<u16>,
    pub version: Option<u16>,
    pub driver_signature: Option<u8>,
    pub driver_data: Option<u8>,
    /// Truncated product name, stored when no vendor id is available
    pub product_name: Option<String>,
}

fn read_u16_le(data: &[u8; 16], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_c_string(data: &[u8; 16], offset: usize, max_len: usize) -> String {
    let end = (offset + max_len).min(data.len());
    let slice = &data[offset..end];
    let len = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
    String::from_utf8_lossy(&slice[..len]).into_owned()
}

impl DecodedGuid {
    pub fn from_bytes(guid: &[u8; 16]) -> Self {
        let bus = read_u16_le(guid, 0);
        let crc = read_u16_le(guid, 2);
        let vendor = read_u16_le(guid, 4);

        if vendor != 0 {
            // [4..6] vendor, [8..10] product, [12..14] version, [14] signature, [15] data
            return Self {
                bus,
                crc,
                vendor,
                product: Some(read_u16_le(guid, 8)),
                version: Some(read_u16_le(guid, 12)),
                driver_signature: Some(guid[14]),
                driver_data: Some(guid[15]),
                product_name: None,
            };
        }

        let (driver_signature, driver_data, name_len) = if guid[14] != 0 {
            (Some(guid[14]), Some(guid[15]), 10)
        } else {
            (None, None, 12)
        };

        Self {
            bus,
            crc,
            vendor,
            product: None,
            version: None,
            driver_signature,
            driver_data,
            product_name: Some(read_c_string(guid, 4, name_len)),
        }
    }

    /// Parse the 32-digit hex form (dashes are ignored)
    pub fn parse(guid: &str) -> Result<Self, HidError> {
        let cleaned: String = guid.chars().filter(|c| *c != '-').collect();
        let bytes = hex::decode(&cleaned).map_err(|_| HidError::InvalidGuid(guid.to_string()))?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| HidError::InvalidGuid(guid.to_string()))?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn hid_identifier(&self) -> Option<HidIdentifier> {
        self.product.map(|product| HidIdentifier::new(self.vendor, product))
    }

    /// Backend that produced the GUID
    pub fn driver_hint(&self) -> &'static str {
        match self.driver_signature.map(char::from) {
            Some('x') => "windows/XInput",
            Some('w') => "windows/Windows Gaming Input",
            Some('r') => "windows/Raw Input",
            Some('g') => "gdk/GameInput",
            Some('h') => "HIDAPI",
            Some('m') => "apple/MFI",
            Some('v') => "Virtual",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for DecodedGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hid_identifier(), &self.product_name) {
            (Some(id), _) => write!(f, "{} via {}", id, self.driver_hint()),
            (None, Some(name)) => write!(f, "'{}' via {}", name, self.driver_hint()),
            (None, None) => write!(f, "unknown via {}", self.driver_hint()),
        }
    }
}
