//! HID classification
//!
//! Maps (vendor, product) pairs to a [`ControllerType`] using an embedded CSV
//! table, and derives stable per-device uids from the HID identifier.

pub mod guid;

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::{debug, error};

pub use guid::DecodedGuid;

const EMBEDDED_TYPES: &str = include_str!("controller_types.csv");

/// Namespace of the handheld that needs the deck daemon
pub const DECK_NAMESPACE: &str = "steamdeck";

#[derive(Debug, thiserror::Error)]
pub enum HidError {
    #[error("failed to parse controller type table: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid {field} '{value}' in controller type table")]
    InvalidHex { field: &'static str, value: String },

    #[error("invalid GUID '{0}'")]
    InvalidGuid(String),
}

/// USB vendor/product pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HidIdentifier {
    pub vendor: u16,
    pub product: u16,
}

impl HidIdentifier {
    pub const fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }
}

impl fmt::Display for HidIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

/// A HID device as enumerated by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidDevice {
    pub identifier: Option<HidIdentifier>,
    /// Platform path, when the backend exposes one
    pub path: Option<String>,
}

impl HidDevice {
    pub fn new(identifier: HidIdentifier) -> Self {
        Self {
            identifier: Some(identifier),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Classification of a controller model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerType {
    pub namespace: String,
    pub friendly_name: String,
    /// Layout id used for button glyphs
    pub mapping_id: Option<String>,
    /// Treat as a generic joystick even if the backend reports a gamepad layout
    pub force_joystick: bool,
    /// Never create a controller for this device
    pub dont_load: bool,
}

impl ControllerType {
    pub fn unknown() -> Self {
        Self {
            namespace: "unknown".to_string(),
            friendly_name: String::new(),
            mapping_id: None,
            force_joystick: false,
            dont_load: false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.namespace == "unknown"
    }

    pub fn is_deck(&self) -> bool {
        self.namespace == DECK_NAMESPACE
    }
}

impl Default for ControllerType {
    fn default() -> Self {
        Self::unknown()
    }
}

/// What classification produced for a device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HidInfo {
    pub controller_type: ControllerType,
    pub hid: Option<HidDevice>,
}

impl HidInfo {
    pub fn new(controller_type: ControllerType, hid: Option<HidDevice>) -> Self {
        Self { controller_type, hid }
    }

    pub fn identifier(&self) -> Option<HidIdentifier> {
        self.hid.as_ref().and_then(|hid| hid.identifier)
    }

    pub fn path(&self) -> Option<&str> {
        self.hid.as_ref().and_then(|hid| hid.path.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct TypeRow {
    vendor: String,
    product: String,
    namespace: String,
    friendly_name: String,
    mapping_id: Option<String>,
    force_joystick: bool,
    dont_load: bool,
}

fn parse_hex(field: &'static str, value: &str) -> Result<u16, HidError> {
    let trimmed = value.trim().trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(trimmed, 16).map_err(|_| HidError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

/// Controller type database
#[derive(Debug, Clone, Default)]
pub struct ControllerTypeRegistry {
    types: HashMap<HidIdentifier, ControllerType>,
}

static EMBEDDED: Lazy<ControllerTypeRegistry> = Lazy::new(|| {
    ControllerTypeRegistry::from_csv(EMBEDDED_TYPES).unwrap_or_else(|e| {
        error!("Embedded controller type table is invalid: {}", e);
        ControllerTypeRegistry::default()
    })
});

impl ControllerTypeRegistry {
    /// Table compiled into the crate
    pub fn embedded() -> &'static ControllerTypeRegistry {
        &EMBEDDED
    }

    /// Parse a table with columns
    /// `vendor,product,namespace,friendly_name,mapping_id,force_joystick,dont_load`
    pub fn from_csv(content: &str) -> Result<Self, HidError> {
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut types = HashMap::new();

        for row in reader.deserialize() {
            let row: TypeRow = row?;
            let id = HidIdentifier::new(parse_hex("vendor", &row.vendor)?, parse_hex("product", &row.product)?);

            types.insert(
                id,
                ControllerType {
                    namespace: row.namespace,
                    friendly_name: row.friendly_name,
                    mapping_id: row.mapping_id.filter(|m| !m.is_empty()),
                    force_joystick: row.force_joystick,
                    dont_load: row.dont_load,
                },
            );
        }

        debug!("Loaded {} controller types", types.len());
        Ok(Self { types })
    }

    /// Look up a device's type; unknown devices get [`ControllerType::unknown`]
    pub fn controller_type(&self, id: HidIdentifier) -> ControllerType {
        self.types.get(&id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Derive a stable uid for a device
///
/// Devices with a HID identifier get `hex(sha1("vvvv:pppp:index"))` cut to 32
/// characters, where `index` disambiguates identical models connected at once.
/// Others fall back to `unknown-uid-<fallback>`.
pub fn create_uid(hid: Option<HidIdentifier>, index: usize, fallback: impl fmt::Display) -> String {
    match hid {
        Some(id) => {
            let digest = Sha1::digest(format!("{id}:{index}").as_bytes());
            let mut uid = hex::encode(digest);
            uid.truncate(32);
            uid
        },
        None => format!("unknown-uid-{fallback}"),
    }
}
