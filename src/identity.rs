//! Device identities and enumeration.
//!
//! A [`DeviceIdentity`] is what a [`Browser`] reports for one HID node: the OS path (the
//! only field the I/O layer consumes) plus USB ids and strings for display and filtering.
//!
//! ## Persistence notes
//! - `vendor_id`/`product_id` and `serial_number` (when present) are stable across
//!   reconnects and suit re-identification.
//! - `path` is platform-specific and may change across ports and reconnects; use it to open
//!   the device now, not to recognize it later.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identity of one enumerated HID node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    path: String,
    vendor_id: u16,
    product_id: u16,
    product: Option<String>,
    manufacturer: Option<String>,
    serial_number: Option<String>,
}

impl DeviceIdentity {
    pub fn new(path: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            path: path.into(),
            vendor_id,
            product_id,
            ..Self::default()
        }
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// OS path to pass to `DeviceHandle::open`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    /// `true` if this node has the given VID/PID.
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// `VID=046D, PID=C52B, Product=USB Receiver`
impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VID={:04X}, PID={:04X}, Product={}",
            self.vendor_id,
            self.product_id,
            self.product.as_deref().unwrap_or("")
        )
    }
}

/// Enumerates HID nodes.
pub trait Browser {
    fn browse(&self) -> Result<Vec<DeviceIdentity>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receiver() -> DeviceIdentity {
        DeviceIdentity::new(r"\\?\hid#vid_046d&pid_c52b&mi_00", 0x046d, 0xc52b)
            .with_product("USB Receiver")
            .with_manufacturer("Logitech")
            .with_serial_number("0001")
    }

    #[test]
    fn display_matches_diagnostic_line() {
        assert_eq!(
            receiver().to_string(),
            "VID=046D, PID=C52B, Product=USB Receiver"
        );
        assert_eq!(
            DeviceIdentity::new("p", 0x1, 0x2).to_string(),
            "VID=0001, PID=0002, Product="
        );
    }

    #[test]
    fn accessors_expose_every_field() {
        let id = receiver();
        assert_eq!(id.path(), r"\\?\hid#vid_046d&pid_c52b&mi_00");
        assert_eq!(id.vendor_id(), 0x046d);
        assert_eq!(id.product_id(), 0xc52b);
        assert_eq!(id.product(), Some("USB Receiver"));
        assert_eq!(id.manufacturer(), Some("Logitech"));
        assert_eq!(id.serial_number(), Some("0001"));
        assert!(id.matches(0x046d, 0xc52b));
        assert!(!id.matches(0x046d, 0xc52c));
    }

    #[test]
    fn json_export_keeps_missing_strings_null() {
        let id = DeviceIdentity::new("sim://pad", 0x1234, 0x5678);
        let json = id.to_json().unwrap();
        assert!(json.contains("\"serial_number\": null"));
        assert_eq!(DeviceIdentity::from_json(&json).unwrap(), id);
    }
}
