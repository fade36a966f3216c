//! Windows HID enumeration via `hidapi`.
//!
//! `hidapi` lists one entry per top-level collection. On Windows each collection has its
//! own device-interface path, so a composite device shows up several times with the same
//! VID/PID; [`HidBrowser`] keeps them all and only drops exact path duplicates.

use std::collections::HashSet;

use hidapi::{DeviceInfo, HidApi};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::{Browser, DeviceIdentity};

/// Lists the HID nodes currently present.
#[derive(Clone, Copy, Debug, Default)]
pub struct HidBrowser;

impl Browser for HidBrowser {
    fn browse(&self) -> Result<Vec<DeviceIdentity>> {
        let api = HidApi::new().map_err(|e| Error::Enumerate(e.to_string()))?;

        let mut seen = HashSet::new();
        let found: Vec<DeviceIdentity> = api
            .device_list()
            .map(identity)
            .filter(|id| seen.insert(id.path().to_owned()))
            .collect();

        debug!(count = found.len(), "enumerated HID devices");
        Ok(found)
    }
}

fn identity(info: &DeviceInfo) -> DeviceIdentity {
    let mut id = DeviceIdentity::new(
        info.path().to_string_lossy(),
        info.vendor_id(),
        info.product_id(),
    );
    if let Some(product) = info.product_string() {
        id = id.with_product(product);
    }
    if let Some(manufacturer) = info.manufacturer_string() {
        id = id.with_manufacturer(manufacturer);
    }
    if let Some(serial) = info.serial_number() {
        id = id.with_serial_number(serial);
    }
    id
}
