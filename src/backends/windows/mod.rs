#![cfg(target_os = "windows")]

//! Windows HID backend.
//!
//! - [`WinBackend`] opens nodes with `CreateFileW` and performs overlapped report I/O.
//! - [`HidBrowser`] enumerates nodes through `hidapi`.

pub mod hid_device;
pub mod hid_discovery;

pub use hid_device::{WinBackend, WinHidDevice, WinPreparsed};
pub use hid_discovery::HidBrowser;
