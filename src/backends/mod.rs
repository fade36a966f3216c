//! Device backends for `hidlink`.
//!
//! Implementations of [`Backend`](crate::device::Backend) and
//! [`Browser`](crate::identity::Browser).
//!
//! # Feature flags
//! - **`hid`** enables the Windows backend (default). It is compiled on Windows only.
//!
//! The [`sim`] backend is always available and needs no hardware.

pub mod sim;

#[cfg(all(feature = "hid", target_os = "windows"))]
#[cfg_attr(docsrs, doc(cfg(all(feature = "hid", target_os = "windows"))))]
pub mod windows;

/// Handle type returned by [`open`].
#[cfg(all(feature = "hid", target_os = "windows"))]
pub type SystemDevice = crate::handle::DeviceHandle<windows::WinHidDevice>;

/// Open the HID node at `path` with the OS backend.
#[cfg(all(feature = "hid", target_os = "windows"))]
pub fn open(path: &str) -> crate::Result<SystemDevice> {
    crate::handle::DeviceHandle::open(&windows::WinBackend, path)
}

/// List the HID nodes currently present with the OS backend.
#[cfg(all(feature = "hid", target_os = "windows"))]
pub fn browse() -> crate::Result<Vec<crate::identity::DeviceIdentity>> {
    use crate::identity::Browser;
    windows::HidBrowser.browse()
}
