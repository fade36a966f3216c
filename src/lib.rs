//! Blocking report I/O for HID devices, with an optional background reader.
//!
//! ```no_run
//! # #[cfg(all(feature = "hid", target_os = "windows"))]
//! # fn main() -> hidlink::Result<()> {
//! let devices = hidlink::browse()?;
//! if let Some(id) = devices.last() {
//!     let mut handle = hidlink::open(id.path())?;
//!     handle.start_reading(|report| println!("{report:02X?}"))?;
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//!     handle.close();
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "hid", target_os = "windows")))]
//! # fn main() {}
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod capability;
pub mod config;
pub mod device;
pub mod error;
pub mod handle;
pub mod identity;
pub mod reader;
mod stream;

pub use capability::Capability;
pub use config::{DeviceConfig, PollPolicy, ReaderConfig};
pub use device::{Backend, PreparsedData, RawDevice};
pub use error::{Error, Result};
pub use handle::DeviceHandle;
pub use identity::{Browser, DeviceIdentity};
pub use reader::ReaderStatus;

#[cfg(all(feature = "hid", target_os = "windows"))]
pub use backends::{browse, open, SystemDevice};
