//! Input report length discovery.

use std::fmt;

use tracing::trace;

use crate::device::{PreparsedData, RawDevice};

/// Input report byte length of a device, as reported by its preparsed descriptor.
///
/// A length of `0` is the [`UNAVAILABLE`](Capability::UNAVAILABLE) sentinel: the OS had no
/// preparsed data for the handle, or its capabilities could not be read. That is a normal,
/// retryable outcome rather than an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(u16);

impl Capability {
    pub const UNAVAILABLE: Capability = Capability(0);

    pub const fn new(input_report_len: u16) -> Self {
        Self(input_report_len)
    }

    /// Bytes per input report; `0` when unavailable.
    #[inline]
    pub const fn input_report_len(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_available(self) -> bool {
        self.0 != 0
    }
}

impl From<Capability> for usize {
    fn from(cap: Capability) -> usize {
        cap.input_report_len()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_available() {
            write!(f, "{} byte input reports", self.0)
        } else {
            f.write_str("capability unavailable")
        }
    }
}

/// Query the input report length of an open device.
///
/// The preparsed descriptor is held only for the duration of this call and is released on
/// every path out of it.
pub fn query<D: RawDevice>(device: &D) -> Capability {
    let Some(preparsed) = device.preparsed_data() else {
        trace!("no preparsed data for handle");
        return Capability::UNAVAILABLE;
    };
    match preparsed.input_report_len() {
        Some(len) => Capability::new(len),
        None => {
            trace!("preparsed data has no readable caps");
            Capability::UNAVAILABLE
        }
    }
}
