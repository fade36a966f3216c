//! Backend seams.
//!
//! A backend knows how to turn a path into an open OS handle ([`Backend`]), and the handle
//! knows how to move bytes and hand out its preparsed report descriptor ([`RawDevice`]).
//! Everything above this layer ([`DeviceHandle`](crate::handle::DeviceHandle), the
//! background reader) is written against these traits only.
//!
//! Implementations:
//! - `backends::windows::WinBackend`: `CreateFileW` + overlapped `ReadFile`/`WriteFile`
//!   (Windows, `hid` feature).
//! - [`SimBus`](crate::backends::sim::SimBus): scripted in-memory devices for tests and demos.

use std::io;

/// An acquired preparsed report descriptor.
///
/// The descriptor is released when the value is dropped, so every exit path of a
/// capability query gives it back to the OS.
pub trait PreparsedData {
    /// `InputReportByteLength` from the descriptor's capabilities, or `None` if the
    /// capabilities could not be extracted.
    fn input_report_len(&self) -> Option<u16>;
}

/// One open OS handle to a HID node.
///
/// All methods take `&self`: the handle is shared between the caller's thread and the
/// background reader, and an overlapped handle accepts a read and a write in flight at the
/// same time. Callers above this layer serialize same-direction access.
pub trait RawDevice: Send + Sync + 'static {
    type Preparsed: PreparsedData;

    /// Read up to `buf.len()` bytes. May return fewer, including `0`.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write up to `buf.len()` bytes and report how many the device accepted.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Push anything the OS layer still holds to the device.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Fetch the preparsed report descriptor, `None` if the OS cannot provide one.
    fn preparsed_data(&self) -> Option<Self::Preparsed>;

    /// Release the OS handle.
    ///
    /// Must be idempotent: the first call releases, later calls are no-ops. Reads and
    /// writes after `close` fail.
    fn close(&self) -> io::Result<()>;
}

/// Opens device nodes by path.
pub trait Backend {
    type Device: RawDevice;

    /// Open `path` for shared read/write overlapped access.
    ///
    /// On failure nothing is left allocated.
    fn open(&self, path: &str) -> io::Result<Self::Device>;
}
