//! Windows HID device handle.
//!
//! [`WinHidDevice`] owns one `CreateFileW` handle to a HID node opened for overlapped I/O.
//! Each `read`/`write` issues the operation with its own event and then waits on
//! `GetOverlappedResult`, so the calls are blocking from the caller's point of view while
//! the node itself stays in asynchronous mode.
//!
//! Reads must be at least `InputReportByteLength` long or Windows rejects them; the
//! buffered stream in front of this handle reads 64 bytes at a time, or the caller's full
//! report directly when that is larger.

use std::ffi::{c_void, OsStr};
use std::io;
use std::mem::{self, MaybeUninit};
use std::os::windows::ffi::OsStrExt;
use std::ptr::{null, null_mut};
use std::sync::atomic::{AtomicPtr, Ordering};

use tracing::trace;
use windows_sys::Win32::Devices::HumanInterfaceDevice::{
    HidD_FreePreparsedData, HidD_GetPreparsedData, HidP_GetCaps, HIDP_CAPS,
    HIDP_STATUS_SUCCESS, PHIDP_PREPARSED_DATA,
};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, BOOL, ERROR_HANDLE_EOF, ERROR_IO_PENDING, GENERIC_READ,
    GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, WriteFile, FILE_FLAG_OVERLAPPED, FILE_SHARE_READ, FILE_SHARE_WRITE,
    OPEN_EXISTING,
};
use windows_sys::Win32::System::Threading::CreateEventW;
use windows_sys::Win32::System::IO::{GetOverlappedResult, OVERLAPPED};

use crate::device::{Backend, PreparsedData, RawDevice};

/// An open HID node.
pub struct WinHidDevice {
    handle: AtomicPtr<c_void>,
}

impl WinHidDevice {
    /// Open the node at `path` for shared reading and writing.
    ///
    /// Fails if the OS refuses read/write access, as it does for keyboards and mice.
    pub fn open(path: &str) -> io::Result<Self> {
        let wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                null(),
                OPEN_EXISTING,
                FILE_FLAG_OVERLAPPED,
                null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            let err = io::Error::last_os_error();
            trace!(path, error = %err, "CreateFileW refused");
            return Err(err);
        }

        Ok(Self {
            handle: AtomicPtr::new(handle),
        })
    }

    fn raw(&self) -> io::Result<HANDLE> {
        let handle = self.handle.load(Ordering::Acquire);
        if handle.is_null() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "HID handle is closed",
            ));
        }
        Ok(handle)
    }

    /// Issue one overlapped operation and wait for it to complete.
    fn overlapped<F>(&self, issue: F) -> io::Result<usize>
    where
        F: FnOnce(HANDLE, *mut u32, *mut OVERLAPPED) -> BOOL,
    {
        let handle = self.raw()?;
        let event = Event::new()?;

        let mut ov: OVERLAPPED = unsafe { mem::zeroed() };
        ov.hEvent = event.0;
        let mut transferred: u32 = 0;

        if issue(handle, &mut transferred, &mut ov) == 0 {
            let err = unsafe { GetLastError() };
            if err == ERROR_HANDLE_EOF {
                return Ok(0);
            }
            if err != ERROR_IO_PENDING {
                return Err(io::Error::from_raw_os_error(err as i32));
            }
            if unsafe { GetOverlappedResult(handle, &ov, &mut transferred, 1) } == 0 {
                let err = unsafe { GetLastError() };
                if err == ERROR_HANDLE_EOF {
                    return Ok(0);
                }
                return Err(io::Error::from_raw_os_error(err as i32));
            }
        }

        Ok(transferred as usize)
    }
}

impl RawDevice for WinHidDevice {
    type Preparsed = WinPreparsed;

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let ptr = buf.as_mut_ptr();
        self.overlapped(|h, n, ov| unsafe { ReadFile(h, ptr, len, n, ov) })
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let ptr = buf.as_ptr();
        self.overlapped(|h, n, ov| unsafe { WriteFile(h, ptr, len, n, ov) })
    }

    fn preparsed_data(&self) -> Option<WinPreparsed> {
        let handle = self.raw().ok()?;
        let mut ppd: PHIDP_PREPARSED_DATA = 0;
        let ok = unsafe { HidD_GetPreparsedData(handle, &mut ppd) };
        if ok == 0 || ppd == 0 {
            return None;
        }
        Some(WinPreparsed(ppd))
    }

    fn close(&self) -> io::Result<()> {
        let handle = self.handle.swap(null_mut(), Ordering::AcqRel);
        if handle.is_null() {
            return Ok(());
        }
        if unsafe { CloseHandle(handle) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for WinHidDevice {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Preparsed HID descriptor; freed on drop.
pub struct WinPreparsed(PHIDP_PREPARSED_DATA);

impl PreparsedData for WinPreparsed {
    fn input_report_len(&self) -> Option<u16> {
        let mut caps = MaybeUninit::<HIDP_CAPS>::uninit();
        let status = unsafe { HidP_GetCaps(self.0, caps.as_mut_ptr()) };
        if status != HIDP_STATUS_SUCCESS {
            return None;
        }
        let caps = unsafe { caps.assume_init() };
        Some(caps.InputReportByteLength)
    }
}

impl Drop for WinPreparsed {
    fn drop(&mut self) {
        unsafe {
            HidD_FreePreparsedData(self.0);
        }
    }
}

/// Manual-reset event used by one overlapped operation.
struct Event(HANDLE);

impl Event {
    fn new() -> io::Result<Self> {
        let handle = unsafe { CreateEventW(null(), 1, 0, null()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self(handle))
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

/// Opens HID nodes by their Windows device-interface path.
#[derive(Clone, Copy, Debug, Default)]
pub struct WinBackend;

impl Backend for WinBackend {
    type Device = WinHidDevice;

    fn open(&self, path: &str) -> io::Result<WinHidDevice> {
        WinHidDevice::open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING: &str =
        r"\\?\hid#vid_0000&pid_0000#0&00000000&0&0000#{4d1e55b2-f16f-11cf-88cb-001111000030}";

    #[test]
    fn refused_open_is_an_error() {
        let err = WinHidDevice::open(MISSING).err().expect("no such node");
        assert!(err.raw_os_error().is_some());
    }
}
