//! Simulated HID devices.
//!
//! [`SimBus`] stands in for the OS: it maps paths to [`SimDevice`]s, opens them as
//! [`SimHandle`]s (a [`RawDevice`]) and lists them as a [`Browser`]. A `SimDevice` is
//! scripted up front with builder methods and can be fed or inspected while a handle is
//! open:
//!
//! ```
//! use hidlink::backends::sim::{counter_reports, SimBus, SimDevice};
//! use hidlink::DeviceHandle;
//!
//! let bus = SimBus::new();
//! let pad = bus.attach(
//!     SimDevice::new("sim://pad")
//!         .with_report_len(8)
//!         .with_source(counter_reports(8)),
//! );
//!
//! let handle = DeviceHandle::open(&bus, "sim://pad").unwrap();
//! assert_eq!(handle.read_report().unwrap(), Some(vec![0; 8]));
//! assert_eq!(handle.read_report().unwrap(), Some(vec![1; 8]));
//! handle.close();
//! assert_eq!(pad.open_handles(), 0);
//! ```
//!
//! Reads block while the device has nothing to deliver, exactly like a real HID node with
//! no pending input report, unless [`SimDevice::end_of_stream_when_empty`] was set.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::device::{Backend, PreparsedData, RawDevice};
use crate::error::Result;
use crate::identity::{Browser, DeviceIdentity};

/// Produces input data on demand; `None` ends the source.
pub type ReportSource = Box<dyn FnMut() -> Option<Vec<u8>> + Send>;

/// Source of `len`-byte reports `[0; len]`, `[1; len]`, `[2; len]`, ... (wrapping at 255).
pub fn counter_reports(len: usize) -> impl FnMut() -> Option<Vec<u8>> + Send + 'static {
    let mut next: u8 = 0;
    move || {
        let report = vec![next; len];
        next = next.wrapping_add(1);
        Some(report)
    }
}

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    closes: AtomicUsize,
    read_calls: AtomicUsize,
    flushes: AtomicUsize,
    preparsed_fetches: AtomicUsize,
    preparsed_outstanding: AtomicUsize,
}

struct SimState {
    report_len: Option<u16>,
    caps_readable: bool,
    inbox: VecDeque<u8>,
    chunks: Vec<usize>,
    next_chunk: usize,
    source: Option<ReportSource>,
    end_of_stream: bool,
    disconnected: bool,
    per_write: Option<usize>,
    capacity: Option<usize>,
    written: Vec<u8>,
    write_calls: usize,
    write_failure: Option<io::ErrorKind>,
}

impl SimState {
    /// Read size limit for the next read call, cycling through the chunk plan.
    fn take_chunk(&mut self) -> Option<usize> {
        if self.chunks.is_empty() {
            return None;
        }
        let limit = self.chunks[self.next_chunk % self.chunks.len()];
        self.next_chunk += 1;
        Some(limit)
    }
}

/// A scripted HID device.
pub struct SimDevice {
    identity: DeviceIdentity,
    refuse_open: Option<io::ErrorKind>,
    state: Mutex<SimState>,
    readable: Condvar,
    counters: Arc<Counters>,
}

impl SimDevice {
    /// A device at `path` with no preparsed data, no input and an unlimited sink.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_identity(DeviceIdentity::new(path, 0, 0))
    }

    pub fn with_identity(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            refuse_open: None,
            state: Mutex::new(SimState {
                report_len: None,
                caps_readable: true,
                inbox: VecDeque::new(),
                chunks: Vec::new(),
                next_chunk: 0,
                source: None,
                end_of_stream: false,
                disconnected: false,
                per_write: None,
                capacity: None,
                written: Vec::new(),
                write_calls: 0,
                write_failure: None,
            }),
            readable: Condvar::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Advertise `len`-byte input reports through the preparsed descriptor.
    pub fn with_report_len(mut self, len: u16) -> Self {
        self.state.get_mut().report_len = Some(len);
        self
    }

    /// Preparsed data can be fetched, but its capabilities cannot be read.
    pub fn caps_unreadable(mut self) -> Self {
        self.state.get_mut().caps_readable = false;
        self
    }

    /// Bytes available to read from the start.
    pub fn with_input(mut self, bytes: &[u8]) -> Self {
        self.state.get_mut().inbox.extend(bytes);
        self
    }

    /// Cap successive read calls at these sizes (cycled). A `0` makes that call return no
    /// data even if some is pending.
    pub fn with_chunks(mut self, chunks: &[usize]) -> Self {
        self.state.get_mut().chunks = chunks.to_vec();
        self
    }

    /// Generate input whenever the pending bytes run out.
    pub fn with_source<F>(mut self, source: F) -> Self
    where
        F: FnMut() -> Option<Vec<u8>> + Send + 'static,
    {
        self.state.get_mut().source = Some(Box::new(source));
        self
    }

    /// Return `0` from reads once there is nothing left, instead of blocking.
    pub fn end_of_stream_when_empty(mut self) -> Self {
        self.state.get_mut().end_of_stream = true;
        self
    }

    /// Accept at most `n` bytes per write call.
    pub fn accept_per_write(mut self, n: usize) -> Self {
        self.state.get_mut().per_write = Some(n);
        self
    }

    /// Accept `n` bytes in total; later writes accept nothing.
    pub fn accept_total(mut self, n: usize) -> Self {
        self.state.get_mut().capacity = Some(n);
        self
    }

    /// Fail every open attempt with `kind`.
    pub fn refuse_open(mut self, kind: io::ErrorKind) -> Self {
        self.refuse_open = Some(kind);
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn path(&self) -> &str {
        self.identity.path()
    }

    /// Make more input available and wake blocked readers.
    pub fn push_input(&self, bytes: &[u8]) {
        self.state.lock().inbox.extend(bytes);
        self.readable.notify_all();
    }

    /// Change (or with `None`, withdraw) the advertised report length.
    pub fn set_report_len(&self, len: Option<u16>) {
        self.state.lock().report_len = len;
    }

    /// Fail the next write call with `kind`; later writes behave normally again.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.state.lock().write_failure = Some(kind);
    }

    /// Fail all further reads with `BrokenPipe`, as an unplugged device would.
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
        self.readable.notify_all();
    }

    /// Every byte the device has accepted so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }

    pub fn flushes(&self) -> usize {
        self.counters.flushes.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.counters.read_calls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.opens().saturating_sub(self.closes())
    }

    pub fn preparsed_fetches(&self) -> usize {
        self.counters.preparsed_fetches.load(Ordering::SeqCst)
    }

    /// Preparsed descriptors handed out and not yet released.
    pub fn preparsed_outstanding(&self) -> usize {
        self.counters.preparsed_outstanding.load(Ordering::SeqCst)
    }
}

/// Preparsed descriptor of a [`SimDevice`].
pub struct SimPreparsed {
    input_report_len: Option<u16>,
    counters: Arc<Counters>,
}

impl PreparsedData for SimPreparsed {
    fn input_report_len(&self) -> Option<u16> {
        self.input_report_len
    }
}

impl Drop for SimPreparsed {
    fn drop(&mut self) {
        self.counters
            .preparsed_outstanding
            .fetch_sub(1, Ordering::SeqCst);
    }
}

/// An open handle to a [`SimDevice`].
pub struct SimHandle {
    device: Arc<SimDevice>,
    closed: AtomicBool,
}

impl SimHandle {
    pub fn new(device: Arc<SimDevice>) -> Self {
        device.counters.opens.fetch_add(1, Ordering::SeqCst);
        Self {
            device,
            closed: AtomicBool::new(false),
        }
    }

    pub fn device(&self) -> &Arc<SimDevice> {
        &self.device
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "simulated handle is closed",
            ));
        }
        Ok(())
    }
}

impl RawDevice for SimHandle {
    type Preparsed = SimPreparsed;

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let dev = &self.device;
        dev.counters.read_calls.fetch_add(1, Ordering::SeqCst);

        let mut st = dev.state.lock();
        let limit = st.take_chunk().unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(0);
        }

        loop {
            if st.disconnected {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "simulated device disconnected",
                ));
            }
            if !st.inbox.is_empty() {
                break;
            }
            if st.source.is_some() {
                let next = st.source.as_mut().and_then(|source| source());
                match next {
                    Some(bytes) => st.inbox.extend(bytes),
                    None => st.source = None,
                }
                continue;
            }
            if st.end_of_stream {
                return Ok(0);
            }
            self.ensure_open()?;
            dev.readable.wait(&mut st);
        }

        let n = buf.len().min(st.inbox.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(st.inbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let mut st = self.device.state.lock();
        st.write_calls += 1;
        if let Some(kind) = st.write_failure.take() {
            return Err(io::Error::new(kind, "simulated write failure"));
        }

        let room = st
            .capacity
            .map_or(usize::MAX, |cap| cap.saturating_sub(st.written.len()));
        let n = buf
            .len()
            .min(st.per_write.unwrap_or(usize::MAX))
            .min(room);
        st.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&self) -> io::Result<()> {
        self.ensure_open()?;
        self.device.counters.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn preparsed_data(&self) -> Option<SimPreparsed> {
        let st = self.device.state.lock();
        let len = st.report_len?;
        let counters = &self.device.counters;
        counters.preparsed_fetches.fetch_add(1, Ordering::SeqCst);
        counters.preparsed_outstanding.fetch_add(1, Ordering::SeqCst);
        Some(SimPreparsed {
            input_report_len: st.caps_readable.then_some(len),
            counters: Arc::clone(counters),
        })
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.device.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.device.readable.notify_all();
        Ok(())
    }
}

/// A set of simulated devices addressable by path.
#[derive(Default)]
pub struct SimBus {
    devices: Mutex<Vec<Arc<SimDevice>>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in `device`, replacing any device already at its path.
    pub fn attach(&self, device: SimDevice) -> Arc<SimDevice> {
        let device = Arc::new(device);
        let mut devices = self.devices.lock();
        devices.retain(|d| d.path() != device.path());
        devices.push(Arc::clone(&device));
        device
    }

    /// Unplug the device at `path`. Open handles keep working against it.
    pub fn detach(&self, path: &str) -> Option<Arc<SimDevice>> {
        let mut devices = self.devices.lock();
        let idx = devices.iter().position(|d| d.path() == path)?;
        Some(devices.remove(idx))
    }

    pub fn device(&self, path: &str) -> Option<Arc<SimDevice>> {
        self.devices
            .lock()
            .iter()
            .find(|d| d.path() == path)
            .cloned()
    }
}

impl Backend for SimBus {
    type Device = SimHandle;

    fn open(&self, path: &str) -> io::Result<SimHandle> {
        let device = self.device(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no simulated device at {path}"),
            )
        })?;
        if let Some(kind) = device.refuse_open {
            return Err(io::Error::new(kind, "simulated device refused to open"));
        }
        Ok(SimHandle::new(device))
    }
}

impl Browser for SimBus {
    fn browse(&self) -> Result<Vec<DeviceIdentity>> {
        Ok(self
            .devices
            .lock()
            .iter()
            .map(|d| d.identity.clone())
            .collect())
    }
}
