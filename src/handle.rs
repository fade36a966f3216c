//! Open HID device handles.
//!
//! [`DeviceHandle`] owns one OS handle and the buffered stream bound to it for its whole
//! life. It offers blocking report I/O on the caller's thread and, optionally, one
//! background reader thread that delivers every input report to a consumer.
//!
//! ## Teardown
//! [`DeviceHandle::close`] (or dropping the handle) releases resources in a fixed order:
//! 1. cancel the background reader and wait for its thread to return,
//! 2. flush and close the stream,
//! 3. close the OS handle.
//!
//! The reader is joined first so the OS handle is never closed under a read in flight.
//! Each step runs even if the previous one failed; failures are logged, never returned.
//!
//! ## Direct I/O while reading
//! `write` may be called while the background reader runs. `read_exact` may too, but it then
//! competes with the reader for input reports: each report goes to exactly one of them.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::capability::{self, Capability};
use crate::config::DeviceConfig;
use crate::device::{Backend, RawDevice};
use crate::error::{Error, Result};
use crate::reader::{ReaderStatus, ReaderTask};
use crate::stream::ReportStream;

/// The part of a handle the background reader shares.
pub(crate) struct Shared<D: RawDevice> {
    path: String,
    device: Arc<D>,
    stream: ReportStream<D>,
}

impl<D: RawDevice> Shared<D> {
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn capability(&self) -> Capability {
        capability::query(self.device.as_ref())
    }

    pub(crate) fn read_exact(&self, buf: &mut [u8]) -> std::io::Result<()> {
        self.stream.read_exact(buf)
    }
}

/// An open HID device.
pub struct DeviceHandle<D: RawDevice> {
    shared: Arc<Shared<D>>,
    config: DeviceConfig,
    reader: Option<ReaderTask>,
    released: bool,
}

impl<D: RawDevice> DeviceHandle<D> {
    /// Open `path` through `backend` with the default configuration.
    pub fn open<B>(backend: &B, path: &str) -> Result<Self>
    where
        B: Backend<Device = D>,
    {
        Self::open_with_config(backend, path, DeviceConfig::default())
    }

    /// Open `path` through `backend`.
    ///
    /// Fails with [`Error::Open`] if the OS cannot open the node, and with
    /// [`Error::Config`] (before touching the OS) if `config` is invalid.
    pub fn open_with_config<B>(backend: &B, path: &str, config: DeviceConfig) -> Result<Self>
    where
        B: Backend<Device = D>,
    {
        config.validate()?;
        let device = backend.open(path).map_err(|e| Error::open(path, e))?;
        debug!(path, "opened HID device");
        Ok(Self::from_device(path, device, config))
    }

    /// Wrap an already opened raw device.
    pub fn from_device(path: &str, device: D, config: DeviceConfig) -> Self {
        let device = Arc::new(device);
        let stream = ReportStream::new(
            Arc::clone(&device),
            config.stream_buffer_size,
            config.max_zero_reads,
        );
        Self {
            shared: Arc::new(Shared {
                path: path.to_owned(),
                device,
                stream,
            }),
            config,
            reader: None,
            released: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.shared.path
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Write all of `data` and flush it to the device.
    ///
    /// Either every byte reaches the device or an [`Error::Io`] is returned. Bytes the
    /// device had not taken when the error hit are dropped, never sent with a later write.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.shared.stream.write_all(data)?;
        Ok(())
    }

    /// Block until `buf` is completely filled.
    ///
    /// Short reads are retried until the buffer is full. A device that keeps returning no
    /// data fails with an `UnexpectedEof` I/O error after `max_zero_reads` attempts. On
    /// failure the bytes gathered so far are discarded.
    pub fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
        self.shared.stream.read_exact(buf)?;
        Ok(())
    }

    /// Input report length of the device, or [`Capability::UNAVAILABLE`].
    pub fn capability(&self) -> Capability {
        self.shared.capability()
    }

    /// Read one input report of the size the device currently advertises.
    ///
    /// Returns `Ok(None)` when the capability is unavailable.
    pub fn read_report(&self) -> Result<Option<Vec<u8>>> {
        let cap = self.capability();
        if !cap.is_available() {
            return Ok(None);
        }
        let mut report = vec![0u8; cap.input_report_len()];
        self.read_exact(&mut report)?;
        Ok(Some(report))
    }

    /// Start delivering input reports to `consumer` from a dedicated thread.
    ///
    /// Does nothing if a reader was already started on this handle, including one that has
    /// since stopped on a fault. `consumer` runs on the reader thread, once per report.
    pub fn start_reading<F>(&mut self, consumer: F) -> Result<()>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        if self.reader.is_some() {
            return Ok(());
        }
        let task = ReaderTask::spawn(Arc::clone(&self.shared), &self.config.reader, consumer)?;
        self.reader = Some(task);
        Ok(())
    }

    /// `true` while the background reader thread is looping.
    pub fn is_reading(&self) -> bool {
        self.reader_status() == ReaderStatus::Running
    }

    pub fn reader_status(&self) -> ReaderStatus {
        self.reader
            .as_ref()
            .map_or(ReaderStatus::Idle, ReaderTask::status)
    }

    /// Take the I/O error that stopped the background reader, if any.
    ///
    /// The partially read report is dropped; a later `read_exact` starts on fresh data.
    pub fn take_reader_fault(&self) -> Option<Error> {
        self.reader.as_ref().and_then(ReaderTask::take_fault)
    }

    /// Stop the reader, close the stream, close the OS handle.
    ///
    /// Blocks until the background reader (if any) has finished its current iteration.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(mut reader) = self.reader.take() {
            reader.stop();
        }
        if let Err(e) = self.shared.stream.close() {
            warn!(path = %self.shared.path, error = %e, "flushing stream on close failed");
        }
        if let Err(e) = self.shared.device.close() {
            warn!(path = %self.shared.path, error = %e, "closing OS handle failed");
        }
        debug!(path = %self.shared.path, "closed HID device");
    }
}

impl<D: RawDevice> Drop for DeviceHandle<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: RawDevice> std::fmt::Debug for DeviceHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("path", &self.shared.path)
            .field("reader", &self.reader_status())
            .finish()
    }
}
