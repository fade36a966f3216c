//! Buffered bidirectional stream over a [`RawDevice`].
//!
//! Each direction gets its own `std::io` buffer and its own lock, so a write from the
//! caller's thread never queues behind a read the background reader is blocked in, while
//! two readers (a direct `read_exact` and the background reader) are serialized and each
//! receives whole reports.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::device::RawDevice;

/// `std::io` adapter over a shared raw handle.
struct HandleIo<D>(Arc<D>);

impl<D: RawDevice> Read for HandleIo<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<D: RawDevice> Write for HandleIo<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

pub(crate) struct ReportStream<D: RawDevice> {
    reader: Mutex<BufReader<HandleIo<D>>>,
    writer: Mutex<BufWriter<HandleIo<D>>>,
    max_zero_reads: u32,
    closed: AtomicBool,
}

impl<D: RawDevice> ReportStream<D> {
    pub(crate) fn new(device: Arc<D>, buffer_size: usize, max_zero_reads: u32) -> Self {
        Self {
            reader: Mutex::new(BufReader::with_capacity(
                buffer_size,
                HandleIo(Arc::clone(&device)),
            )),
            writer: Mutex::new(BufWriter::with_capacity(buffer_size, HandleIo(device))),
            max_zero_reads: max_zero_reads.max(1),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "report stream is closed",
            ));
        }
        Ok(())
    }

    /// Write all of `data`, then flush it through to the device.
    ///
    /// On failure whatever part of `data` the device has not taken yet is discarded, so it
    /// never leaks into a later write or the flush on close.
    pub(crate) fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        let mut writer = self.writer.lock();
        let mut res = writer.write_all(data);
        if res.is_ok() {
            res = writer.flush();
        }
        if res.is_err() {
            discard_pending(&mut writer);
        }
        res
    }

    /// Fill `buf` completely, issuing as many reads as the device needs.
    ///
    /// `max_zero_reads` consecutive empty reads fail with `UnexpectedEof`; any progress
    /// resets the count.
    ///
    /// A failed call loses the partial report it had collected, along with anything still
    /// buffered, and the next call starts on data fetched fresh from the device.
    pub(crate) fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
        self.ensure_open()?;
        let mut reader = self.reader.lock();
        let res = fill(&mut *reader, buf, self.max_zero_reads);
        if res.is_err() {
            let stale = reader.buffer().len();
            reader.consume(stale);
        }
        res
    }

    /// Flush pending output and refuse further I/O. Only the first call does anything.
    pub(crate) fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.writer.lock().flush()
    }
}

/// Drop buffered output by swapping in an empty writer over the same device.
fn discard_pending<D: RawDevice>(writer: &mut BufWriter<HandleIo<D>>) {
    let fresh = BufWriter::with_capacity(
        writer.capacity(),
        HandleIo(Arc::clone(&writer.get_ref().0)),
    );
    // `into_parts` hands back the unsent bytes instead of flushing them on drop.
    let (_, unsent) = std::mem::replace(writer, fresh).into_parts();
    if let Ok(bytes) = unsent {
        if !bytes.is_empty() {
            trace!(dropped = bytes.len(), "discarded unsent output after failed write");
        }
    }
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8], max_zero_reads: u32) -> io::Result<()> {
    let want = buf.len();
    let mut filled = 0;
    let mut zero_reads = 0u32;

    while filled < want {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                zero_reads += 1;
                trace!(filled, want, zero_reads, "empty read");
                if zero_reads >= max_zero_reads {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("device stopped producing data after {filled} of {want} bytes"),
                    ));
                }
            }
            Ok(n) => {
                filled += n;
                zero_reads = 0;
                if filled < want {
                    trace!(got = n, filled, want, "short read");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
