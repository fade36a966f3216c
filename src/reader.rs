//! Background report reader.
//!
//! A [`ReaderTask`] is one dedicated OS thread bound to a device handle. Each iteration it
//! checks the cancellation flag, queries the input report length, reads exactly one report
//! and hands it to the consumer on the reader thread:
//!
//! ```text
//!   Idle ──start──▶ Running ──stop()──▶ Stopping ──thread exits──▶ Stopped
//!                      │                                              ▲
//!                      └────────────── I/O error (fault) ─────────────┘
//! ```
//!
//! Cancellation is cooperative and only observed between iterations; a read that is
//! already in flight completes (and its report is delivered) before the thread exits.
//! The consumer runs synchronously, so a slow consumer delays the next read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::{PollPolicy, ReaderConfig};
use crate::device::RawDevice;
use crate::error::Error;
use crate::handle::Shared;

/// Lifecycle of a handle's background reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReaderStatus {
    /// No reader was ever started on this handle.
    Idle,
    /// The reader thread is looping.
    Running,
    /// Cancellation was requested; the current iteration is finishing.
    Stopping,
    /// The reader thread has returned, after cancellation or a fault.
    Stopped,
}

/// State shared between the owning handle and the reader thread.
struct ReaderShared {
    cancel: AtomicBool,
    status: Mutex<ReaderStatus>,
    fault: Mutex<Option<Error>>,
}

/// Marks the reader stopped however the thread exits, including a panicking consumer.
struct StopGuard(Arc<ReaderShared>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        *self.0.status.lock() = ReaderStatus::Stopped;
    }
}

pub(crate) struct ReaderTask {
    shared: Arc<ReaderShared>,
    thread: Option<JoinHandle<()>>,
}

impl ReaderTask {
    /// Spawn the reader thread for `device`.
    pub(crate) fn spawn<D, F>(
        device: Arc<Shared<D>>,
        config: &ReaderConfig,
        consumer: F,
    ) -> std::io::Result<Self>
    where
        D: RawDevice,
        F: FnMut(&[u8]) + Send + 'static,
    {
        let shared = Arc::new(ReaderShared {
            cancel: AtomicBool::new(false),
            status: Mutex::new(ReaderStatus::Running),
            fault: Mutex::new(None),
        });
        let thread_shared = Arc::clone(&shared);
        let poll = config.poll;

        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(device, thread_shared, poll, consumer))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub(crate) fn status(&self) -> ReaderStatus {
        *self.shared.status.lock()
    }

    /// The report being read when the fault hit is lost, bytes already received included.
    pub(crate) fn take_fault(&self) -> Option<Error> {
        self.shared.fault.lock().take()
    }

    /// Ask the thread to exit after its current iteration, without waiting for it.
    pub(crate) fn request_stop(&self) {
        {
            let mut status = self.shared.status.lock();
            if *status == ReaderStatus::Running {
                *status = ReaderStatus::Stopping;
            }
        }
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// Request cancellation and block until the thread has returned.
    pub(crate) fn stop(&mut self) {
        self.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("background reader panicked");
            }
        }
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<D, F>(
    device: Arc<Shared<D>>,
    shared: Arc<ReaderShared>,
    poll: PollPolicy,
    mut consumer: F,
) where
    D: RawDevice,
    F: FnMut(&[u8]),
{
    let _stopped = StopGuard(Arc::clone(&shared));
    debug!(path = device.path(), "background reader started");

    while !shared.cancel.load(Ordering::Acquire) {
        let cap = device.capability();
        if !cap.is_available() {
            trace!(path = device.path(), "capability unavailable, polling again");
            poll.idle();
            continue;
        }

        let mut report = vec![0u8; cap.input_report_len()];
        if let Err(e) = device.read_exact(&mut report) {
            warn!(path = device.path(), error = %e, "background reader stopped on I/O error");
            *shared.fault.lock() = Some(Error::Io(e));
            break;
        }
        consumer(&report);
    }

    debug!(path = device.path(), "background reader exiting");
}
