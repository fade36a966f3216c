use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hidlink::backends::sim::{counter_reports, SimBus, SimDevice};
use hidlink::{DeviceConfig, DeviceHandle, PollPolicy, ReaderConfig, ReaderStatus};

const WAIT: Duration = Duration::from_secs(5);

fn counter_device(bus: &SimBus, path: &str, len: u16) -> Arc<SimDevice> {
    bus.attach(
        SimDevice::new(path)
            .with_report_len(len)
            .with_source(counter_reports(len as usize)),
    )
}

fn wait_for_status<D: hidlink::RawDevice>(handle: &DeviceHandle<D>, want: ReaderStatus) {
    let deadline = Instant::now() + WAIT;
    while handle.reader_status() != want {
        assert!(Instant::now() < deadline, "reader never reached {want:?}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn delivers_reports_in_order_and_nothing_after_close() {
    let bus = SimBus::new();
    let dev = counter_device(&bus, "sim://counter", 8);
    let mut handle = DeviceHandle::open(&bus, "sim://counter").unwrap();

    let (tx, rx) = mpsc::channel();
    handle
        .start_reading(move |report| {
            let _ = tx.send(report.to_vec());
        })
        .unwrap();
    assert!(handle.is_reading());

    for expected in 0u8..3 {
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), vec![expected; 8]);
    }

    let started = Instant::now();
    handle.close();
    assert!(started.elapsed() < WAIT);
    assert_eq!(dev.open_handles(), 0);

    // Whatever was delivered before close is still contiguous; then the consumer is gone.
    let mut next = 3u8;
    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(report) => {
                assert_eq!(report, vec![next; 8]);
                next = next.wrapping_add(1);
            }
            Err(e) => {
                assert_eq!(e, RecvTimeoutError::Disconnected);
                break;
            }
        }
    }
}

#[test]
fn consumer_runs_on_the_named_reader_thread() {
    let bus = SimBus::new();
    counter_device(&bus, "sim://named", 2);
    let config = DeviceConfig {
        reader: ReaderConfig {
            thread_name: "pad-reader".into(),
            ..ReaderConfig::default()
        },
        ..DeviceConfig::default()
    };
    let mut handle = DeviceHandle::open_with_config(&bus, "sim://named", config).unwrap();

    let (tx, rx) = mpsc::channel();
    handle
        .start_reading(move |_| {
            let name = std::thread::current().name().map(str::to_owned);
            let _ = tx.send(name);
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap().as_deref(), Some("pad-reader"));
    handle.close();
}

#[test]
fn second_start_is_a_no_op() {
    let bus = SimBus::new();
    counter_device(&bus, "sim://twice", 4);
    let mut handle = DeviceHandle::open(&bus, "sim://twice").unwrap();

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    let counter = Arc::clone(&first);
    handle
        .start_reading(move |report| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(report[0]);
        })
        .unwrap();
    let counter = Arc::clone(&second);
    handle
        .start_reading(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    // A single reader means a single, gap-free counter sequence.
    for expected in 0u8..5 {
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), expected);
    }
    handle.close();

    assert!(first.load(Ordering::SeqCst) >= 5);
    assert_eq!(second.load(Ordering::SeqCst), 0);
}

#[test]
fn end_of_stream_stops_the_reader_with_a_fault() {
    let bus = SimBus::new();
    bus.attach(
        SimDevice::new("sim://short")
            .with_report_len(4)
            .with_input(&[1, 2, 3, 4, 5, 6])
            .end_of_stream_when_empty(),
    );
    let mut handle = DeviceHandle::open(&bus, "sim://short").unwrap();

    let (tx, rx) = mpsc::channel();
    handle
        .start_reading(move |report| {
            let _ = tx.send(report.to_vec());
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), vec![1, 2, 3, 4]);
    wait_for_status(&handle, ReaderStatus::Stopped);
    assert!(!handle.is_reading());

    let fault = handle.take_reader_fault().expect("reader fault");
    assert!(fault.is_io());
    assert_eq!(fault.kind(), Some(io::ErrorKind::UnexpectedEof));
    assert!(handle.take_reader_fault().is_none());

    // A stopped reader is not restarted.
    handle.start_reading(|_| panic!("restarted")).unwrap();
    assert_eq!(handle.reader_status(), ReaderStatus::Stopped);
    handle.close();
}

#[test]
fn disconnect_faults_the_reader() {
    let bus = SimBus::new();
    let dev = bus.attach(SimDevice::new("sim://unplug").with_report_len(2));
    let mut handle = DeviceHandle::open(&bus, "sim://unplug").unwrap();
    handle.start_reading(|_| {}).unwrap();

    dev.disconnect();
    wait_for_status(&handle, ReaderStatus::Stopped);
    assert_eq!(
        handle.take_reader_fault().and_then(|e| e.kind()),
        Some(io::ErrorKind::BrokenPipe)
    );
    handle.close();
    assert_eq!(dev.open_handles(), 0);
}

#[test]
fn reader_waits_for_the_capability_to_appear() {
    let bus = SimBus::new();
    let dev = bus.attach(SimDevice::new("sim://late-caps").with_source(counter_reports(4)));
    let config = DeviceConfig {
        reader: ReaderConfig {
            poll: PollPolicy::Yield,
            ..ReaderConfig::default()
        },
        ..DeviceConfig::default()
    };
    let mut handle = DeviceHandle::open_with_config(&bus, "sim://late-caps", config).unwrap();

    let (tx, rx) = mpsc::channel();
    handle
        .start_reading(move |report| {
            let _ = tx.send(report.to_vec());
        })
        .unwrap();

    assert_eq!(
        rx.recv_timeout(Duration::from_millis(50)),
        Err(RecvTimeoutError::Timeout)
    );
    assert_eq!(dev.read_calls(), 0);
    assert!(handle.is_reading());

    dev.set_report_len(Some(4));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), vec![0; 4]);
    handle.close();
}

#[test]
fn close_while_polling_for_capability_is_prompt() {
    let bus = SimBus::new();
    let dev = bus.attach(SimDevice::new("sim://no-caps"));
    let config = DeviceConfig {
        reader: ReaderConfig {
            poll: PollPolicy::Sleep { micros: 500 },
            ..ReaderConfig::default()
        },
        ..DeviceConfig::default()
    };
    let mut handle = DeviceHandle::open_with_config(&bus, "sim://no-caps", config).unwrap();
    handle.start_reading(|_| panic!("no report expected")).unwrap();

    let started = Instant::now();
    handle.close();
    assert!(started.elapsed() < WAIT);
    assert_eq!(dev.preparsed_outstanding(), 0);
}

#[test]
fn writes_go_through_while_reading() {
    let bus = SimBus::new();
    let dev = counter_device(&bus, "sim://duplex", 8);
    let mut handle = DeviceHandle::open(&bus, "sim://duplex").unwrap();

    let (tx, rx) = mpsc::channel();
    handle
        .start_reading(move |report| {
            let _ = tx.send(report[0]);
        })
        .unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 0);

    handle.write(&[0x01, 0x80, 0x00]).unwrap();
    assert_eq!(dev.written(), vec![0x01, 0x80, 0x00]);
    handle.close();
}

#[test]
fn dropping_a_reading_handle_stops_and_closes() {
    let bus = SimBus::new();
    let dev = counter_device(&bus, "sim://drop", 8);
    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let mut handle = DeviceHandle::open(&bus, "sim://drop").unwrap();
        let counted = Arc::clone(&delivered);
        handle
            .start_reading(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let deadline = Instant::now() + WAIT;
        while delivered.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline);
            std::thread::yield_now();
        }
    }

    let after_drop = delivered.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(delivered.load(Ordering::SeqCst), after_drop);
    assert_eq!(dev.open_handles(), 0);
}

#[test]
fn close_waits_for_the_read_in_flight() {
    let bus = SimBus::new();
    let dev = bus.attach(SimDevice::new("sim://in-flight").with_report_len(4));
    let mut handle = DeviceHandle::open(&bus, "sim://in-flight").unwrap();

    let (tx, rx) = mpsc::channel();
    handle
        .start_reading(move |report| {
            let _ = tx.send(report.to_vec());
        })
        .unwrap();
    let deadline = Instant::now() + WAIT;
    while dev.read_calls() == 0 {
        assert!(Instant::now() < deadline, "reader never issued a read");
        std::thread::yield_now();
    }

    let closer = std::thread::spawn(move || {
        let started = Instant::now();
        handle.close();
        started.elapsed()
    });

    std::thread::sleep(Duration::from_millis(100));
    assert!(!closer.is_finished(), "close returned under a pending read");
    assert_eq!(dev.open_handles(), 1);

    dev.push_input(&[7, 7, 7, 7]);
    let took = closer.join().unwrap();
    assert!(took >= Duration::from_millis(100));
    assert_eq!(dev.open_handles(), 0);

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), vec![7, 7, 7, 7]);
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(100)),
        Err(RecvTimeoutError::Disconnected)
    );
}
