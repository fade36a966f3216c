//! Background reading against a simulated 8-byte counter device.
//!
//! `RUST_LOG=hidlink=trace cargo run --example sim_counter`

use std::sync::mpsc;
use std::time::Duration;

use hidlink::backends::sim::{counter_reports, SimBus, SimDevice};
use hidlink::{DeviceHandle, DeviceIdentity};

fn main() -> hidlink::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hidlink=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let bus = SimBus::new();
    bus.attach(
        SimDevice::with_identity(
            DeviceIdentity::new("sim://counter", 0x1209, 0x0001).with_product("Counter"),
        )
        .with_report_len(8)
        .with_source(counter_reports(8)),
    );

    let mut handle = DeviceHandle::open(&bus, "sim://counter")?;
    println!("{}", handle.capability());

    let (tx, rx) = mpsc::sync_channel(16);
    handle.start_reading(move |report| {
        let _ = tx.try_send(report.to_vec());
    })?;

    for report in rx.iter().take(5) {
        println!("{report:02X?}");
    }
    std::thread::sleep(Duration::from_millis(10));

    handle.close();
    println!("closed");
    Ok(())
}
