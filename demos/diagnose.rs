//! List HID devices, open the last one and read five bytes from it.
//!
//! `cargo run --example diagnose [-- --json]`

#[cfg(all(feature = "hid", target_os = "windows"))]
fn main() -> hidlink::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let devices = hidlink::browse()?;
    if std::env::args().any(|a| a == "--json") {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        for id in &devices {
            println!("{id}");
        }
    }

    let Some(last) = devices.last() else {
        println!("no HID devices found");
        return Ok(());
    };

    let handle = hidlink::open(last.path())?;
    println!("{}: {}", last.path(), handle.capability());

    let mut bytes = [0u8; 5];
    handle.read_exact(&mut bytes)?;
    println!("{bytes:02X?}");
    handle.close();
    Ok(())
}

#[cfg(not(all(feature = "hid", target_os = "windows")))]
fn main() {
    eprintln!("diagnose needs the Windows HID backend (`hid` feature on Windows)");
}
