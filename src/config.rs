//! Device and reader configuration.
//!
//! [`DeviceConfig`] holds the few knobs a device handle has. Every field has a default, so
//! an empty TOML document is a valid configuration:
//!
//! ```toml
//! stream_buffer_size = 64
//! max_zero_reads = 3
//!
//! [reader]
//! thread_name = "hid-reader"
//! poll = "spin"                      # or "yield", or { sleep = { micros = 500 } }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Buffer size of the stream bound to every opened handle.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Consecutive 0-byte reads tolerated by `read_exact` before it gives up.
pub const DEFAULT_MAX_ZERO_READS: u32 = 3;

/// What the background reader does when the capability query comes back empty.
///
/// The default is [`PollPolicy::Spin`]: re-query immediately, without any delay. That pins a
/// core while a device has no preparsed data, so hosts that care should pick one of the
/// other policies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPolicy {
    #[default]
    Spin,
    /// Yield the reader thread's time slice between attempts.
    Yield,
    /// Sleep for `micros` microseconds between attempts.
    Sleep { micros: u64 },
}

impl PollPolicy {
    /// Wait (or not) before the next capability query.
    pub fn idle(&self) {
        match *self {
            PollPolicy::Spin => {}
            PollPolicy::Yield => std::thread::yield_now(),
            PollPolicy::Sleep { micros } => std::thread::sleep(Duration::from_micros(micros)),
        }
    }
}

/// Background reader settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Name given to the reader's OS thread.
    pub thread_name: String,
    /// Behavior while the capability is unavailable.
    pub poll: PollPolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            thread_name: "hid-reader".into(),
            poll: PollPolicy::Spin,
        }
    }
}

/// Per-handle configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Capacity of the read and write buffers of the handle's stream.
    pub stream_buffer_size: usize,
    /// Consecutive 0-byte reads tolerated by `read_exact` before it fails with
    /// `UnexpectedEof`.
    pub max_zero_reads: u32,
    pub reader: ReaderConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            stream_buffer_size: DEFAULT_STREAM_BUFFER,
            max_zero_reads: DEFAULT_MAX_ZERO_READS,
            reader: ReaderConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: DeviceConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values the handle cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.stream_buffer_size == 0 {
            return Err(Error::Config("stream_buffer_size must be at least 1".into()));
        }
        if self.max_zero_reads == 0 {
            return Err(Error::Config("max_zero_reads must be at least 1".into()));
        }
        if self.reader.thread_name.is_empty() {
            return Err(Error::Config("reader.thread_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg = DeviceConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, DeviceConfig::default());
        assert_eq!(cfg.stream_buffer_size, 64);
        assert_eq!(cfg.reader.poll, PollPolicy::Spin);
    }

    #[test]
    fn parses_every_poll_policy() {
        let spin = DeviceConfig::from_toml_str("[reader]\npoll = \"spin\"\n").unwrap();
        assert_eq!(spin.reader.poll, PollPolicy::Spin);

        let yld = DeviceConfig::from_toml_str("[reader]\npoll = \"yield\"\n").unwrap();
        assert_eq!(yld.reader.poll, PollPolicy::Yield);

        let sleep =
            DeviceConfig::from_toml_str("[reader]\npoll = { sleep = { micros = 250 } }\n").unwrap();
        assert_eq!(sleep.reader.poll, PollPolicy::Sleep { micros: 250 });
    }

    #[test]
    fn partial_documents_keep_other_defaults() {
        let cfg = DeviceConfig::from_toml_str("max_zero_reads = 10\n").unwrap();
        assert_eq!(cfg.max_zero_reads, 10);
        assert_eq!(cfg.stream_buffer_size, DEFAULT_STREAM_BUFFER);
        assert_eq!(cfg.reader.thread_name, "hid-reader");
    }

    #[test]
    fn rejects_zero_sizes() {
        let err = DeviceConfig::from_toml_str("stream_buffer_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = DeviceConfig::from_toml_str("max_zero_reads = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = DeviceConfig::from_toml_str("stream_buffer_size = \"big\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn toml_round_trip_preserves_sleep_policy() {
        let mut cfg = DeviceConfig::default();
        cfg.reader.poll = PollPolicy::Sleep { micros: 1000 };
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(DeviceConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stream_buffer_size = 128\n[reader]\nthread_name = \"pad\"").unwrap();

        let cfg = DeviceConfig::load(file.path()).unwrap();
        assert_eq!(cfg.stream_buffer_size, 128);
        assert_eq!(cfg.reader.thread_name, "pad");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = DeviceConfig::load("/definitely/not/here/hidlink.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
