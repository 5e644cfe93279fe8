use std::time::Duration;

use crate::error::Result;

pub mod hid;

/// A byte-oriented channel to the meter's HID endpoint.
///
/// `read()` returns the payload of one logical ASTM-frame transmission,
/// internally looping over max-payload HID blocks until a short one arrives.
/// `write()` emits a single one-byte control/report write. The channel is
/// synchronous and blocking, with a 5-second read timeout.
pub trait Channel: Send {
    /// Write one control or data byte as a single HID output report.
    fn write(&mut self, c: u8) -> Result<()>;

    /// Block until one ASTM-frame transmission's worth of payload bytes has
    /// been read (or the timeout elapses).
    fn read(&mut self) -> Result<Vec<u8>>;
}

/// One HID report is this many bytes.
pub const BLOCK_SIZE: usize = 64;
/// Max payload bytes per block; a block this full means more data follows.
pub const MAX_PAYLOAD: usize = BLOCK_SIZE - 4;
/// Per-read timeout.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);
