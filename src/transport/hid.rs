use std::sync::{Mutex, OnceLock};

use hidapi::{HidApi, HidDevice};
use log::{debug, info, warn};

use super::{Channel, MAX_PAYLOAD, READ_TIMEOUT};
use crate::error::{ContourError, Result};

/// Bayer/Ascensia USB vendor ID.
pub const VENDOR_ID: u16 = 0x1A79;
/// Contour-family product IDs to try, in order.
pub const PRODUCT_IDS: &[u16] = &[
    0x6002, // Contour USB
    0x7410, // Contour Next USB
    0x7800, // Contour Next ONE
];

static HID_API: OnceLock<Mutex<HidApi>> = OnceLock::new();

/// Lazily initialize the process-global hidapi context. Idempotent: later
/// calls reuse the same instance. There is no explicit teardown call — the
/// OS reclaims the USB handle at process exit, matching the observable
/// behavior of the original driver's atexit-run `HidInitializer` without
/// needing a destructor hook of our own.
fn hid_api() -> Result<&'static Mutex<HidApi>> {
    if let Some(m) = HID_API.get() {
        return Ok(m);
    }
    let api = HidApi::new().map_err(|e| ContourError::transport("hid_init", e))?;
    let _ = HID_API.set(Mutex::new(api));
    Ok(HID_API.get().expect("just initialized"))
}

/// A channel backed by a real Contour-family HID device.
pub struct HidChannel {
    device: HidDevice,
}

impl HidChannel {
    /// Iterate the Bayer vendor ID against the known Contour product IDs,
    /// opening the first device that answers.
    pub fn open() -> Result<Self> {
        let api = hid_api()?;
        let api = api.lock().expect("hid api mutex poisoned");

        for &product_id in PRODUCT_IDS {
            debug!("probing Contour product id {product_id:#06x}");
            match api.open(VENDOR_ID, product_id) {
                Ok(device) => {
                    info!("opened Contour-family meter (product id {product_id:#06x})");
                    return Ok(Self { device });
                }
                Err(e) => debug!("product id {product_id:#06x} not present: {e}"),
            }
        }

        warn!("no Contour-family meter found among {} product ids", PRODUCT_IDS.len());
        Err(ContourError::DeviceNotFound)
    }
}

impl Channel for HidChannel {
    fn write(&mut self, c: u8) -> Result<()> {
        let buf = [b'A', b'B', b'C', 1, c];
        self.device
            .write(&buf)
            .map_err(|e| ContourError::transport("hid_write", e))?;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        let mut ret = Vec::new();
        loop {
            let mut block = [0u8; super::BLOCK_SIZE];
            let n = self
                .device
                .read_timeout(&mut block, READ_TIMEOUT.as_millis() as i32)
                .map_err(|e| ContourError::transport("hid_read", e))?;
            if n == 0 {
                return Err(ContourError::ReadTimeout);
            }

            let len = block[3] as usize;
            let len = len.min(MAX_PAYLOAD);
            ret.extend_from_slice(&block[4..4 + len]);

            if len != MAX_PAYLOAD {
                break;
            }
        }
        Ok(ret)
    }
}
