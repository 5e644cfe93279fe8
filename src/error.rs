use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContourError>;

#[derive(Debug, Error)]
pub enum ContourError {
    #[error("HID transport error during {op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: hidapi::HidError,
    },

    #[error("no Contour-family meter found on USB")]
    DeviceNotFound,

    #[error("no response from meter within the read timeout")]
    ReadTimeout,

    #[error("bad frame record number, got {got}, expected {expected}")]
    BadRecno { got: u8, expected: u8 },

    #[error("bad frame checksum, got {got:#04x}, expected {expected:#04x}")]
    BadChecksum { got: u8, expected: u8 },

    #[error("malformed ASTM frame: {0}")]
    MalformedFrame(&'static str),

    #[error("malformed ASTM record: {0}")]
    MalformedRecord(String),

    #[error("unsupported record type 'O' (Order)")]
    UnsupportedRecord,

    #[error("unparseable line, unrecognized leading character {0:?}")]
    UnparseableLine(char),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContourError {
    pub fn transport(op: &'static str, source: hidapi::HidError) -> Self {
        ContourError::Transport { op, source }
    }
}
