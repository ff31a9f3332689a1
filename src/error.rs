use std::time::Duration;

use crate::utils::Utils;

/// Failures of a single request/response exchange with the inverter.
///
/// None of these are retried inside the crate; they unwind out of the poll
/// cycle and the scheduler so the caller can decide what to do.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The response trailer did not match the CRC recomputed over the body.
    #[error("crc mismatch: buf {} calculated crc {:04x}", Utils::hex(.buf), .crc)]
    Crc { buf: Vec<u8>, crc: u16 },

    /// Read or write did not complete in time, usually because the inverter
    /// has shut down for the night while the WiFi bridge stays up.
    #[error("no reply from inverter within {0:?}")]
    Timeout(Duration),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("response too short to carry a crc ({0} bytes)")]
    ShortResponse(usize),

    #[error("payload too short: need {needed} bytes, got {got}")]
    ShortPayload { needed: usize, got: usize },

    #[error("connection closed by bridge")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the errors that mean "the inverter is not answering", as
    /// opposed to corrupted data or a configuration mistake.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Disconnected)
    }
}
