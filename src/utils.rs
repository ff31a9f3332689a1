use chrono::{DateTime, Utc};

pub struct Utils;

impl Utils {
    pub fn utc() -> DateTime<Utc> {
        Utc::now()
    }

    /// Lower-case hex, two digits per byte, no separators.
    pub fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Renders a float the way the console output lines values up.
    pub fn fixed2(value: f64) -> String {
        format!("{:8.2}", value)
    }
}
