use crate::prelude::*;

use chrono::{DateTime, NaiveDate};
use nom::number::complete::{be_f32, be_i32, be_u32};

/// Every request is exactly this long, CRC included.
pub const FRAME_LEN: usize = 10;
/// Most replies are 8 bytes; we read up to this many in one go.
pub const MAX_RESPONSE: usize = 16;
/// Byte 0 of a reply is the transmission state, byte 1 the global state.
pub const VALUE_OFFSET: usize = 2;

pub type Frame = [u8; FRAME_LEN];

// {{{ crc
/// CRC-16/X-25: reflected poly 0x8408, init 0xffff, final inversion.
pub fn crc16(data: &[u8]) -> u16 {
    crc16::State::<crc16::X_25>::calculate(data)
}

/// Appends the little-endian CRC of `buf` to it.
pub fn add_crc(buf: &mut Vec<u8>) {
    let crc = crc16(buf);
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// Checks the 2-byte trailer against the CRC of everything before it and
/// returns the body.
pub fn strip_crc(buf: &[u8]) -> Result<&[u8], Error> {
    if buf.len() < 2 {
        return Err(Error::ShortResponse(buf.len()));
    }

    let (data, trailer) = buf.split_at(buf.len() - 2);
    let crc = crc16(data);
    if crc.to_le_bytes() != trailer {
        return Err(Error::Crc {
            buf: buf.to_vec(),
            crc,
        });
    }

    Ok(data)
}
// }}}

// {{{ frames
pub fn build_frame(address: u8, opcode: u8, sub_opcode: Option<u8>) -> Frame {
    let mut r = [0; FRAME_LEN];

    r[0] = address;
    r[1] = opcode;
    r[2] = sub_opcode.unwrap_or(0);
    // r[3] is the "global" flag; always 0 (module-local measurement)

    let crc = crc16(&r[..8]);
    r[8..].copy_from_slice(&crc.to_le_bytes());

    r
}

/// Splits a reply body into (transmission state, global state).
pub fn states(payload: &[u8]) -> Option<(u8, u8)> {
    match payload {
        [transmission, global, ..] => Some((*transmission, *global)),
        _ => None,
    }
}
// }}}

// {{{ decoders
/// Bytes after the two state bytes; a body without both state bytes never
/// carries a value, even an empty string.
fn value_bytes(payload: &[u8], needed: usize) -> Result<&[u8], Error> {
    match payload.get(VALUE_OFFSET..) {
        Some(input) if input.len() >= needed => Ok(input),
        input => Err(Error::ShortPayload {
            needed,
            got: input.map_or(0, <[u8]>::len),
        }),
    }
}

fn short(got: usize) -> Error {
    Error::ShortPayload { needed: 4, got }
}

pub fn decode_i32(payload: &[u8]) -> Result<i32, Error> {
    let input = value_bytes(payload, 4)?;
    be_i32::<_, nom::error::Error<&[u8]>>(input)
        .map(|(_, v)| v)
        .map_err(|_| short(input.len()))
}

pub fn decode_f32(payload: &[u8]) -> Result<f32, Error> {
    let input = value_bytes(payload, 4)?;
    be_f32::<_, nom::error::Error<&[u8]>>(input)
        .map(|(_, v)| v)
        .map_err(|_| short(input.len()))
}

/// Text from offset 2 onwards, with NUL padding dropped.
pub fn decode_string(payload: &[u8]) -> Result<String, Error> {
    let input = value_bytes(payload, 0)?;
    Ok(ascii(input))
}

/// Text over the whole body; part and serial numbers have no state bytes.
pub fn decode_ascii(payload: &[u8]) -> Result<String, Error> {
    Ok(ascii(payload))
}

/// Seconds since the Unix epoch, reduced to the UTC calendar date.
pub fn decode_date(payload: &[u8]) -> Result<NaiveDate, Error> {
    let input = value_bytes(payload, 4)?;
    let (_, secs) = be_u32::<_, nom::error::Error<&[u8]>>(input).map_err(|_| short(input.len()))?;

    // every u32 second count is inside chrono's range
    Ok(DateTime::from_timestamp(i64::from(secs), 0)
        .unwrap_or_default()
        .date_naive())
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
// }}}
