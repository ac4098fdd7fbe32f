//! Compact-size variable-length integers.
//!
//! The standard blockchain convention: values below `0xfd` occupy a
//! single byte; larger values carry a marker byte followed by the value
//! as a little-endian `u16`, `u32`, or `u64`:
//!
//! ```text
//! [0x00..=0xfc]          1 byte
//! 0xfd u16               3 bytes
//! 0xfe u32               5 bytes
//! 0xff u64               9 bytes
//! ```
//!
//! Decoding enforces the shortest form, so every value has exactly one
//! encoding. Every read takes an explicit `max` bound; counts parsed
//! from the wire are never trusted before the bound check.

use crate::{ensure_remaining, Error};
use bytes::{Buf, BufMut};

/// Number of bytes [`write`] produces for `value`.
pub fn size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append the compact-size encoding of `value` to `buf`.
pub fn write(buf: &mut impl BufMut, value: u64) {
    match value {
        0..=0xfc => buf.put_u8(value as u8),
        0xfd..=0xffff => {
            buf.put_u8(0xfd);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xffff_ffff => {
            buf.put_u8(0xfe);
            buf.put_u32_le(value as u32);
        }
        _ => {
            buf.put_u8(0xff);
            buf.put_u64_le(value);
        }
    }
}

/// Read a compact-size integer, rejecting values above `max` and
/// non-canonical encodings.
pub fn read(buf: &mut impl Buf, max: u64) -> Result<u64, Error> {
    ensure_remaining(buf, 1)?;
    let value = match buf.get_u8() {
        0xfd => {
            ensure_remaining(buf, 2)?;
            let v = buf.get_u16_le() as u64;
            if v < 0xfd {
                return Err(Error::NonCanonicalVarInt);
            }
            v
        }
        0xfe => {
            ensure_remaining(buf, 4)?;
            let v = buf.get_u32_le() as u64;
            if v <= 0xffff {
                return Err(Error::NonCanonicalVarInt);
            }
            v
        }
        0xff => {
            ensure_remaining(buf, 8)?;
            let v = buf.get_u64_le();
            if v <= 0xffff_ffff {
                return Err(Error::NonCanonicalVarInt);
            }
            v
        }
        prefix => prefix as u64,
    };
    if value > max {
        return Err(Error::LengthTooLarge { got: value, max });
    }
    Ok(value)
}

/// Size of a length-prefixed byte string of `len` bytes.
pub fn bytes_size(len: usize) -> usize {
    size(len as u64) + len
}

/// Append `bytes` with a compact-size length prefix.
pub fn write_bytes(buf: &mut impl BufMut, bytes: &[u8]) {
    write(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

/// Read a length-prefixed byte string of at most `max` bytes.
pub fn read_bytes(buf: &mut impl Buf, max: u64) -> Result<Vec<u8>, Error> {
    let len = read(buf, max)? as usize;
    ensure_remaining(buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}
