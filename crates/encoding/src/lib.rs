//! Deterministic binary codec.
//!
//! This crate provides the serialization layer shared by the wire messages
//! and the consensus checkpoint:
//!
//! - [`Encode`] / [`Decode`]: recursive serialization over [`bytes`] buffers
//! - [`varint`]: the compact-size integer convention used for all
//!   variable-length counts
//!
//! # Determinism
//!
//! Consensus requires that every honest node produce byte-identical
//! encodings for equal values, and that decoding is the exact inverse.
//! All integers are little-endian, collections are length-prefixed with a
//! canonical var_int, and decoders reject non-canonical or truncated
//! input. There is no versioning or schema negotiation here; the formats
//! are fixed by the protocol.
//!
//! # Untrusted input
//!
//! Decoders never panic on malformed bytes. Every length read from the
//! stream is checked against a caller-supplied bound before allocation,
//! so a hostile peer cannot force large allocations with a short message.

mod error;
pub mod varint;

pub use error::Error;

use bytes::{Buf, BufMut};

/// A value with a deterministic binary encoding.
pub trait Encode {
    /// Exact number of bytes [`Encode::write`] will produce.
    fn encoded_size(&self) -> usize;

    /// Append the encoding to `buf`.
    fn write(&self, buf: &mut impl BufMut);

    /// Encode into a freshly allocated, exactly sized vector.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        self.write(&mut out);
        out
    }
}

/// A value decodable from untrusted bytes.
pub trait Decode: Sized {
    /// Consume one value from the front of `buf`.
    fn read(buf: &mut impl Buf) -> Result<Self, Error>;

    /// Decode a complete buffer, rejecting trailing bytes.
    fn decode_all(mut bytes: &[u8]) -> Result<Self, Error> {
        let value = Self::read(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(Error::TrailingBytes(bytes.len()));
        }
        Ok(value)
    }
}

/// Check that `buf` has at least `needed` readable bytes.
pub fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), Error> {
    if buf.remaining() < needed {
        return Err(Error::EndOfBuffer);
    }
    Ok(())
}

macro_rules! impl_int {
    ($type:ty, $put:ident, $get:ident) => {
        impl Encode for $type {
            fn encoded_size(&self) -> usize {
                std::mem::size_of::<$type>()
            }

            fn write(&self, buf: &mut impl BufMut) {
                buf.$put(*self);
            }
        }

        impl Decode for $type {
            fn read(buf: &mut impl Buf) -> Result<Self, Error> {
                ensure_remaining(buf, std::mem::size_of::<$type>())?;
                Ok(buf.$get())
            }
        }
    };
}

impl_int!(u8, put_u8, get_u8);
impl_int!(u16, put_u16_le, get_u16_le);
impl_int!(u32, put_u32_le, get_u32_le);
impl_int!(u64, put_u64_le, get_u64_le);
impl_int!(i64, put_i64_le, get_i64_le);

impl Encode for bool {
    fn encoded_size(&self) -> usize {
        1
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(*self as u8);
    }
}

impl Decode for bool {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        match u8::read(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidTag(other, "bool")),
        }
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encoded_size(&self) -> usize {
        N
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        ensure_remaining(buf, N)?;
        let mut out = [0u8; N];
        buf.copy_to_slice(&mut out);
        Ok(out)
    }
}
