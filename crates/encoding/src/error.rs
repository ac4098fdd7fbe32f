//! Codec error taxonomy.

use thiserror::Error;

/// Errors surfaced while decoding untrusted bytes.
///
/// Encoding is infallible; only decoding can fail. Callers that load
/// persisted state treat any of these as "no saved state" rather than a
/// fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The buffer ended before the value was complete.
    #[error("unexpected end of buffer")]
    EndOfBuffer,

    /// A length prefix exceeded the bound the caller allows.
    #[error("length {got} exceeds maximum {max}")]
    LengthTooLarge { got: u64, max: u64 },

    /// A var_int used a longer form than its value requires.
    #[error("non-canonical var_int")]
    NonCanonicalVarInt,

    /// A discriminant byte did not name a known variant.
    #[error("invalid tag {0:#04x} for {1}")]
    InvalidTag(u8, &'static str),

    /// A field decoded structurally but failed validation.
    #[error("invalid {0}")]
    InvalidData(&'static str),

    /// `decode_all` found bytes after the value.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}
