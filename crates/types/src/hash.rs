//! Fixed-width digests and the protocol hash functions.

use dbft_encoding::{Decode, Encode, Error};
use bytes::{Buf, BufMut};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure parsing a digest from its hex form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HexError {
    /// Input length does not match the digest width.
    #[error("expected {expected} hex characters, got {got}")]
    BadLength { expected: usize, got: usize },
    /// Input contains a non-hex character.
    #[error("invalid hex character")]
    BadCharacter,
}

macro_rules! uint {
    ($name:ident, $bytes:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $bytes]);

        impl $name {
            /// Width of the digest in bytes.
            pub const LEN: usize = $bytes;

            /// The all-zero digest.
            pub const ZERO: Self = Self([0u8; $bytes]);

            /// Wrap raw digest bytes.
            pub const fn from_bytes(bytes: [u8; $bytes]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw digest bytes.
            pub fn as_bytes(&self) -> &[u8; $bytes] {
                &self.0
            }

            /// Whether every byte is zero.
            ///
            /// Zero doubles as "absent" in the checkpoint format, so this
            /// is the canonical presence check.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $bytes]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full digests drown log lines; eight hex chars identify.
                write!(f, concat!(stringify!($name), "({}..)"), &hex::encode(&self.0[..4]))
            }
        }

        impl FromStr for $name {
            type Err = HexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != $bytes * 2 {
                    return Err(HexError::BadLength {
                        expected: $bytes * 2,
                        got: s.len(),
                    });
                }
                let mut out = [0u8; $bytes];
                hex::decode_to_slice(s, &mut out).map_err(|_| HexError::BadCharacter)?;
                Ok(Self(out))
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Encode for $name {
            fn encoded_size(&self) -> usize {
                $bytes
            }

            fn write(&self, buf: &mut impl BufMut) {
                buf.put_slice(&self.0);
            }
        }

        impl Decode for $name {
            fn read(buf: &mut impl Buf) -> Result<Self, Error> {
                Ok(Self(<[u8; $bytes]>::read(buf)?))
            }
        }
    };
}

uint!(UInt160, 20, "A 160-bit digest: script hashes and addresses.");
uint!(UInt256, 32, "A 256-bit digest: block, transaction, and payload hashes.");

/// Protocol hash: double SHA-256.
pub fn hash256(data: &[u8]) -> UInt256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    UInt256::from_bytes(second.into())
}

/// Script-hash digest: SHA-256 truncated to 160 bits.
pub fn hash160(data: &[u8]) -> UInt160 {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    UInt160::from_bytes(out)
}
