//! Script pair authorizing a signed entity.

use crate::hash::{hash160, UInt160};
use dbft_encoding::{varint, Decode, Encode, Error};
use bytes::{Buf, BufMut};

/// Largest invocation script accepted from the wire.
///
/// An M-of-N invocation holds at most N signature pushes of 65 bytes
/// each; 1024 validators fit with ample slack.
pub const MAX_INVOCATION_SCRIPT: usize = 66 * 1024;

/// Largest verification script accepted from the wire.
pub const MAX_VERIFICATION_SCRIPT: usize = 64 * 1024;

/// A witness: the invocation script supplies arguments (signatures), the
/// verification script is the contract they must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Witness {
    /// Pushes the signatures.
    pub invocation: Vec<u8>,
    /// The signature or multisig contract being satisfied.
    pub verification: Vec<u8>,
}

impl Witness {
    /// Create a witness from its two scripts.
    pub fn new(invocation: Vec<u8>, verification: Vec<u8>) -> Self {
        Self {
            invocation,
            verification,
        }
    }

    /// Script hash of the verification script, i.e. the address this
    /// witness speaks for.
    pub fn script_hash(&self) -> UInt160 {
        hash160(&self.verification)
    }
}

impl Encode for Witness {
    fn encoded_size(&self) -> usize {
        varint::bytes_size(self.invocation.len()) + varint::bytes_size(self.verification.len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        varint::write_bytes(buf, &self.invocation);
        varint::write_bytes(buf, &self.verification);
    }
}

impl Decode for Witness {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let invocation = varint::read_bytes(buf, MAX_INVOCATION_SCRIPT as u64)?;
        let verification = varint::read_bytes(buf, MAX_VERIFICATION_SCRIPT as u64)?;
        Ok(Self {
            invocation,
            verification,
        })
    }
}
