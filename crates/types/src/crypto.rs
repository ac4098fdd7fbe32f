//! ECDSA keys and signatures.
//!
//! Validators sign with secp256k1 ECDSA: compressed 33-byte SEC1 public
//! keys and 64-byte `r || s` signatures. Signing uses RFC 6979
//! deterministic nonces, so signing needs no RNG and equal inputs
//! produce equal signatures.

use dbft_encoding::{Decode, Encode, Error as CodecError};
use bytes::{Buf, BufMut};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use std::fmt;
use thiserror::Error;

/// Errors from key material handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Bytes do not describe a point on the curve.
    #[error("invalid public key")]
    InvalidPublicKey,
    /// Bytes do not describe a valid secret scalar.
    #[error("invalid private key")]
    InvalidPrivateKey,
}

/// Compressed secp256k1 public key (33 bytes).
///
/// Ordered by encoded bytes; validator sets rely on this ordering being
/// total and stable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 33]);

impl PublicKey {
    /// Encoded width in bytes.
    pub const LEN: usize = 33;

    /// Create from compressed SEC1 bytes, validating the curve point.
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Verify `signature` over `message`.
    ///
    /// Malformed signature bytes verify as `false`; peers produce those,
    /// not errors.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_sec1_bytes(&self.0) else {
            return false;
        };
        let Ok(sig) = EcdsaSignature::from_slice(signature.as_bytes()) else {
            return false;
        };
        key.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Encode for PublicKey {
    fn encoded_size(&self) -> usize {
        Self::LEN
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.0);
    }
}

impl Decode for PublicKey {
    fn read(buf: &mut impl Buf) -> Result<Self, CodecError> {
        let bytes = <[u8; 33]>::read(buf)?;
        Self::from_bytes(bytes).map_err(|_| CodecError::InvalidData("public key"))
    }
}

/// ECDSA signature, 64 bytes `r || s`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    /// Encoded width in bytes.
    pub const LEN: usize = 64;

    /// Wrap raw signature bytes. Validity is checked at verification.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..4]))
    }
}

impl Encode for Signature {
    fn encoded_size(&self) -> usize {
        Self::LEN
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.0);
    }
}

impl Decode for Signature {
    fn read(buf: &mut impl Buf) -> Result<Self, CodecError> {
        Ok(Self(<[u8; 64]>::read(buf)?))
    }
}

/// secp256k1 signing keypair.
///
/// The public key is cached at construction so hot paths never re-derive
/// the curve point.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the given RNG.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        Self::from_signing_key(SigningKey::random(rng))
    }

    /// Reconstruct from secret scalar bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing =
            SigningKey::from_bytes(&bytes.into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_signing_key(signing))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let sec1 = signing.verifying_key().to_sec1_bytes();
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1);
        Self {
            signing,
            public: PublicKey(bytes),
        }
    }

    /// The compressed public key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Sign `message` (RFC 6979, deterministic).
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig: EcdsaSignature = self.signing.sign(message);
        Signature(sig.to_bytes().into())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never render the secret scalar.
        f.debug_struct("KeyPair").field("public", &self.public).finish()
    }
}
