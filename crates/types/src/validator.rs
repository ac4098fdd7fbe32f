//! Validator-set math and multisig contracts.
//!
//! A validator set of `N` keys tolerates `F = (N - 1) / 3` Byzantine
//! members; `M = N - F` signatures form a quorum. Blocks are witnessed by
//! an M-of-N multisig contract over the set, and the contract's script
//! hash is the set's *consensus address*.
//!
//! # Script scheme
//!
//! Scripts use a minimal push-style opcode set:
//!
//! ```text
//! 0x01..=0x4b   push that many literal bytes
//! 0x51..=0x60   push the small integer 1..=16
//! 0xac          CHECKSIG
//! 0xae          CHECKMULTISIG
//! ```
//!
//! Integers above 16 are pushed as minimal little-endian literals. The
//! byte layout is fixed; peers hash these scripts, so any change forks
//! the consensus address.

use crate::crypto::{PublicKey, Signature};
use crate::hash::{hash160, UInt160};
use crate::witness::Witness;

/// Upper bound on validator-set size accepted from the wire.
pub const MAX_VALIDATORS: usize = 1024;

const OP_PUSH1: u8 = 0x51;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKMULTISIG: u8 = 0xae;

/// `F`: the number of Byzantine validators an `n`-validator set tolerates.
pub fn max_faulty(n: usize) -> usize {
    n.saturating_sub(1) / 3
}

/// `M`: signatures required for a quorum over an `n`-validator set.
pub fn quorum(n: usize) -> usize {
    n - max_faulty(n)
}

fn emit_push_int(script: &mut Vec<u8>, value: usize) {
    debug_assert!(value >= 1, "protocol never pushes zero");
    if value <= 16 {
        script.push(OP_PUSH1 + (value as u8 - 1));
        return;
    }
    let bytes = value.to_le_bytes();
    let len = bytes.iter().rposition(|&b| b != 0).expect("value > 16") + 1;
    script.push(len as u8);
    script.extend_from_slice(&bytes[..len]);
}

fn read_push_int(script: &[u8]) -> Option<(usize, usize)> {
    let op = *script.first()?;
    if (OP_PUSH1..=OP_PUSH1 + 15).contains(&op) {
        return Some(((op - OP_PUSH1) as usize + 1, 1));
    }
    let len = op as usize;
    if len == 0 || len > 8 || script.len() < 1 + len {
        return None;
    }
    let mut bytes = [0u8; 8];
    bytes[..len].copy_from_slice(&script[1..1 + len]);
    Some((u64::from_le_bytes(bytes) as usize, 1 + len))
}

/// Build the `m`-of-N multisig verification script over `pubkeys`.
pub fn multisig_script(m: usize, pubkeys: &[PublicKey]) -> Vec<u8> {
    assert!(
        m >= 1 && m <= pubkeys.len() && pubkeys.len() <= MAX_VALIDATORS,
        "invalid multisig shape: {m} of {}",
        pubkeys.len()
    );
    let mut script = Vec::with_capacity(4 + pubkeys.len() * (PublicKey::LEN + 1));
    emit_push_int(&mut script, m);
    for key in pubkeys {
        script.push(PublicKey::LEN as u8);
        script.extend_from_slice(key.as_bytes());
    }
    emit_push_int(&mut script, pubkeys.len());
    script.push(OP_CHECKMULTISIG);
    script
}

/// Build the single-signature verification script for `pubkey`.
pub fn signature_script(pubkey: &PublicKey) -> Vec<u8> {
    let mut script = Vec::with_capacity(PublicKey::LEN + 2);
    script.push(PublicKey::LEN as u8);
    script.extend_from_slice(pubkey.as_bytes());
    script.push(OP_CHECKSIG);
    script
}

/// Build an invocation script pushing a single signature.
pub fn signature_invocation(signature: &Signature) -> Vec<u8> {
    let mut script = Vec::with_capacity(Signature::LEN + 1);
    script.push(Signature::LEN as u8);
    script.extend_from_slice(signature.as_bytes());
    script
}

/// The consensus address of a validator set: the script hash of its
/// quorum multisig contract.
pub fn consensus_address(validators: &[PublicKey]) -> UInt160 {
    hash160(&multisig_script(quorum(validators.len()), validators))
}

/// Decompose a multisig verification script into `(m, pubkeys)`.
pub fn parse_multisig_script(script: &[u8]) -> Option<(usize, Vec<PublicKey>)> {
    let (m, mut pos) = read_push_int(script)?;
    let mut pubkeys = Vec::new();
    while script.get(pos) == Some(&(PublicKey::LEN as u8)) {
        let start = pos + 1;
        let end = start + PublicKey::LEN;
        let bytes: [u8; PublicKey::LEN] = script.get(start..end)?.try_into().ok()?;
        pubkeys.push(PublicKey::from_bytes(bytes).ok()?);
        pos = end;
    }
    let (n, consumed) = read_push_int(&script[pos..])?;
    pos += consumed;
    if script.get(pos) != Some(&OP_CHECKMULTISIG) || pos + 1 != script.len() {
        return None;
    }
    if n != pubkeys.len() || m < 1 || m > n {
        return None;
    }
    Some((m, pubkeys))
}

fn parse_signature_pushes(script: &[u8]) -> Option<Vec<Signature>> {
    let mut signatures = Vec::new();
    let mut pos = 0;
    while pos < script.len() {
        if script[pos] != Signature::LEN as u8 {
            return None;
        }
        let start = pos + 1;
        let end = start + Signature::LEN;
        let bytes: [u8; Signature::LEN] = script.get(start..end)?.try_into().ok()?;
        signatures.push(Signature::from_bytes(bytes));
        pos = end;
    }
    Some(signatures)
}

/// Decompose a single-signature verification script into its public key.
pub fn parse_signature_script(script: &[u8]) -> Option<PublicKey> {
    if script.len() != PublicKey::LEN + 2
        || script[0] != PublicKey::LEN as u8
        || script[PublicKey::LEN + 1] != OP_CHECKSIG
    {
        return None;
    }
    let bytes: [u8; PublicKey::LEN] = script[1..=PublicKey::LEN].try_into().ok()?;
    PublicKey::from_bytes(bytes).ok()
}

/// Check a single-signature witness against a signing target.
pub fn verify_signature_witness(witness: &Witness, message: &[u8]) -> bool {
    let Some(pubkey) = parse_signature_script(&witness.verification) else {
        return false;
    };
    match parse_signature_pushes(&witness.invocation).as_deref() {
        Some([signature]) => pubkey.verify(message, signature),
        _ => false,
    }
}

/// Check a multisig witness against a signing target.
///
/// CHECKMULTISIG semantics: signatures must appear in the same relative
/// order as the public keys they match, each key consumed at most once.
pub fn verify_multisig_witness(witness: &Witness, message: &[u8]) -> bool {
    let Some((m, pubkeys)) = parse_multisig_script(&witness.verification) else {
        return false;
    };
    let Some(signatures) = parse_signature_pushes(&witness.invocation) else {
        return false;
    };
    if signatures.len() < m {
        return false;
    }
    let mut key_index = 0;
    let mut matched = 0;
    for signature in &signatures {
        while key_index < pubkeys.len() {
            let hit = pubkeys[key_index].verify(message, signature);
            key_index += 1;
            if hit {
                matched += 1;
                break;
            }
        }
    }
    matched >= m
}
