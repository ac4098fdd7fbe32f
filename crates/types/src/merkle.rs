//! Merkle root over transaction hashes.

use crate::hash::{hash256, UInt256};

/// Compute the Merkle root of an ordered list of leaf hashes.
///
/// Parents are `hash256(left || right)`; a layer with an odd node
/// duplicates its last element. A single leaf is its own root, and the
/// empty list yields the zero digest.
pub fn merkle_root(leaves: &[UInt256]) -> UInt256 {
    if leaves.is_empty() {
        return UInt256::ZERO;
    }
    let mut layer = leaves.to_vec();
    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            let last = *layer.last().expect("layer is non-empty");
            layer.push(last);
        }
        layer = layer
            .chunks_exact(2)
            .map(|pair| {
                let mut data = [0u8; 64];
                data[..32].copy_from_slice(pair[0].as_bytes());
                data[32..].copy_from_slice(pair[1].as_bytes());
                hash256(&data)
            })
            .collect();
    }
    layer[0]
}
