//! Narrow view of the node wallet.

use dbft_types::{KeyPair, PublicKey, Signature};
use thiserror::Error;

/// Signing failure reported by the wallet.
///
/// The factory converts this into an *unsigned* payload rather than an
/// escaping error; the service decides whether to log or retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The wallet holds no signing key for the requested account.
    #[error("no key for the requested account")]
    UnknownKey,
    /// The backing keystore failed operationally.
    #[error("keystore failure: {0}")]
    Keystore(String),
}

/// An account the wallet knows about.
#[derive(Debug, Clone)]
pub struct WalletAccount {
    /// The account's public key.
    pub public_key: PublicKey,
    /// Signing material, absent for watch-only accounts.
    pub key_pair: Option<KeyPair>,
}

impl WalletAccount {
    /// Whether this account can sign.
    pub fn has_key(&self) -> bool {
        self.key_pair.is_some()
    }
}

/// Read-only signing interface over the node keystore.
pub trait Wallet: Send + Sync {
    /// Look up the account for `public_key`, if this wallet tracks it.
    fn account(&self, public_key: &PublicKey) -> Option<WalletAccount>;

    /// Sign `data` with the key behind `public_key`.
    fn sign(&self, data: &[u8], public_key: &PublicKey) -> Result<Signature, WalletError>;
}
