//! Deterministic fixtures for tests and simulation.
//!
//! Everything here is seeded or manually driven: keys come from a fixed
//! RNG, time only moves when told to, and the ledger is a plain map. A
//! test that uses only these fixtures is bit-reproducible.

use crate::clock::Clock;
use crate::config::ConsensusConfig;
use crate::context::ConsensusContext;
use crate::ledger::{Header, Ledger, LedgerSnapshot};
use crate::policy::PolicyPlugin;
use crate::wallet::{Wallet, WalletAccount, WalletError};
use dbft_storage::MemoryStore;
use dbft_types::{hash256, KeyPair, PublicKey, Signature, Transaction, UInt256};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A clock that only moves when the test says so.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Move forward.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
struct ChainState {
    height: u32,
    current_hash: UInt256,
    headers: HashMap<UInt256, Header>,
    validators: Vec<PublicKey>,
    mempool: Vec<Transaction>,
}

/// An in-memory ledger with settable tip, headers, and mempool.
#[derive(Debug)]
pub struct MemoryLedger {
    state: Mutex<ChainState>,
}

impl MemoryLedger {
    /// A chain at height 0 whose next block is signed by `validators`.
    pub fn new(validators: Vec<PublicKey>) -> Self {
        let genesis_hash = hash256(b"genesis");
        let mut headers = HashMap::new();
        headers.insert(
            genesis_hash,
            Header {
                index: 0,
                timestamp: 0,
                prev_hash: UInt256::ZERO,
            },
        );
        Self {
            state: Mutex::new(ChainState {
                height: 0,
                current_hash: genesis_hash,
                headers,
                validators,
                mempool: Vec::new(),
            }),
        }
    }

    /// Hash of the current tip.
    pub fn current_hash(&self) -> UInt256 {
        self.state.lock().current_hash
    }

    /// Move the tip, recording its header.
    pub fn set_tip(&self, hash: UInt256, header: Header) {
        let mut state = self.state.lock();
        state.height = header.index;
        state.current_hash = hash;
        state.headers.insert(hash, header);
    }

    /// Overwrite a header (e.g. to adjust the parent timestamp).
    pub fn insert_header(&self, hash: UInt256, header: Header) {
        self.state.lock().headers.insert(hash, header);
    }

    /// Replace the mempool contents.
    pub fn set_mempool(&self, transactions: Vec<Transaction>) {
        self.state.lock().mempool = transactions;
    }

    /// Replace the upcoming validator set.
    pub fn set_validators(&self, validators: Vec<PublicKey>) {
        self.state.lock().validators = validators;
    }
}

impl Ledger for MemoryLedger {
    fn snapshot(&self) -> Box<dyn LedgerSnapshot> {
        Box::new(MemorySnapshot {
            state: self.state.lock().clone(),
        })
    }
}

struct MemorySnapshot {
    state: ChainState,
}

impl LedgerSnapshot for MemorySnapshot {
    fn current_hash(&self) -> UInt256 {
        self.state.current_hash
    }

    fn height(&self) -> u32 {
        self.state.height
    }

    fn header(&self, hash: &UInt256) -> Option<Header> {
        self.state.headers.get(hash).cloned()
    }

    fn next_block_validators(&self) -> Vec<PublicKey> {
        self.state.validators.clone()
    }

    fn sorted_verified_transactions(&self) -> Vec<Transaction> {
        self.state.mempool.clone()
    }
}

/// A wallet over a fixed set of keypairs.
#[derive(Debug, Default)]
pub struct MemoryWallet {
    keys: Vec<KeyPair>,
    fail_signing: bool,
}

impl MemoryWallet {
    /// A wallet holding `keys`.
    pub fn new(keys: Vec<KeyPair>) -> Self {
        Self {
            keys,
            fail_signing: false,
        }
    }

    /// A wallet holding nothing; its node is watch-only.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A wallet that knows its keys but fails every signing call, for
    /// exercising the unsigned-payload path.
    pub fn with_signing_disabled(keys: Vec<KeyPair>) -> Self {
        Self {
            keys,
            fail_signing: true,
        }
    }
}

impl Wallet for MemoryWallet {
    fn account(&self, public_key: &PublicKey) -> Option<WalletAccount> {
        self.keys
            .iter()
            .find(|key| key.public_key() == *public_key)
            .map(|key| WalletAccount {
                public_key: *public_key,
                key_pair: Some(key.clone()),
            })
    }

    fn sign(&self, data: &[u8], public_key: &PublicKey) -> Result<Signature, WalletError> {
        if self.fail_signing {
            return Err(WalletError::Keystore("signing disabled".into()));
        }
        self.keys
            .iter()
            .find(|key| key.public_key() == *public_key)
            .map(|key| key.sign(data))
            .ok_or(WalletError::UnknownKey)
    }
}

/// `n` deterministic validator keypairs.
pub fn validator_keys(n: usize) -> Vec<KeyPair> {
    let mut rng = ChaCha8Rng::seed_from_u64(0xd8f7);
    (0..n).map(|_| KeyPair::generate(&mut rng)).collect()
}

/// A context for one node of a test validator set.
///
/// `slot` picks which validator's key the wallet holds; `None` builds a
/// watch-only node. The caller still drives `reset(0)`.
pub fn test_context(
    keys: &[KeyPair],
    slot: Option<usize>,
    ledger: Arc<MemoryLedger>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
) -> ConsensusContext {
    let wallet = match slot {
        Some(slot) => MemoryWallet::new(vec![keys[slot].clone()]),
        None => MemoryWallet::empty(),
    };
    test_context_with_wallet(wallet, ledger, store, clock, Vec::new())
}

/// Like [`test_context`] with an explicit wallet and policy chain.
pub fn test_context_with_wallet(
    wallet: MemoryWallet,
    ledger: Arc<MemoryLedger>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    policies: Vec<Box<dyn PolicyPlugin>>,
) -> ConsensusContext {
    ConsensusContext::with_rng(
        ledger,
        Arc::new(wallet),
        store,
        policies,
        clock,
        ConsensusConfig::default(),
        ChaCha8Rng::seed_from_u64(0x5eed),
    )
}

/// A minimal verified transaction with a distinguishing nonce.
pub fn test_transaction(nonce: u32) -> Transaction {
    Transaction {
        version: 0,
        nonce,
        sender: dbft_types::UInt160::from_bytes([0xaa; 20]),
        system_fee: 1,
        network_fee: 1,
        valid_until_block: u32::MAX,
        script: vec![0x51],
        witness: None,
    }
}
