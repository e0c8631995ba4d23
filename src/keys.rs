//! Key epoch lifecycle: generation, rotation, destruction.
//!
//! Each epoch owns one AES-256 key and one P-256 signing key, both expanded
//! from a single 32-byte CSPRNG seed via HKDF-SHA256 with domain-separated
//! info strings. Exactly one epoch is active; rotated-out epochs are
//! dropped, never archived, and their key bytes are zeroized when the last
//! in-flight reference goes away.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hkdf::Hkdf;
use p256::ecdsa::{SigningKey, VerifyingKey};
use parking_lot::RwLock;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{LedgerError, Result};

const EPOCH_SALT: &[u8] = b"privacy-ledger:epoch-salt:v1";
const EPOCH_ENC_INFO_PREFIX: &str = "privacy-ledger:epoch:enc:v1:";
const EPOCH_SIG_INFO_PREFIX: &str = "privacy-ledger:epoch:sig:v1:";

/// Derive a 256-bit subkey from an epoch seed using HKDF-SHA256.
fn hkdf_expand(ikm: &[u8], info: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(EPOCH_SALT), ikm);
    let mut okm = [0u8; 32];
    hk.expand(info.as_bytes(), &mut okm)
        .map_err(|e| LedgerError::Encryption(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

/// Rejection-sample a P-256 signing key from the epoch seed.
///
/// A candidate scalar is invalid (zero or >= the curve order) with
/// probability ~2^-32, so the loop effectively runs once.
fn derive_signing_key(seed: &[u8], epoch_id: u32) -> Result<SigningKey> {
    for counter in 0u8..=255 {
        let mut candidate = hkdf_expand(
            seed,
            &format!("{}{}:{}", EPOCH_SIG_INFO_PREFIX, epoch_id, counter),
        )?;
        let parsed = SigningKey::from_bytes(p256::FieldBytes::from_slice(&candidate));
        candidate.zeroize();
        if let Ok(key) = parsed {
            return Ok(key);
        }
    }
    Err(LedgerError::Encryption(
        "could not derive a valid P-256 signing scalar".to_string(),
    ))
}

/// One time-bounded set of encryption and signing keys.
///
/// Raw key bytes never leave this module and the event encoder.
pub struct Epoch {
    epoch_id: u32,
    created_at_ms: u64,
    symmetric_key: [u8; 32],
    signing_key: SigningKey,
}

impl Epoch {
    /// Generate a fresh epoch from the system CSPRNG.
    ///
    /// CSPRNG failure is fatal: the error is surfaced, never downgraded to
    /// a weaker randomness source.
    pub(crate) fn generate(epoch_id: u32, now_ms: u64) -> Result<Self> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed)
            .map_err(|e| LedgerError::Encryption(format!("CSPRNG failure: {}", e)))?;

        // Zero the seed before either derivation result can early-return.
        let symmetric_key = hkdf_expand(&seed, &format!("{}{}", EPOCH_ENC_INFO_PREFIX, epoch_id));
        let signing_key = derive_signing_key(&seed, epoch_id);
        seed.zeroize();

        Ok(Self {
            epoch_id,
            created_at_ms: now_ms,
            symmetric_key: symmetric_key?,
            signing_key: signing_key?,
        })
    }

    pub fn epoch_id(&self) -> u32 {
        self.epoch_id
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// The public half of the signing key. Not secret.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub(crate) fn symmetric_key(&self) -> &[u8; 32] {
        &self.symmetric_key
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl Drop for Epoch {
    fn drop(&mut self) {
        // The signing key zeroizes its own scalar on drop.
        self.symmetric_key.zeroize();
    }
}

impl std::fmt::Debug for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Epoch")
            .field("epoch_id", &self.epoch_id)
            .field("created_at_ms", &self.created_at_ms)
            .finish_non_exhaustive()
    }
}

/// Owner of the current key epoch.
///
/// `current()` hands out `Arc<Epoch>` clones; `rotate()` swaps the
/// reference without waiting for holders, so an encode already running
/// under the outgoing epoch completes and the old key material is
/// destroyed when its last reference drops.
pub struct KeyManager {
    current: RwLock<Arc<Epoch>>,
    next_epoch_id: AtomicU32,
}

impl KeyManager {
    pub fn new(now_ms: u64) -> Result<Self> {
        let initial = Epoch::generate(0, now_ms)?;
        Ok(Self {
            current: RwLock::new(Arc::new(initial)),
            next_epoch_id: AtomicU32::new(1),
        })
    }

    /// The active epoch. Valid for the caller's whole operation even if a
    /// rotation happens meanwhile.
    pub fn current(&self) -> Arc<Epoch> {
        self.current.read().clone()
    }

    /// Swap in a freshly generated epoch and release the old reference.
    ///
    /// The new epoch is generated outside the lock; the critical section is
    /// a single pointer swap.
    pub fn rotate(&self, now_ms: u64) -> Result<u32> {
        let epoch_id = self.next_epoch_id.fetch_add(1, Ordering::SeqCst);
        let fresh = Arc::new(Epoch::generate(epoch_id, now_ms)?);
        let retired = {
            let mut guard = self.current.write();
            std::mem::replace(&mut *guard, fresh)
        };
        tracing::debug!(
            retired = retired.epoch_id(),
            active = epoch_id,
            "key epoch rotated"
        );
        Ok(epoch_id)
    }
}
