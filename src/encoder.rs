//! Sealing and opening of ledger events.
//!
//! Ciphertext wire format v1: [1 byte: version=1][12 bytes: nonce]
//! [N bytes: AES-256-GCM ciphertext + tag]. The AAD binds event id, type,
//! epoch, and timestamps so a ciphertext cannot be relocated to another
//! event. The envelope is then signed with the epoch's P-256 key (64-byte
//! IEEE P1363 signature) over a \0-delimited message covering every field
//! and the ciphertext itself.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::Signature;
use serde_json::Value;
use uuid::Uuid;
use zeroize::Zeroize;

use crate::canonical::canonical_json;
use crate::error::{LedgerError, Result};
use crate::keys::Epoch;

/// Wire format version for sealed event ciphertexts.
pub const EVENT_VERSION: u8 = 1;

/// AES-GCM nonce length in bytes (96 bits per NIST recommendation).
pub const NONCE_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const TAG_LENGTH: usize = 16;

/// An encrypted, signed, retention-bound event.
///
/// Immutable after creation. The perturbed payload exists only inside
/// `ciphertext`.
#[derive(Debug, Clone)]
pub struct SealedEvent {
    pub event_id: Uuid,
    pub event_type: String,
    /// Epoch whose keys sealed this event.
    pub epoch_id: u32,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    /// [version:1][nonce:12][ciphertext+tag]
    pub ciphertext: Vec<u8>,
    /// ECDSA P-256 signature (64 bytes IEEE P1363) over the envelope.
    pub signature: Vec<u8>,
}

impl SealedEvent {
    /// Zero the sensitive buffers. Called on destructive deletion.
    pub(crate) fn destroy(&mut self) {
        self.ciphertext.zeroize();
        self.signature.zeroize();
    }
}

/// AAD binding ciphertext to its envelope.
/// Format: [16 bytes: event id][4 bytes: epoch BE][8 bytes: created BE]
/// [8 bytes: expires BE][event type UTF-8]
fn build_aad(
    event_id: Uuid,
    event_type: &str,
    epoch_id: u32,
    created_at_ms: u64,
    expires_at_ms: u64,
) -> Vec<u8> {
    let type_bytes = event_type.as_bytes();
    let mut aad = Vec::with_capacity(36 + type_bytes.len());
    aad.extend_from_slice(event_id.as_bytes());
    aad.extend_from_slice(&epoch_id.to_be_bytes());
    aad.extend_from_slice(&created_at_ms.to_be_bytes());
    aad.extend_from_slice(&expires_at_ms.to_be_bytes());
    aad.extend_from_slice(type_bytes);
    aad
}

/// Build the signing message for an event envelope.
///
/// Format: `privacy-ledger:event:v1\0{id}\0{type}\0{epoch}\0{created}\0{expires}\0` + ciphertext
fn build_signing_message(
    event_id: Uuid,
    event_type: &str,
    epoch_id: u32,
    created_at_ms: u64,
    expires_at_ms: u64,
    ciphertext: &[u8],
) -> Vec<u8> {
    let mut message = format!(
        "privacy-ledger:event:v1\0{}\0{}\0{}\0{}\0{}\0",
        event_id, event_type, epoch_id, created_at_ms, expires_at_ms
    )
    .into_bytes();
    message.extend_from_slice(ciphertext);
    message
}

/// Generate a fresh random 12-byte nonce.
///
/// One per call: nonce reuse under the same key voids the AEAD guarantees.
fn generate_nonce() -> Result<[u8; NONCE_LENGTH]> {
    let mut nonce = [0u8; NONCE_LENGTH];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| LedgerError::Encryption(format!("CSPRNG failure: {}", e)))?;
    Ok(nonce)
}

/// Seal a payload into an encrypted, signed event.
///
/// Pure function of its inputs apart from nonce generation; no state is
/// touched.
pub fn seal(
    epoch: &Epoch,
    event_id: Uuid,
    event_type: &str,
    payload: &Value,
    created_at_ms: u64,
    expires_at_ms: u64,
) -> Result<SealedEvent> {
    let plaintext = canonical_json(payload)?;

    let cipher = Aes256Gcm::new_from_slice(epoch.symmetric_key())
        .map_err(|e| LedgerError::Encryption(e.to_string()))?;
    let nonce_bytes = generate_nonce()?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let aad = build_aad(
        event_id,
        event_type,
        epoch.epoch_id(),
        created_at_ms,
        expires_at_ms,
    );

    let encrypted = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: &aad,
            },
        )
        .map_err(|e| LedgerError::Encryption(e.to_string()))?;

    let mut ciphertext = Vec::with_capacity(1 + NONCE_LENGTH + encrypted.len());
    ciphertext.push(EVENT_VERSION);
    ciphertext.extend_from_slice(&nonce_bytes);
    ciphertext.extend_from_slice(&encrypted);

    let message = build_signing_message(
        event_id,
        event_type,
        epoch.epoch_id(),
        created_at_ms,
        expires_at_ms,
        &ciphertext,
    );
    let signature: Signature = epoch
        .signing_key()
        .try_sign(&message)
        .map_err(|e| LedgerError::Encryption(format!("signing failed: {}", e)))?;

    Ok(SealedEvent {
        event_id,
        event_type: event_type.to_string(),
        epoch_id: epoch.epoch_id(),
        created_at_ms,
        expires_at_ms,
        ciphertext,
        signature: signature.to_bytes().to_vec(),
    })
}

/// Open a sealed event back into its payload.
///
/// Order matters: a discarded epoch fails before any cryptography (the key
/// that could verify is gone), and a bad signature fails before decryption
/// is ever attempted.
pub fn open(event: &SealedEvent, epoch: &Epoch) -> Result<Value> {
    if event.epoch_id != epoch.epoch_id() {
        return Err(LedgerError::Decryption(format!(
            "epoch {} has been discarded (active epoch is {})",
            event.epoch_id,
            epoch.epoch_id()
        )));
    }

    let message = build_signing_message(
        event.event_id,
        &event.event_type,
        event.epoch_id,
        event.created_at_ms,
        event.expires_at_ms,
        &event.ciphertext,
    );
    let signature = Signature::from_slice(&event.signature)
        .map_err(|_| LedgerError::Integrity("malformed event signature".to_string()))?;
    epoch
        .verifying_key()
        .verify(&message, &signature)
        .map_err(|_| LedgerError::Integrity("event signature mismatch".to_string()))?;

    if event.ciphertext.len() < 1 + NONCE_LENGTH + TAG_LENGTH {
        return Err(LedgerError::Decryption("event blob too short".to_string()));
    }
    let version = event.ciphertext[0];
    if version != EVENT_VERSION {
        return Err(LedgerError::Decryption(format!(
            "unsupported event version: {}",
            version
        )));
    }

    let nonce = Nonce::from_slice(&event.ciphertext[1..1 + NONCE_LENGTH]);
    let encrypted = &event.ciphertext[1 + NONCE_LENGTH..];
    let aad = build_aad(
        event.event_id,
        &event.event_type,
        event.epoch_id,
        event.created_at_ms,
        event.expires_at_ms,
    );

    let cipher = Aes256Gcm::new_from_slice(epoch.symmetric_key())
        .map_err(|e| LedgerError::Decryption(e.to_string()))?;
    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: encrypted,
                aad: &aad,
            },
        )
        .map_err(|e| LedgerError::Decryption(e.to_string()))?;

    serde_json::from_slice(&plaintext).map_err(|e| LedgerError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_epoch() -> Epoch {
        Epoch::generate(1, 1_000).unwrap()
    }

    fn seal_simple(epoch: &Epoch, payload: &Value) -> SealedEvent {
        seal(epoch, Uuid::new_v4(), "page_view", payload, 1_000, 16_000).unwrap()
    }

    #[test]
    fn seal_open_round_trip() {
        let epoch = test_epoch();
        let payload = serde_json::json!({"path": "/home", "duration_ms": 1234.5});
        let event = seal_simple(&epoch, &payload);
        assert_eq!(open(&event, &epoch).unwrap(), payload);
    }

    #[test]
    fn wire_format() {
        let epoch = test_epoch();
        let event = seal_simple(&epoch, &serde_json::json!({"n": 1}));
        assert_eq!(event.ciphertext[0], EVENT_VERSION);
        assert!(event.ciphertext.len() > 1 + NONCE_LENGTH + TAG_LENGTH);
        assert_eq!(event.signature.len(), 64);
    }

    #[test]
    fn fresh_nonce_per_call() {
        let epoch = test_epoch();
        let id = Uuid::new_v4();
        let payload = serde_json::json!({"n": 1});
        let a = seal(&epoch, id, "e", &payload, 1_000, 2_000).unwrap();
        let b = seal(&epoch, id, "e", &payload, 1_000, 2_000).unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(
            &a.ciphertext[1..1 + NONCE_LENGTH],
            &b.ciphertext[1..1 + NONCE_LENGTH]
        );
    }

    #[test]
    fn tampered_ciphertext_fails_integrity_first() {
        let epoch = test_epoch();
        let mut event = seal_simple(&epoch, &serde_json::json!({"secret": 42}));
        let last = event.ciphertext.len() - 1;
        event.ciphertext[last] ^= 0xff;
        // The signature covers the ciphertext, so tampering surfaces as an
        // integrity failure without any decryption attempt.
        match open(&event, &epoch) {
            Err(LedgerError::Integrity(_)) => {}
            other => panic!("expected Integrity error, got {:?}", other),
        }
    }

    #[test]
    fn tampered_envelope_fails() {
        let epoch = test_epoch();
        let mut event = seal_simple(&epoch, &serde_json::json!({"n": 1}));
        event.event_type = "renamed".to_string();
        assert!(matches!(
            open(&event, &epoch),
            Err(LedgerError::Integrity(_))
        ));
    }

    #[test]
    fn discarded_epoch_fails_decryption() {
        let old = test_epoch();
        let event = seal_simple(&old, &serde_json::json!({"n": 1}));
        let new = Epoch::generate(2, 2_000).unwrap();
        assert!(matches!(
            open(&event, &new),
            Err(LedgerError::Decryption(_))
        ));
    }

    #[test]
    fn malformed_signature_fails() {
        let epoch = test_epoch();
        let mut event = seal_simple(&epoch, &serde_json::json!({"n": 1}));
        event.signature.truncate(10);
        assert!(matches!(open(&event, &epoch), Err(LedgerError::Integrity(_))));
    }

    #[test]
    fn empty_payload_round_trips() {
        let epoch = test_epoch();
        let payload = serde_json::json!({});
        let event = seal_simple(&epoch, &payload);
        assert_eq!(open(&event, &epoch).unwrap(), payload);
    }

    #[test]
    fn key_order_does_not_change_plaintext() {
        let epoch = test_epoch();
        let a = serde_json::json!({"x": 1, "y": 2});
        let b = serde_json::json!({"y": 2, "x": 1});
        let sealed = seal_simple(&epoch, &a);
        assert_eq!(open(&sealed, &epoch).unwrap(), b);
    }

    #[test]
    fn destroy_zeroes_buffers() {
        let epoch = test_epoch();
        let mut event = seal_simple(&epoch, &serde_json::json!({"n": 1}));
        event.destroy();
        assert!(event.ciphertext.iter().all(|b| *b == 0));
        assert!(event.signature.iter().all(|b| *b == 0));
    }
}
