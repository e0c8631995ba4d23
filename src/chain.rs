//! Append-only hash chain for tamper evidence.
//!
//! Each sealed block binds to its predecessor's hash; a nonce is searched
//! until the block hash carries the configured number of leading zero
//! bits. That difficulty is integrity framing for a single writer — a pure
//! cost tunable, not a consensus mechanism — and expected sealing work
//! doubles per bit (see [`crate::config::MAX_LEDGER_DIFFICULTY`]).

use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Sentinel previous-hash of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

const GENESIS_DATA: &str = "genesis";

/// One sealed, immutable chain entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp_ms: u64,
    /// Entry digest — callers store a hash, never raw payload bytes.
    pub data: String,
    /// Hex SHA-256 of the predecessor block.
    pub previous_hash: String,
    /// Hex SHA-256 of this block's fields, satisfying the difficulty.
    pub hash: String,
    pub nonce: u64,
}

/// Outcome of a full-chain verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainVerification {
    pub valid: bool,
    /// Index of the first block whose hash or linkage failed.
    pub first_invalid: Option<u64>,
}

impl ChainVerification {
    fn ok() -> Self {
        Self {
            valid: true,
            first_invalid: None,
        }
    }

    fn failed_at(index: u64) -> Self {
        Self {
            valid: false,
            first_invalid: Some(index),
        }
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hash message: `privacy-ledger:block:v1\0{index}\0{timestamp}\0{data}\0{previous_hash}\0{nonce}`
fn block_digest(
    index: u64,
    timestamp_ms: u64,
    data: &str,
    previous_hash: &str,
    nonce: u64,
) -> [u8; 32] {
    let message = format!(
        "privacy-ledger:block:v1\0{}\0{}\0{}\0{}\0{}",
        index, timestamp_ms, data, previous_hash, nonce
    );
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Whether a hash carries at least `difficulty` leading zero bits.
fn meets_difficulty(hash: &[u8; 32], difficulty: u32) -> bool {
    let mut remaining = difficulty;
    for byte in hash {
        if remaining == 0 {
            return true;
        }
        if remaining >= 8 {
            if *byte != 0 {
                return false;
            }
            remaining -= 8;
        } else {
            return byte.leading_zeros() >= remaining;
        }
    }
    remaining == 0
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Single-writer hash chain. Blocks are immutable once sealed; the only
/// removal paths are bulk [`Chain::prune`] and the emergency
/// [`Chain::reset`], both of which keep genesis.
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
    /// Index of the oldest surviving non-genesis block after a prune; the
    /// link from genesis to it is knowingly broken.
    anchor_index: Option<u64>,
}

impl Chain {
    /// Create a chain holding a freshly sealed genesis block.
    pub fn new(difficulty: u32, now_ms: u64) -> Self {
        let genesis = Self::seal_block(
            0,
            now_ms,
            GENESIS_DATA.to_string(),
            GENESIS_PREVIOUS_HASH.to_string(),
            difficulty,
        );
        Self {
            blocks: vec![genesis],
            difficulty,
            anchor_index: None,
        }
    }

    /// Rebuild a chain from exported blocks for out-of-band verification.
    ///
    /// A non-contiguous index after genesis is taken as a prune boundary.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: u32) -> Self {
        let anchor_index = match blocks.get(1) {
            Some(block) if block.index != 1 => Some(block.index),
            _ => None,
        };
        Self {
            blocks,
            difficulty,
            anchor_index,
        }
    }

    fn seal_block(
        index: u64,
        timestamp_ms: u64,
        data: String,
        previous_hash: String,
        difficulty: u32,
    ) -> Block {
        // Bounded by construction: difficulty is capped well below the
        // point where u64 nonce space or patience runs out.
        let mut nonce = 0u64;
        loop {
            let digest = block_digest(index, timestamp_ms, &data, &previous_hash, nonce);
            if meets_difficulty(&digest, difficulty) {
                return Block {
                    index,
                    timestamp_ms,
                    data,
                    previous_hash,
                    hash: to_hex(&digest),
                    nonce,
                };
            }
            nonce += 1;
        }
    }

    /// Seal and append a block for the given entry digest.
    pub fn append(&mut self, data: String, now_ms: u64) -> &Block {
        let previous = self
            .blocks
            .last()
            .expect("chain always holds at least genesis");
        let index = previous.index + 1;
        let previous_hash = previous.hash.clone();
        let block = Self::seal_block(index, now_ms, data, previous_hash, self.difficulty);
        self.blocks.push(block);
        self.blocks.last().expect("just pushed")
    }

    /// Recompute every block hash and check linkage and difficulty.
    ///
    /// Returns the first failing index. The genesis-to-anchor link of a
    /// pruned chain is exempt: that break is deliberate and recorded in
    /// [`Chain::anchor_index`].
    pub fn verify(&self) -> ChainVerification {
        for (position, block) in self.blocks.iter().enumerate() {
            let digest = block_digest(
                block.index,
                block.timestamp_ms,
                &block.data,
                &block.previous_hash,
                block.nonce,
            );
            if to_hex(&digest) != block.hash || !meets_difficulty(&digest, self.difficulty) {
                return ChainVerification::failed_at(block.index);
            }

            if position == 0 {
                if block.previous_hash != GENESIS_PREVIOUS_HASH || block.index != 0 {
                    return ChainVerification::failed_at(block.index);
                }
                continue;
            }

            let predecessor = &self.blocks[position - 1];
            if position == 1 && self.anchor_index == Some(block.index) {
                // Pruned boundary: the true parent was discarded.
                continue;
            }
            if block.previous_hash != predecessor.hash || block.index != predecessor.index + 1 {
                return ChainVerification::failed_at(block.index);
            }
        }
        ChainVerification::ok()
    }

    /// Bulk prune: keep genesis plus the newest `max_blocks - 1` blocks.
    ///
    /// Trades audit depth for memory — the trail from genesis to the
    /// surviving anchor is broken, and that loss is logged rather than
    /// hidden. Returns the number of discarded blocks.
    pub fn prune(&mut self, max_blocks: usize) -> usize {
        if max_blocks == 0 || self.blocks.len() <= max_blocks {
            return 0;
        }
        let keep_tail = max_blocks - 1;
        let discard = self.blocks.len() - 1 - keep_tail;
        self.blocks.drain(1..1 + discard);
        self.anchor_index = if keep_tail > 0 {
            Some(self.blocks[1].index)
        } else {
            None
        };
        tracing::info!(
            discarded = discard,
            anchor = ?self.anchor_index,
            "ledger pruned: audit trail to genesis no longer unbroken"
        );
        discard
    }

    /// Drop everything but genesis. Emergency purge path.
    pub fn reset(&mut self) {
        self.blocks.truncate(1);
        self.anchor_index = None;
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// First retained post-prune block index, if the chain has been pruned.
    pub fn anchor_index(&self) -> Option<u64> {
        self.anchor_index
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Test and audit support: mutate a sealed block's data in place.
    #[cfg(test)]
    pub(crate) fn corrupt_data(&mut self, position: usize, data: &str) {
        self.blocks[position].data = data.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFFICULTY: u32 = 2;

    fn chain_with(entries: usize) -> Chain {
        let mut chain = Chain::new(DIFFICULTY, 1_000);
        for i in 0..entries {
            chain.append(format!("digest-{}", i), 1_000 + i as u64);
        }
        chain
    }

    #[test]
    fn genesis_has_sentinel_previous_hash() {
        let chain = Chain::new(DIFFICULTY, 1_000);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.blocks()[0].previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(chain.blocks()[0].index, 0);
    }

    #[test]
    fn append_links_blocks() {
        let chain = chain_with(3);
        let blocks = chain.blocks();
        for i in 1..blocks.len() {
            assert_eq!(blocks[i].previous_hash, blocks[i - 1].hash);
            assert_eq!(blocks[i].index, blocks[i - 1].index + 1);
        }
    }

    #[test]
    fn sealed_blocks_meet_difficulty() {
        let chain = chain_with(3);
        for block in chain.blocks() {
            let digest = block_digest(
                block.index,
                block.timestamp_ms,
                &block.data,
                &block.previous_hash,
                block.nonce,
            );
            assert!(meets_difficulty(&digest, DIFFICULTY));
        }
    }

    #[test]
    fn fresh_chain_verifies() {
        assert_eq!(chain_with(3).verify(), ChainVerification::ok());
    }

    #[test]
    fn mutated_data_fails_at_that_index() {
        let mut chain = chain_with(3);
        chain.corrupt_data(1, "tampered");
        let verification = chain.verify();
        assert!(!verification.valid);
        assert_eq!(verification.first_invalid, Some(1));
    }

    #[test]
    fn mutated_genesis_fails_at_zero() {
        let mut chain = chain_with(2);
        chain.corrupt_data(0, "tampered");
        assert_eq!(chain.verify().first_invalid, Some(0));
    }

    #[test]
    fn difficulty_bits_checked_bytewise() {
        assert!(meets_difficulty(&[0u8; 32], 256));
        let mut hash = [0u8; 32];
        hash[0] = 0b0001_0000;
        assert!(meets_difficulty(&hash, 3));
        assert!(!meets_difficulty(&hash, 4));
        hash[0] = 0;
        hash[1] = 0xff;
        assert!(meets_difficulty(&hash, 8));
        assert!(!meets_difficulty(&hash, 9));
    }

    #[test]
    fn zero_difficulty_accepts_first_nonce() {
        let mut chain = Chain::new(0, 1_000);
        let block = chain.append("d".to_string(), 2_000);
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn prune_keeps_genesis_and_tail() {
        let mut chain = chain_with(10);
        let discarded = chain.prune(4);
        assert_eq!(discarded, 7);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.blocks()[0].index, 0);
        // Newest three survive: indexes 8, 9, 10.
        assert_eq!(chain.blocks()[1].index, 8);
        assert_eq!(chain.blocks()[3].index, 10);
        assert_eq!(chain.anchor_index(), Some(8));
    }

    #[test]
    fn pruned_chain_still_verifies() {
        let mut chain = chain_with(10);
        chain.prune(4);
        assert_eq!(chain.verify(), ChainVerification::ok());
    }

    #[test]
    fn tamper_after_prune_still_detected() {
        let mut chain = chain_with(10);
        chain.prune(4);
        chain.corrupt_data(2, "tampered");
        let verification = chain.verify();
        assert!(!verification.valid);
        assert_eq!(verification.first_invalid, Some(9));
    }

    #[test]
    fn prune_below_limit_is_noop() {
        let mut chain = chain_with(3);
        assert_eq!(chain.prune(10), 0);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.anchor_index(), None);
    }

    #[test]
    fn reset_drops_everything_but_genesis() {
        let mut chain = chain_with(5);
        chain.prune(4);
        chain.reset();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.anchor_index(), None);
        assert_eq!(chain.verify(), ChainVerification::ok());
    }

    #[test]
    fn append_after_reset_links_to_genesis() {
        let mut chain = chain_with(5);
        chain.reset();
        let genesis_hash = chain.blocks()[0].hash.clone();
        let block = chain.append("fresh".to_string(), 9_000);
        assert_eq!(block.previous_hash, genesis_hash);
        assert_eq!(block.index, 1);
        assert_eq!(chain.verify(), ChainVerification::ok());
    }
}
