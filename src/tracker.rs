//! The ledger context: ingestion, retrieval, reporting, purge, timers.
//!
//! `PrivacyLedger` is an explicit, caller-owned object — construction, the
//! maintenance loop, and shutdown all belong to the embedder. There is no
//! global instance and no exit hook.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::budget::PrivacyBudget;
use crate::canonical::canonical_json;
use crate::chain::Chain;
use crate::config::LedgerConfig;
use crate::encoder::{open, seal};
use crate::error::Result;
use crate::keys::KeyManager;
use crate::reaper::RetentionReaper;
use crate::report::ComplianceReport;
use crate::store::RecordStore;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// What a caller gets back for an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub event_id: Uuid,
    /// Hash of the chain block that sealed this event's digest.
    pub block_hash: String,
    pub expires_at_ms: u64,
}

/// Privacy-preserving, tamper-evident event ledger with bounded retention.
///
/// Pipeline per accepted event: atomic budget charge → Laplace
/// perturbation → AEAD seal + signature under the current epoch → chain
/// append → retention-bound storage.
pub struct PrivacyLedger {
    config: LedgerConfig,
    keys: KeyManager,
    budget: PrivacyBudget,
    chain: Mutex<Chain>,
    store: RecordStore,
    reaper: RetentionReaper,
    events_processed: AtomicU64,
    started_at_ms: u64,
}

impl PrivacyLedger {
    /// Validate the configuration and build an empty ledger: epoch 0, a
    /// genesis block, no records.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let started_at_ms = now_ms();
        Ok(Self {
            keys: KeyManager::new(started_at_ms)?,
            budget: PrivacyBudget::new(config.total_privacy_budget),
            chain: Mutex::new(Chain::new(config.ledger_difficulty, started_at_ms)),
            store: RecordStore::new(),
            reaper: RetentionReaper::new(),
            events_processed: AtomicU64::new(0),
            started_at_ms,
            config,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Ingest one event. Sole entry point for tracking.
    pub fn track_event(&self, event_type: &str, payload: &Value) -> Result<Receipt> {
        self.track_event_at(event_type, payload, now_ms())
    }

    /// Deterministic-clock variant of [`PrivacyLedger::track_event`].
    pub fn track_event_at(
        &self,
        event_type: &str,
        payload: &Value,
        now_ms: u64,
    ) -> Result<Receipt> {
        // Affordability is settled before any perturbation happens; a
        // rejected charge leaves the budget untouched.
        let canonical = canonical_json(payload)?;
        let cost = PrivacyBudget::charge_cost(&canonical);
        self.budget.try_charge(cost)?;

        let perturbed = PrivacyBudget::perturb(payload, self.config.noise_scale)?;
        let event_id = Uuid::new_v4();
        let expires_at_ms = now_ms + self.config.max_record_age_ms;
        let epoch = self.keys.current();
        let sealed = seal(
            &epoch,
            event_id,
            event_type,
            &perturbed,
            now_ms,
            expires_at_ms,
        )?;

        // The chain stores a digest of the ciphertext, never payload bytes.
        let mut hasher = Sha256::new();
        hasher.update(&sealed.ciphertext);
        let digest: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        let block_hash = {
            let mut chain = self.chain.lock();
            let hash = chain.append(digest, now_ms).hash.clone();
            chain.prune(self.config.max_blocks);
            hash
        };

        self.store.insert(sealed);
        self.events_processed.fetch_add(1, Ordering::Relaxed);

        Ok(Receipt {
            event_id,
            block_hash,
            expires_at_ms,
        })
    }

    /// Decode a stored event's perturbed payload.
    ///
    /// Fails with `NotFound` past the retention window and with
    /// `Decryption` if the sealing epoch has been rotated away.
    pub fn retrieve_event(&self, event_id: Uuid) -> Result<Value> {
        self.retrieve_event_at(event_id, now_ms())
    }

    /// Deterministic-clock variant of [`PrivacyLedger::retrieve_event`].
    pub fn retrieve_event_at(&self, event_id: Uuid, now_ms: u64) -> Result<Value> {
        let sealed = self.store.get(event_id, now_ms)?;
        let epoch = self.keys.current();
        open(&sealed, &epoch)
    }

    /// Aggregated, non-identifying state. Read-only.
    pub fn get_compliance_report(&self) -> ComplianceReport {
        self.report_at(now_ms())
    }

    /// Deterministic-clock variant of
    /// [`PrivacyLedger::get_compliance_report`].
    pub fn report_at(&self, now_ms: u64) -> ComplianceReport {
        let (chain_valid, block_count) = {
            let chain = self.chain.lock();
            (chain.verify().valid, chain.len())
        };
        ComplianceReport {
            uptime_ms: now_ms.saturating_sub(self.started_at_ms),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            purge_operations: self.reaper.purge_operations(),
            budget_remaining: self.budget.remaining(),
            chain_valid,
            block_count,
        }
    }

    /// Number of records currently held. Totals only, like the report.
    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    /// Exported copy of the chain blocks for out-of-band verification.
    pub fn chain_blocks(&self) -> Vec<crate::chain::Block> {
        self.chain.lock().blocks().to_vec()
    }

    /// One retention sweep at the current time. Returns records destroyed.
    pub fn reap(&self) -> usize {
        self.reap_at(now_ms())
    }

    /// Deterministic-clock variant of [`PrivacyLedger::reap`].
    pub fn reap_at(&self, now_ms: u64) -> usize {
        self.reaper.tick(&self.store, now_ms)
    }

    /// Rotate the key epoch now. Normally driven by the maintenance timer.
    pub fn rotate_keys(&self) -> Result<u32> {
        self.keys.rotate(now_ms())
    }

    /// Destroy everything, synchronously and unconditionally: all records,
    /// the chain down to genesis, and the current key epoch.
    ///
    /// Idempotent and safe to call concurrently with retention sweeps.
    /// Observable through a subsequent report: `block_count == 1` and a
    /// zeroed events counter.
    pub fn emergency_purge(&self) {
        // Records first: nothing stays decryptable under the outgoing
        // epoch, even transiently.
        self.reaper.purge_all(&self.store);
        self.chain.lock().reset();
        if let Err(error) = self.keys.rotate(now_ms()) {
            // Key generation failing here leaves the old epoch active, but
            // every record sealed under it is already destroyed.
            tracing::warn!(%error, "emergency purge could not rotate the key epoch");
        }
        self.events_processed.store(0, Ordering::Relaxed);
        tracing::info!("emergency purge completed");
    }

    /// Spawn the periodic maintenance tasks (key rotation and retention
    /// sweeps) on the current tokio runtime.
    ///
    /// Tick failures are logged and retried on the next tick; they never
    /// take the process down. Stop via [`MaintenanceHandle::shutdown`].
    pub fn spawn_maintenance(self: &Arc<Self>) -> MaintenanceHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let rotation = {
            let ledger = Arc::clone(self);
            let mut shutdown = shutdown_rx.clone();
            let period = Duration::from_millis(ledger.config.rotation_interval_ms);
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(period);
                timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                timer.tick().await; // first tick is immediate
                loop {
                    tokio::select! {
                        _ = timer.tick() => {
                            if let Err(error) = ledger.rotate_keys() {
                                tracing::warn!(%error, "key rotation failed; retrying next tick");
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            })
        };

        let reaper = {
            let ledger = Arc::clone(self);
            let mut shutdown = shutdown_rx;
            let period = Duration::from_millis(ledger.config.purge_interval_ms);
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(period);
                timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                timer.tick().await;
                loop {
                    tokio::select! {
                        _ = timer.tick() => {
                            ledger.reap();
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            })
        };

        MaintenanceHandle {
            shutdown: shutdown_tx,
            tasks: vec![rotation, reaper],
        }
    }
}

/// Handle over the spawned maintenance tasks. Dropping it without calling
/// [`MaintenanceHandle::shutdown`] leaves the tasks running until the
/// runtime shuts down.
pub struct MaintenanceHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Signal both tasks and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
