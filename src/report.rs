//! Aggregated, non-identifying compliance view.

use serde::{Deserialize, Serialize};

/// Snapshot of ledger health for operators.
///
/// Totals only: no payloads, no per-event identifiers, no key material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Milliseconds since the ledger was constructed.
    pub uptime_ms: u64,
    /// Events accepted since construction (reset by emergency purge).
    pub events_processed: u64,
    /// Records destroyed by retention sweeps and purges.
    pub purge_operations: u64,
    /// Unspent privacy budget (epsilon).
    pub budget_remaining: f64,
    /// Whether the full chain verified at report time.
    pub chain_valid: bool,
    /// Current chain length including genesis.
    pub block_count: usize,
}
