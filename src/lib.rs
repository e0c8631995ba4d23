//! Privacy-preserving, tamper-evident event ledger with bounded retention.
//!
//! Events are perturbed under a cumulative privacy budget, sealed with
//! AEAD + a per-epoch signature, chained into a hash-linked ledger, and
//! destroyed once their retention window closes. Storage is in-memory by
//! design; the owning [`PrivacyLedger`] context is created, driven, and
//! shut down entirely by the caller.

pub mod budget;
pub mod canonical;
pub mod chain;
pub mod config;
pub mod encoder;
pub mod error;
pub mod keys;
pub mod noise;
pub mod reaper;
pub mod report;
pub mod store;
pub mod tracker;

pub use budget::{PrivacyBudget, MAX_EVENT_COST, MIN_EVENT_COST};
pub use canonical::canonical_json;
pub use chain::{Block, Chain, ChainVerification, GENESIS_PREVIOUS_HASH};
pub use config::LedgerConfig;
pub use encoder::{open, seal, SealedEvent, EVENT_VERSION};
pub use error::{LedgerError, Result};
pub use keys::{Epoch, KeyManager};
pub use noise::sample_laplace;
pub use reaper::RetentionReaper;
pub use report::ComplianceReport;
pub use store::RecordStore;
pub use tracker::{MaintenanceHandle, PrivacyLedger, Receipt};
