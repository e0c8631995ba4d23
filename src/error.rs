use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Invalid construction-time configuration. Fatal; nothing is built.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The cumulative privacy budget cannot cover the requested charge.
    /// Recoverable: retry later or reduce the payload.
    #[error(
        "Privacy budget exhausted: charge of {requested} would exceed {total} (consumed {consumed})"
    )]
    BudgetExhausted {
        requested: f64,
        consumed: f64,
        total: f64,
    },

    /// Signature or hash-chain mismatch. Always surfaced, never repaired.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// The key epoch that sealed this data has been discarded or is unknown.
    /// Recoverable only by resubmission under a live epoch.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// CSPRNG or cipher failure. Fatal; never falls back to weaker crypto.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The record does not exist or has passed its retention window.
    #[error("Record not found or expired")]
    NotFound,

    #[error("Serialization error: {0}")]
    Serialization(String),
}
