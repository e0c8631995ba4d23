//! Privacy budget accounting and payload perturbation.
//!
//! Every numeric field of a tracked payload gets Laplace noise; every
//! accepted event charges a deterministic, size-bounded cost against a
//! fixed cumulative budget. The check-then-charge step is a single
//! critical section so concurrent callers cannot double-spend.

use parking_lot::Mutex;
use serde_json::Value;

use crate::canonical::canonical_json;
use crate::error::{LedgerError, Result};
use crate::noise::sample_laplace;

/// Floor charge for any event, however small.
pub const MIN_EVENT_COST: f64 = 0.01;

/// Cap charge per event.
pub const MAX_EVENT_COST: f64 = 0.1;

/// Charge per KiB of canonical payload.
const COST_PER_KIB: f64 = 0.05;

/// Cumulative privacy budget with atomic charging.
///
/// Invariant: `consumed <= total` at all times. A rejected charge leaves
/// `consumed` untouched.
pub struct PrivacyBudget {
    total: f64,
    consumed: Mutex<f64>,
}

impl PrivacyBudget {
    /// `total` is validated by [`crate::LedgerConfig::validate`] before it
    /// reaches this constructor.
    pub fn new(total: f64) -> Self {
        Self {
            total,
            consumed: Mutex::new(0.0),
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn consumed(&self) -> f64 {
        *self.consumed.lock()
    }

    pub fn remaining(&self) -> f64 {
        (self.total - *self.consumed.lock()).max(0.0)
    }

    /// Whether a charge of `cost` would stay within budget.
    ///
    /// Advisory only: under concurrency, use [`PrivacyBudget::try_charge`],
    /// which re-checks inside its critical section.
    pub fn can_afford(&self, cost: f64) -> bool {
        *self.consumed.lock() + cost <= self.total
    }

    /// Atomically check and consume. All-or-nothing: on rejection the
    /// consumed amount is unchanged.
    pub fn try_charge(&self, cost: f64) -> Result<()> {
        let mut consumed = self.consumed.lock();
        if *consumed + cost > self.total {
            return Err(LedgerError::BudgetExhausted {
                requested: cost,
                consumed: *consumed,
                total: self.total,
            });
        }
        *consumed += cost;
        Ok(())
    }

    /// Deterministic event cost from the canonical payload size, clamped
    /// to [`MIN_EVENT_COST`, `MAX_EVENT_COST`].
    pub fn charge_cost(canonical_payload: &str) -> f64 {
        (canonical_payload.len() as f64 / 1024.0 * COST_PER_KIB)
            .clamp(MIN_EVENT_COST, MAX_EVENT_COST)
    }

    /// Add Laplace noise of the given scale to every numeric field,
    /// recursing through objects and arrays. Non-numeric values pass
    /// through unchanged.
    pub fn perturb(payload: &Value, noise_scale: f64) -> Result<Value> {
        match payload {
            Value::Number(n) => {
                let original = n.as_f64().ok_or_else(|| {
                    LedgerError::Serialization("numeric field out of f64 range".to_string())
                })?;
                let noisy = original + sample_laplace(noise_scale)?;
                let number = serde_json::Number::from_f64(noisy).ok_or_else(|| {
                    LedgerError::Serialization("perturbed value is non-finite".to_string())
                })?;
                Ok(Value::Number(number))
            }
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|v| Self::perturb(v, noise_scale))
                    .collect::<Result<_>>()?,
            )),
            Value::Object(fields) => {
                let mut out = serde_json::Map::new();
                for (key, value) in fields {
                    out.insert(key.clone(), Self::perturb(value, noise_scale)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Cost of a payload after canonical serialization. Convenience for
    /// callers holding a raw [`Value`].
    pub fn cost_of(payload: &Value) -> Result<f64> {
        Ok(Self::charge_cost(&canonical_json(payload)?))
    }
}
