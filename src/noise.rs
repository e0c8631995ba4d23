//! Laplace noise sampling backed by the system CSPRNG.
//!
//! Sampling is inverse-CDF over a uniform draw built from `getrandom`
//! bytes. A cryptographically secure uniform source removes the
//! predictable-noise attack surface; calibration is unaffected because the
//! mechanism's distribution is fully determined by the uniform input.

use crate::error::{LedgerError, Result};

/// Draw a uniform f64 in the open interval (0, 1).
///
/// Uses the top 53 bits of 8 CSPRNG bytes, offset by half a step so the
/// endpoints are excluded and `ln` below never sees zero.
fn uniform_unit() -> Result<f64> {
    let mut buf = [0u8; 8];
    getrandom::getrandom(&mut buf)
        .map_err(|e| LedgerError::Encryption(format!("CSPRNG failure: {}", e)))?;
    let bits = u64::from_le_bytes(buf) >> 11;
    Ok((bits as f64 + 0.5) / (1u64 << 53) as f64)
}

/// Sample from Laplace(0, scale) via inverse CDF.
pub fn sample_laplace(scale: f64) -> Result<f64> {
    let u = uniform_unit()? - 0.5;
    Ok(-scale * u.signum() * (1.0 - 2.0 * u.abs()).ln())
}
