//! Sybil-defense burn mechanism (component I): every setup transaction
//! carries an unspendable OP_RETURN output tagged with the pool id, sized
//! as a clamped percentage of the denomination.

use lotus_capabilities::OutputDescriptor;
use lotus_primitives::CoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnConfig {
    /// Fraction of `denomination` to burn, e.g. `0.001` for 0.1%.
    pub percentage: f64,
    pub min: u64,
    pub max: u64,
    pub address: String,
}

impl BurnConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0005..=0.01).contains(&self.percentage) {
            return Err(CoreError::ValidationFailed(format!(
                "burn percentage {} outside [0.05%, 1%]",
                self.percentage
            )));
        }
        if self.min > self.max {
            return Err(CoreError::ValidationFailed(
                "burn min exceeds burn max".to_string(),
            ));
        }
        Ok(())
    }
}

/// `burnAmount(denomination, burnConfig)`: the percentage of `denomination`,
/// floored, then clamped to `[min, max]`.
pub fn burn_amount(denomination: u64, config: &BurnConfig) -> u64 {
    let raw = (denomination as f64 * config.percentage).floor() as u64;
    raw.clamp(config.min, config.max)
}

/// The OP_RETURN output every setup transaction must carry, tagged with
/// the pool id so peers can recognize and verify it.
pub fn burn_output(pool_id: &[u8; 32], amount: u64) -> OutputDescriptor {
    OutputDescriptor::OpReturn {
        tag: pool_id.to_vec(),
        amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(percentage: f64, min: u64, max: u64) -> BurnConfig {
        BurnConfig {
            percentage,
            min,
            max,
            address: "burn-addr".to_string(),
        }
    }

    #[test]
    fn matches_worked_example_one_thousand_sats_per_participant() {
        let cfg = config(0.001, 0, u64::MAX);
        assert_eq!(burn_amount(1_000_000, &cfg), 1_000);
    }

    #[test]
    fn clamps_to_minimum_for_small_denominations() {
        let cfg = config(0.001, 500, 10_000);
        assert_eq!(burn_amount(1_000, &cfg), 500);
    }

    #[test]
    fn clamps_to_maximum_for_large_denominations() {
        let cfg = config(0.01, 0, 5_000);
        assert_eq!(burn_amount(10_000_000, &cfg), 5_000);
    }

    #[test]
    fn rejects_percentage_outside_spec_range() {
        assert!(config(0.0001, 0, 100).validate().is_err());
        assert!(config(0.02, 0, 100).validate().is_err());
        assert!(config(0.001, 0, 100).validate().is_ok());
    }

    #[test]
    fn rejects_min_above_max() {
        assert!(config(0.001, 100, 50).validate().is_err());
    }
}
