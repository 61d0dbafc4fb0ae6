//! Store settings

use crate::ecs::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// What happens to a slot whose 16-bit generation counter is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOverflow {
    /// The slot is never issued again.
    #[default]
    Retire,
    /// The generation restarts at zero. Very old stale ids may alias again.
    Wrap,
}

/// Store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Rows allocated the first time a column grows; capacity doubles after.
    pub initial_column_capacity: usize,
    pub generation_overflow: GenerationOverflow,
}

impl StoreConfig {
    pub fn validate(&self) -> StoreResult<()> {
        if self.initial_column_capacity == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "initial_column_capacity must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_column_capacity: 2,
            generation_overflow: GenerationOverflow::Retire,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{ "generation_overflow": "wrap" }"#).unwrap();
        assert_eq!(config.initial_column_capacity, 2);
        assert_eq!(config.generation_overflow, GenerationOverflow::Wrap);
    }

    #[test]
    fn zero_initial_capacity_is_rejected() {
        let config = StoreConfig {
            initial_column_capacity: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig { .. })
        ));
    }
}
