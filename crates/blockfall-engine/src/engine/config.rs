use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    ConfigError,
    core::{GridBoardConfig, PieceTiming, ShapeCategory},
};

use super::{piece_factory::FactoryConfig, simulation::Motion};

/// Settings of a [`Simulation`](super::Simulation).
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes. Durations are written in milliseconds.
///
/// ```
/// use std::time::Duration;
///
/// use blockfall_engine::{ShapeCategory, SimulationConfig};
///
/// let config: SimulationConfig = serde_json::from_str(
///     r#"{ "enabled_categories": ["standard", "big"], "freeze_duration_ms": 250 }"#,
/// )
/// .unwrap();
/// assert_eq!(config.freeze_duration, Duration::from_millis(250));
/// assert_eq!(config.enabled_categories, [ShapeCategory::Standard, ShapeCategory::Big]);
/// assert_eq!(config.lookahead, 3);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub lookahead: usize,
    pub max_same_in_row: usize,
    pub enabled_categories: Vec<ShapeCategory>,
    #[serde(rename = "gravity_interval_ms", with = "crate::engine::serde_duration")]
    pub gravity_interval: Duration,
    #[serde(rename = "fast_gravity_interval_ms", with = "crate::engine::serde_duration")]
    pub fast_gravity_interval: Duration,
    #[serde(rename = "freeze_duration_ms", with = "crate::engine::serde_duration")]
    pub freeze_duration: Duration,
    #[serde(rename = "discard_fade_ms", with = "crate::engine::serde_duration")]
    pub discard_fade: Duration,
    /// Player motions the simulation reacts to; others are ignored.
    pub valid_motions: Vec<Motion>,
    pub board: GridBoardConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let factory = FactoryConfig::default();
        let timing = PieceTiming::default();
        Self {
            lookahead: factory.lookahead,
            max_same_in_row: factory.max_same_in_row,
            enabled_categories: factory.enabled_categories,
            gravity_interval: timing.gravity_interval,
            fast_gravity_interval: timing.fast_gravity_interval,
            freeze_duration: timing.freeze_duration,
            discard_fade: Duration::from_millis(300),
            valid_motions: Motion::ALL.to_vec(),
            board: GridBoardConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Checks the settings that do not depend on the shape catalog.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookahead == 0 {
            return Err(ConfigError::ZeroLookahead);
        }
        if self.max_same_in_row == 0 {
            return Err(ConfigError::ZeroMaxSameInRow);
        }
        if self.enabled_categories.is_empty() {
            return Err(ConfigError::EmptyShapePool(vec![]));
        }
        if self.valid_motions.is_empty() {
            return Err(ConfigError::NoValidMotions);
        }
        for (name, interval) in [
            ("gravity interval", self.gravity_interval),
            ("fast gravity interval", self.fast_gravity_interval),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        self.board.validate()
    }

    #[must_use]
    pub fn piece_timing(&self) -> PieceTiming {
        PieceTiming {
            gravity_interval: self.gravity_interval,
            fast_gravity_interval: self.fast_gravity_interval,
            freeze_duration: self.freeze_duration,
        }
    }

    #[must_use]
    pub fn factory_config(&self) -> FactoryConfig {
        FactoryConfig {
            lookahead: self.lookahead,
            enabled_categories: self.enabled_categories.clone(),
            max_same_in_row: self.max_same_in_row,
            timing: self.piece_timing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn test_json_round_trip_uses_milliseconds() {
        let config = SimulationConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["gravity_interval_ms"], 1000);
        assert_eq!(json["discard_fade_ms"], 300);
        assert_eq!(json["valid_motions"][0], "left");
        assert_eq!(json["board"]["width"], 10);

        let parsed: SimulationConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: SimulationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(serde_json::from_str::<SimulationConfig>(r#"{ "lookahed": 2 }"#).is_err());
    }

    #[test]
    fn test_validate() {
        let cases = [
            (
                SimulationConfig {
                    valid_motions: vec![],
                    ..SimulationConfig::default()
                },
                ConfigError::NoValidMotions,
            ),
            (
                SimulationConfig {
                    enabled_categories: vec![],
                    ..SimulationConfig::default()
                },
                ConfigError::EmptyShapePool(vec![]),
            ),
            (
                SimulationConfig {
                    lookahead: 0,
                    ..SimulationConfig::default()
                },
                ConfigError::ZeroLookahead,
            ),
            (
                SimulationConfig {
                    fast_gravity_interval: Duration::ZERO,
                    ..SimulationConfig::default()
                },
                ConfigError::ZeroInterval("fast gravity interval"),
            ),
            (
                SimulationConfig {
                    board: GridBoardConfig {
                        width: 0,
                        ..GridBoardConfig::default()
                    },
                    ..SimulationConfig::default()
                },
                ConfigError::EmptyBoard {
                    width: 0,
                    height: 20,
                },
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
    }

    #[test]
    fn test_factory_config() {
        let config = SimulationConfig {
            lookahead: 5,
            freeze_duration: Duration::from_millis(10),
            ..SimulationConfig::default()
        };
        let factory = config.factory_config();
        assert_eq!(factory.lookahead, 5);
        assert_eq!(factory.timing.freeze_duration, Duration::from_millis(10));
    }
}
