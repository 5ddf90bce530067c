//! Generator configuration and configuration errors.
//!
//! Configuration is plain data that can be deserialized from JSON. Missing
//! fields fall back to the defaults below, so `{"width": 8, "height": 8}` is a
//! complete config.

use crate::heap::TieBreak;
use crate::module::EdgeConnectionType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seed value requesting a time-derived, non-reproducible seed.
pub const RANDOM_SEED: i32 = -1;

/// Error type for invalid generator input, detected before solving starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Width or height not strictly positive
    InvalidDimensions { width: i32, height: i32 },
    /// Grid cannot host distinct start and goal cells
    GridTooSmall { width: usize, height: usize },
    /// Catalog without modules
    EmptyCatalog,
    /// Two modules share the same id
    DuplicateModule(String),
    /// Designated start module not in the catalog
    MissingStartModule(String),
    /// Designated goal module not in the catalog
    MissingGoalModule(String),
    /// Start and goal designate the same module
    StartIsGoal(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDimensions { width, height } => {
                write!(f, "impossible grid dimensions {}x{}", width, height)
            }
            ConfigError::GridTooSmall { width, height } => write!(
                f,
                "grid {}x{} is too small to place distinct start and goal cells",
                width, height
            ),
            ConfigError::EmptyCatalog => write!(f, "module catalog is empty"),
            ConfigError::DuplicateModule(id) => write!(f, "duplicate module id '{}'", id),
            ConfigError::MissingStartModule(id) => {
                write!(f, "start module '{}' not found in catalog", id)
            }
            ConfigError::MissingGoalModule(id) => {
                write!(f, "goal module '{}' not found in catalog", id)
            }
            ConfigError::StartIsGoal(id) => {
                write!(f, "module '{}' cannot be both start and goal", id)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// What to do when a forced assignment disagrees with an already final
/// neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Refuse the assignment and fail the run
    #[default]
    Abort,
    /// Log the anomaly, keep it in the result and carry on
    Record,
}

/// Parameters of a single generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub width: i32,
    pub height: i32,
    /// RNG seed, [`RANDOM_SEED`] for a time-derived one
    pub seed: i32,
    /// The only edge type the outer rim may expose
    pub boundary_edge: EdgeConnectionType,
    pub tie_break: TieBreak,
    pub mismatch_policy: MismatchPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            seed: RANDOM_SEED,
            boundary_edge: EdgeConnectionType::Block,
            tie_break: TieBreak::Random,
            mismatch_policy: MismatchPolicy::Abort,
        }
    }
}

impl GeneratorConfig {
    pub fn new(width: i32, height: i32, seed: i32) -> Self {
        Self {
            width,
            height,
            seed,
            ..Self::default()
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }

    pub fn with_boundary_edge(mut self, edge: EdgeConnectionType) -> Self {
        self.boundary_edge = edge;
        self
    }

    /// Check the dimensions and return them as grid sizes.
    ///
    /// The start cell is drawn from rows `1..height` and the goal cell from
    /// rows `0..height - 1`, so a grid needs at least two rows.
    pub fn validate(&self) -> Result<(usize, usize), ConfigError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let (width, height) = (self.width as usize, self.height as usize);
        if height < 2 {
            return Err(ConfigError::GridTooSmall { width, height });
        }

        Ok((width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_non_positive() {
        for (w, h) in [(0, 4), (4, 0), (-1, 4), (4, -3)] {
            let err = GeneratorConfig::new(w, h, 1).validate().unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidDimensions {
                    width: w,
                    height: h
                }
            );
        }
    }

    #[test]
    fn test_validate_rejects_single_row() {
        let err = GeneratorConfig::new(1, 1, 1).validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::GridTooSmall {
                width: 1,
                height: 1
            }
        );
        assert!(GeneratorConfig::new(5, 1, 1).validate().is_err());
        assert_eq!(GeneratorConfig::new(1, 2, 1).validate(), Ok((1, 2)));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{"width": 6, "height": 4, "tie_break": "stable_index"}"#)
                .unwrap();
        assert_eq!(config.width, 6);
        assert_eq!(config.height, 4);
        assert_eq!(config.seed, RANDOM_SEED);
        assert_eq!(config.tie_break, TieBreak::StableIndex);
        assert_eq!(config.boundary_edge, EdgeConnectionType::Block);
        assert_eq!(config.mismatch_policy, MismatchPolicy::Abort);
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::InvalidDimensions {
            width: 0,
            height: 3,
        };
        assert_eq!(err.to_string(), "impossible grid dimensions 0x3");
        assert!(ConfigError::MissingStartModule("s".into())
            .to_string()
            .contains("'s'"));
    }
}
