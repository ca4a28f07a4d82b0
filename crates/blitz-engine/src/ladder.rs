//! Ladder configuration.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Multiplier ladder applied to a base amount.
///
/// `max_steps` is the protective circuit breaker: that many consecutive
/// losses reset the ladder exactly as a win would.
#[derive(Debug, Clone)]
pub struct LadderConfig {
    multipliers: Vec<u32>,
    max_steps: u32,
}

impl LadderConfig {
    pub fn new(multipliers: Vec<u32>, max_steps: u32) -> EngineResult<Self> {
        if multipliers.is_empty() {
            return Err(EngineError::InvalidLadder("empty multiplier list".into()));
        }
        if multipliers.contains(&0) {
            return Err(EngineError::InvalidLadder("zero multiplier".into()));
        }
        if max_steps == 0 {
            return Err(EngineError::InvalidLadder("max_steps must be >= 1".into()));
        }
        Ok(Self {
            multipliers,
            max_steps,
        })
    }

    /// Classic doubling ladder: 1x, 2x, 4x, 8x, 16x, 32x; reset after 6
    /// consecutive losses.
    pub fn six_rung() -> Self {
        Self {
            multipliers: vec![1, 2, 4, 8, 16, 32],
            max_steps: 6,
        }
    }

    /// Front-loaded eight-rung ladder: holds 1x through the first losses
    /// before escalating; reset after 8 consecutive losses.
    pub fn front_loaded() -> Self {
        Self {
            multipliers: vec![1, 1, 1, 2, 4, 8, 16, 32],
            max_steps: 8,
        }
    }

    /// Multiplier for a rung, clamped to the last rung.
    pub fn multiplier(&self, step: usize) -> u32 {
        let idx = step.min(self.last_step());
        self.multipliers[idx]
    }

    pub fn last_step(&self) -> usize {
        self.multipliers.len() - 1
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn multipliers(&self) -> &[u32] {
        &self.multipliers
    }
}

/// Named ladder presets for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderPreset {
    #[default]
    SixRung,
    FrontLoaded,
}

impl LadderPreset {
    pub fn to_config(self) -> LadderConfig {
        match self {
            Self::SixRung => LadderConfig::six_rung(),
            Self::FrontLoaded => LadderConfig::front_loaded(),
        }
    }
}
