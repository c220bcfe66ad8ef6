use serde::{Deserialize, Serialize};
use std::fmt;

/// The five ordered progression stages of a session.
///
/// Stages only ever move forward, one at a time, and only when the caller
/// asks for it after the gate reports the session as eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Foundation,
    Amplification,
    Integration,
    Emergence,
    Meta,
}

impl Default for Stage {
    fn default() -> Self {
        Self::Foundation
    }
}

/// Thresholds a session must meet, all at once, to leave a stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvancementCriteria {
    pub depth_score: u64,
    pub residue_count: u64,
    pub stability_band: f64,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Self::Foundation,
        Self::Amplification,
        Self::Integration,
        Self::Emergence,
        Self::Meta,
    ];

    /// One-based level: Foundation is 1, Meta is 5.
    pub fn level(&self) -> u64 {
        match self {
            Self::Foundation => 1,
            Self::Amplification => 2,
            Self::Integration => 3,
            Self::Emergence => 4,
            Self::Meta => 5,
        }
    }

    /// Upper-case name used in reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Foundation => "FOUNDATION",
            Self::Amplification => "AMPLIFICATION",
            Self::Integration => "INTEGRATION",
            Self::Emergence => "EMERGENCE",
            Self::Meta => "META",
        }
    }

    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::Foundation => Some(Self::Amplification),
            Self::Amplification => Some(Self::Integration),
            Self::Integration => Some(Self::Emergence),
            Self::Emergence => Some(Self::Meta),
            Self::Meta => None,
        }
    }

    /// Criteria for leaving this stage. `None` for the terminal stage.
    pub fn criteria(&self) -> Option<AdvancementCriteria> {
        let (depth_score, residue_count, stability_band) = match self {
            Self::Foundation => (25, 10, 0.7),
            Self::Amplification => (75, 25, 0.8),
            Self::Integration => (150, 50, 0.85),
            Self::Emergence => (300, 100, 0.9),
            Self::Meta => return None,
        };
        Some(AdvancementCriteria {
            depth_score,
            residue_count,
            stability_band,
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
