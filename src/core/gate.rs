/// Stage progression gate: depth scoring and advancement checks.
use serde::{Deserialize, Serialize};

use crate::schema::session::Session;
use crate::schema::stage::Stage;

/// Score for having completed `depth` steps while at `stage`.
///
/// Triangular in depth, scaled by the stage level, so it never decreases
/// as either argument grows. Depth 3 at Foundation scores 6; depth 7 at
/// Foundation scores 28.
pub fn depth_score(depth: u32, stage: Stage) -> u64 {
    let d = u64::from(depth);
    d * (d + 1) / 2 * stage.level()
}

/// Outcome of an advancement query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Advancement {
    pub ready: bool,
    /// The stage the session would move to, when `ready`.
    pub next: Option<Stage>,
}

impl Advancement {
    fn blocked() -> Self {
        Self {
            ready: false,
            next: None,
        }
    }
}

/// Pure check: does `session` meet every threshold for leaving its stage?
pub fn check_advancement(session: &Session) -> Advancement {
    let (Some(criteria), Some(next)) = (session.stage.criteria(), session.stage.next()) else {
        return Advancement::blocked();
    };

    let progress = &session.progress;
    let ready = progress.depth_score >= criteria.depth_score
        && progress.residue_count >= criteria.residue_count
        && session.metrics.stability_band >= criteria.stability_band;

    if ready {
        Advancement {
            ready: true,
            next: Some(next),
        }
    } else {
        Advancement::blocked()
    }
}
