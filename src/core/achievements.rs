/// Milestones derived from session progress.
use serde::{Deserialize, Serialize};

use crate::core::gate::check_advancement;
use crate::schema::session::Session;
use crate::schema::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Achievement {
    RecursionNovice,
    RecursionAdept,
    RecursionMaster,
    InfiniteRegress,
    PatternSpotter,
    TemplateCollector,
    TemplateArtisan,
}

impl Achievement {
    pub const ALL: [Achievement; 7] = [
        Self::RecursionNovice,
        Self::RecursionAdept,
        Self::RecursionMaster,
        Self::InfiniteRegress,
        Self::PatternSpotter,
        Self::TemplateCollector,
        Self::TemplateArtisan,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::RecursionNovice => "recursion_novice",
            Self::RecursionAdept => "recursion_adept",
            Self::RecursionMaster => "recursion_master",
            Self::InfiniteRegress => "infinite_regress",
            Self::PatternSpotter => "pattern_spotter",
            Self::TemplateCollector => "template_collector",
            Self::TemplateArtisan => "template_artisan",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::RecursionNovice => "Complete 5 recursive cycles",
            Self::RecursionAdept => "Complete 25 recursive cycles",
            Self::RecursionMaster => "Complete 100 recursive cycles",
            Self::InfiniteRegress => "Maintain a 10+ depth recursion chain",
            Self::PatternSpotter => "Identify 25 residue patterns",
            Self::TemplateCollector => "Use 3 different templates",
            Self::TemplateArtisan => "Reach 0.8 mastery with 2 templates",
        }
    }

    pub fn is_earned(&self, session: &Session) -> bool {
        let p = &session.progress;
        match self {
            Self::RecursionNovice => p.depth >= 5,
            Self::RecursionAdept => p.depth >= 25,
            Self::RecursionMaster => p.depth >= 100,
            Self::InfiniteRegress => session.steps.last().is_some_and(|s| s.depth >= 10),
            Self::PatternSpotter => p.residue_count >= 25,
            Self::TemplateCollector => session.template_mastery.len() >= 3,
            Self::TemplateArtisan => {
                session
                    .template_mastery
                    .values()
                    .filter(|m| **m >= 0.8)
                    .count()
                    >= 2
            }
        }
    }
}

/// Snapshot of where a session stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementReport {
    pub stage: Stage,
    pub earned: Vec<Achievement>,
    pub missing: Vec<Achievement>,
    /// Set when the session could advance right now.
    pub next_stage: Option<Stage>,
}

pub fn report(session: &Session) -> AchievementReport {
    let (earned, missing): (Vec<Achievement>, Vec<Achievement>) = Achievement::ALL
        .iter()
        .copied()
        .partition(|a| a.is_earned(session));
    AchievementReport {
        stage: session.stage,
        earned,
        missing,
        next_stage: check_advancement(session).next,
    }
}
