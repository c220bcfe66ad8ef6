use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::stage::Stage;
use super::step::Step;
use crate::core::metrics::MetricState;
use crate::core::policy::RecursionPolicy;

/// Newtype wrapper for session IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Counters the stage gate reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Number of steps that have received a response.
    pub depth: u32,
    pub depth_score: u64,
    /// Residue tags extracted over the whole session, repeats included.
    pub residue_count: u64,
}

/// A single recursive interaction: its steps, metrics and residue.
///
/// The session owns everything it references except templates, which are
/// looked up by name from the engine's store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    #[serde(rename = "stageName")]
    pub stage: Stage,
    pub topic: String,
    #[serde(default)]
    pub policy: RecursionPolicy,
    pub steps: Vec<Step>,
    #[serde(rename = "metricState")]
    pub metrics: MetricState,
    /// One entry per completed step, oldest first.
    #[serde(default)]
    pub metric_history: Vec<MetricState>,
    #[serde(rename = "residueSet")]
    pub residue: FxHashSet<String>,
    pub progress: Progress,
    #[serde(default)]
    pub template_mastery: FxHashMap<String, f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh session at Foundation whose first step is `initial`.
    pub fn new(topic: impl Into<String>, initial: Step) -> Self {
        Self {
            id: SessionId::new(),
            stage: Stage::Foundation,
            topic: topic.into(),
            policy: RecursionPolicy::default(),
            steps: vec![initial],
            metrics: MetricState::default(),
            metric_history: Vec::new(),
            residue: FxHashSet::default(),
            progress: Progress::default(),
            template_mastery: FxHashMap::default(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// True when the last step is still waiting for its response.
    pub fn is_awaiting_response(&self) -> bool {
        self.steps.last().is_some_and(|s| !s.is_answered())
    }

    pub fn has_residue(&self, tag: &str) -> bool {
        self.residue.contains(tag)
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session() -> Session {
        Session::new(
            "emergence",
            Step::new("Let's explore emergence.".to_string(), 0, "initiate"),
        )
    }

    #[test]
    fn new_session_defaults() {
        let session = make_session();
        assert_eq!(session.stage, Stage::Foundation);
        assert_eq!(session.steps.len(), 1);
        assert_eq!(session.progress, Progress::default());
        assert!(session.residue.is_empty());
        assert!(session.metric_history.is_empty());
        assert!(session.is_awaiting_response());
        assert!(!session.is_ended());
    }

    #[test]
    fn answered_step_clears_awaiting() {
        let mut session = make_session();
        session.steps[0].response = Some("An answer.".to_string());
        assert!(!session.is_awaiting_response());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
