/// The recursion engine: prompt → response → next prompt orchestration.
///
/// Owns every live session, looks templates up in a shared read-only
/// store, and wires together residue extraction, metric ticks and the
/// stage gate.
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::core::achievements::{self, AchievementReport};
use crate::core::config::EngineConfig;
use crate::core::extract::{
    HeuristicExtractor, InsightExtractor, KeywordResidueExtractor, ResidueExtractor,
};
use crate::core::gate::{self, Advancement};
use crate::core::metrics::MetricState;
use crate::core::persist::{self, PersistError};
use crate::core::policy::{RecursionPolicy, StepInputs, TemplateSelector, DEFAULT_TOPIC};
use crate::core::template::{PromptContext, Template, TemplateError, TemplateStore};
use crate::schema::session::{Session, SessionId};
use crate::schema::stage::Stage;
use crate::schema::step::Step;

/// Mastery assigned to a template the first time a response answers it.
pub const INITIAL_MASTERY: f64 = 0.2;

/// Fraction of the remaining gap to 1.0 closed on each later use.
pub const MASTERY_RATE: f64 = 0.1;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
    #[error("session not found: {0}")]
    UnknownSession(SessionId),
    #[error("session {0} has ended")]
    SessionEnded(SessionId),
    #[error("template '{template}' needs stage {level}, session is at {stage}")]
    TemplateLocked {
        template: String,
        level: Stage,
        stage: Stage,
    },
    #[error("the last step is still waiting for a response")]
    ResponsePending,
    #[error("the last step already has a response")]
    NoPendingStep,
    #[error("response text is empty")]
    EmptyResponse,
    #[error("advancement criteria not met at stage {stage}")]
    CriteriaNotMet { stage: Stage },
}

/// Read-only view of a session's counters and current metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub stage: Stage,
    pub depth: u32,
    pub depth_score: u64,
    pub residue_count: u64,
    pub coherence: f64,
    pub coherence_motion: f64,
    pub stability_band: f64,
    pub is_stable: bool,
}

/// The top-level recursion engine. Built via `RecursionEngine::builder()`.
pub struct RecursionEngine {
    templates: Arc<TemplateStore>,
    sessions: FxHashMap<SessionId, Session>,
    residue_extractor: Box<dyn ResidueExtractor>,
    insight_extractor: Box<dyn InsightExtractor>,
    policy: RecursionPolicy,
    max_insights: usize,
}

/// Builder for constructing a `RecursionEngine`.
pub struct RecursionEngineBuilder {
    templates: Option<Arc<TemplateStore>>,
    templates_dir: Option<PathBuf>,
    policy: RecursionPolicy,
    residue_extractor: Option<Box<dyn ResidueExtractor>>,
    insight_extractor: Option<Box<dyn InsightExtractor>>,
    config: EngineConfig,
}

impl RecursionEngine {
    pub fn builder() -> RecursionEngineBuilder {
        RecursionEngineBuilder {
            templates: None,
            templates_dir: None,
            policy: RecursionPolicy::default(),
            residue_extractor: None,
            insight_extractor: None,
            config: EngineConfig::default(),
        }
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Handle to the template store for sharing with other engines.
    pub fn shared_templates(&self) -> Arc<TemplateStore> {
        Arc::clone(&self.templates)
    }

    /// Start a session whose first prompt is `template` rendered with
    /// `context`.
    pub fn start(
        &mut self,
        template: &str,
        context: &PromptContext,
    ) -> Result<SessionId, EngineError> {
        check_available(self.templates.resolve(template)?, Stage::Foundation)?;
        let prompt = self.templates.render(template, context)?;
        // A guess read off a half-rendered prompt would carry raw placeholders.
        let topic = context
            .get("topic")
            .map(str::to_string)
            .or_else(|| self.insight_extractor.topic(&prompt))
            .filter(|t| !t.contains(['{', '}']))
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

        let mut session = Session::new(topic, Step::new(prompt, 0, template));
        session.policy = self.policy.clone();
        let id = session.id;
        tracing::info!(session = %id, template, topic = %session.topic, "session started");
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Attach `text` as the response to the session's last step.
    pub fn add_response(&mut self, id: SessionId, text: &str) -> Result<(), EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::EmptyResponse);
        }
        let session = live_session(&mut self.sessions, id)?;

        let (tags, template_name) = match session.steps.last() {
            Some(last) if !last.is_answered() => (
                self.residue_extractor.extract(&last.prompt, text),
                last.template_name.clone(),
            ),
            _ => return Err(EngineError::NoPendingStep),
        };
        let metrics = MetricState::tick(session.metric_history.last());
        let depth = session.progress.depth + 1;
        let mastery = session
            .template_mastery
            .get(&template_name)
            .map_or(INITIAL_MASTERY, |m| m + MASTERY_RATE * (1.0 - m));

        if let Some(last) = session.steps.last_mut() {
            last.response = Some(text.to_string());
        }
        session.progress.residue_count += tags.len() as u64;
        session.residue.extend(tags);
        session.progress.depth = depth;
        session.progress.depth_score = gate::depth_score(depth, session.stage);
        session.template_mastery.insert(template_name, mastery);
        session.metric_history.push(metrics.clone());
        session.metrics = metrics;

        tracing::debug!(
            session = %id,
            depth,
            residue = session.residue.len(),
            residue_count = session.progress.residue_count,
            coherence = session.metrics.coherence(),
            stability_band = session.metrics.stability_band,
            "response recorded"
        );
        Ok(())
    }

    /// Generate, append and return the session's next prompt.
    pub fn next_step(&mut self, id: SessionId) -> Result<Step, EngineError> {
        let session = live_session(&mut self.sessions, id)?;
        if session.is_awaiting_response() {
            return Err(EngineError::ResponsePending);
        }

        let last = session.steps.last();
        let depth = last.map_or(0, |s| s.depth + 1);
        let response = last.and_then(|s| s.response.as_deref()).unwrap_or("");
        let insights = self.insight_extractor.insights(response, self.max_insights);

        let name = session.policy.select_template(depth, &session.residue);
        let template = self.templates.resolve(name)?;
        check_available(template, session.stage)?;
        let context = session.policy.context(
            template,
            &StepInputs {
                depth,
                topic: &session.topic,
                insights: &insights,
                residue: &session.residue,
            },
        );
        let prompt = self.templates.render(name, &context)?;
        let step = Step::new(prompt, depth, name);

        tracing::debug!(session = %id, depth, template = name, "next step rendered");
        session.steps.push(step.clone());
        Ok(step)
    }

    /// Pure check against the session's current stage thresholds.
    pub fn check_advancement(&self, id: SessionId) -> Result<Advancement, EngineError> {
        Ok(gate::check_advancement(self.session(id)?))
    }

    /// Move the session to its next stage if every threshold is met.
    pub fn advance(&mut self, id: SessionId) -> Result<Stage, EngineError> {
        let session = live_session(&mut self.sessions, id)?;

        let advancement = gate::check_advancement(session);
        let next = match advancement.next {
            Some(next) if advancement.ready => next,
            _ => {
                return Err(EngineError::CriteriaNotMet {
                    stage: session.stage,
                })
            }
        };

        let from = session.stage;
        session.stage = next;
        session.progress.depth_score = gate::depth_score(session.progress.depth, next);
        tracing::info!(session = %id, %from, to = %next, "stage advanced");
        Ok(next)
    }

    /// Stamp the session's end time. Ending twice keeps the first stamp.
    /// An ended session stays readable but rejects further steps,
    /// advancement and policy changes.
    pub fn end_session(&mut self, id: SessionId) -> Result<(), EngineError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(EngineError::UnknownSession(id))?;
        if session.end_time.is_none() {
            session.end_time = Some(chrono::Utc::now());
            tracing::info!(session = %id, steps = session.steps.len(), "session ended");
        }
        Ok(())
    }

    pub fn session(&self, id: SessionId) -> Result<&Session, EngineError> {
        self.sessions
            .get(&id)
            .ok_or(EngineError::UnknownSession(id))
    }

    pub fn session_ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn metrics(&self, id: SessionId) -> Result<SessionMetrics, EngineError> {
        let session = self.session(id)?;
        let m = &session.metrics;
        Ok(SessionMetrics {
            stage: session.stage,
            depth: session.progress.depth,
            depth_score: session.progress.depth_score,
            residue_count: session.progress.residue_count,
            coherence: m.coherence(),
            coherence_motion: m.coherence_motion,
            stability_band: m.stability_band,
            is_stable: m.is_stable(),
        })
    }

    pub fn residue(&self, id: SessionId) -> Result<&FxHashSet<String>, EngineError> {
        Ok(&self.session(id)?.residue)
    }

    pub fn remove_session(&mut self, id: SessionId) -> Result<Session, EngineError> {
        self.sessions
            .remove(&id)
            .ok_or(EngineError::UnknownSession(id))
    }

    /// Take ownership of an existing session, replacing any session with
    /// the same id.
    pub fn import_session(&mut self, session: Session) -> SessionId {
        let id = session.id;
        if self.sessions.insert(id, session).is_some() {
            tracing::debug!(session = %id, "replaced existing session on import");
        }
        id
    }

    /// Run the session's later steps under `policy`. Every template the
    /// policy can select must be registered and unlocked at the session's
    /// current stage.
    pub fn switch_policy(
        &mut self,
        id: SessionId,
        policy: RecursionPolicy,
    ) -> Result<(), EngineError> {
        let session = live_session(&mut self.sessions, id)?;
        for name in policy.required_templates() {
            check_available(self.templates.resolve(name)?, session.stage)?;
        }
        session.policy = policy;
        tracing::info!(session = %id, "recursion policy switched");
        Ok(())
    }

    pub fn achievement_report(&self, id: SessionId) -> Result<AchievementReport, EngineError> {
        Ok(achievements::report(self.session(id)?))
    }

    pub fn save_session(&self, id: SessionId, path: &Path) -> Result<(), EngineError> {
        persist::save(self.session(id)?, path)?;
        Ok(())
    }

    /// Load a session saved with [`save_session`](Self::save_session) and
    /// import it.
    pub fn load_session(&mut self, path: &Path) -> Result<SessionId, EngineError> {
        let session = persist::load(path)?;
        Ok(self.import_session(session))
    }
}

/// Look up a session that has not been ended.
fn live_session(
    sessions: &mut FxHashMap<SessionId, Session>,
    id: SessionId,
) -> Result<&mut Session, EngineError> {
    let session = sessions
        .get_mut(&id)
        .ok_or(EngineError::UnknownSession(id))?;
    if session.is_ended() {
        return Err(EngineError::SessionEnded(id));
    }
    Ok(session)
}

fn check_available(template: &Template, stage: Stage) -> Result<(), EngineError> {
    if template.is_available_at(stage) {
        Ok(())
    } else {
        Err(EngineError::TemplateLocked {
            template: template.name.clone(),
            level: template.level,
            stage,
        })
    }
}

impl RecursionEngineBuilder {
    /// Provide templates directly instead of the built-in set.
    pub fn templates(mut self, store: impl Into<Arc<TemplateStore>>) -> Self {
        self.templates = Some(store.into());
        self
    }

    /// Merge every `.ron` file in `path` over the base templates.
    pub fn templates_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.templates_dir = Some(path.into());
        self
    }

    /// Policy given to every new session.
    pub fn policy(mut self, policy: RecursionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn residue_extractor(mut self, extractor: impl ResidueExtractor + 'static) -> Self {
        self.residue_extractor = Some(Box::new(extractor));
        self
    }

    pub fn insight_extractor(mut self, extractor: impl InsightExtractor + 'static) -> Self {
        self.insight_extractor = Some(Box::new(extractor));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<RecursionEngine, EngineError> {
        let mut templates = match self.templates {
            Some(store) => store,
            None => Arc::new(TemplateStore::seed()?),
        };

        // Builder directory overrides the configured one.
        if let Some(dir) = self.templates_dir.or(self.config.templates_dir) {
            if dir.is_dir() {
                let overrides = TemplateStore::load_from_dir(&dir)?;
                tracing::debug!(dir = %dir.display(), count = overrides.len(), "merged template overrides");
                Arc::make_mut(&mut templates).merge(overrides);
            } else {
                tracing::warn!(dir = %dir.display(), "templates directory not found");
            }
        }

        let residue_extractor: Box<dyn ResidueExtractor> = match self.residue_extractor {
            Some(extractor) => extractor,
            None => Box::new(KeywordResidueExtractor::new(self.config.residue_catalog)),
        };
        let insight_extractor: Box<dyn InsightExtractor> = match self.insight_extractor {
            Some(extractor) => extractor,
            None => Box::new(HeuristicExtractor),
        };

        Ok(RecursionEngine {
            templates,
            sessions: FxHashMap::default(),
            residue_extractor,
            insight_extractor,
            policy: self.policy,
            max_insights: self.config.max_insights,
        })
    }
}
