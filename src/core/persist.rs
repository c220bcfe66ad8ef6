/// Session persistence: JSON in memory and on disk.
use std::path::Path;
use thiserror::Error;

use crate::schema::session::Session;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn to_json(session: &Session) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(session)?)
}

pub fn from_json(input: &str) -> Result<Session, PersistError> {
    Ok(serde_json::from_str(input)?)
}

/// Write a session to `path` as pretty JSON.
pub fn save(session: &Session, path: &Path) -> Result<(), PersistError> {
    std::fs::write(path, to_json(session)?)?;
    tracing::info!(session = %session.id, path = %path.display(), "saved session");
    Ok(())
}

/// Read a session written by [`save`].
pub fn load(path: &Path) -> Result<Session, PersistError> {
    let contents = std::fs::read_to_string(path)?;
    let session = from_json(&contents)?;
    tracing::info!(session = %session.id, path = %path.display(), "loaded session");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::MetricState;
    use crate::schema::stage::Stage;
    use crate::schema::step::Step;

    fn busy_session() -> Session {
        let mut s = Session::new("loops", Step::new("Open {x}".to_string(), 0, "opening"));
        s.steps[0].response = Some("Loops within loops.".to_string());
        s.steps.push(Step::new("Next?".to_string(), 1, "initiate"));
        s.stage = Stage::Amplification;
        s.residue.insert("RECURSION-ITSELF".to_string());
        s.residue.insert("PATTERN".to_string());
        let first = MetricState::tick(None);
        let second = MetricState::tick(Some(&first));
        s.metric_history = vec![first, second.clone()];
        s.metrics = second;
        s.progress.depth = 2;
        s.progress.depth_score = 6;
        s.progress.residue_count = 3;
        s.template_mastery.insert("opening".to_string(), 0.2);
        s
    }

    #[test]
    fn json_round_trip() {
        let session = busy_session();
        let json = to_json(&session).unwrap();
        let back = from_json(&json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn json_shape() {
        let json = to_json(&busy_session()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stageName"], "AMPLIFICATION");
        assert_eq!(value["steps"][0]["templateName"], "opening");
        assert!(value["steps"][1]["response"].is_null());
        assert!(value["startTime"].is_string());
        assert!(value["endTime"].is_null());
        assert_eq!(value["residueSet"].as_array().unwrap().len(), 2);
        assert_eq!(value["metricState"]["tension_capacity"], 95.0);
        assert_eq!(value["progress"]["depthScore"], 6);
        assert!(value["templateMastery"].is_object());
    }

    #[test]
    fn save_and_load() {
        let session = busy_session();
        let path = std::env::temp_dir().join(format!("session-{}.json", session.id));
        save(&session, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, session);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(from_json("{ not json"), Err(PersistError::Json(_))));
    }
}
