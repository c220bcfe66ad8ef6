use serde::{Deserialize, Serialize};

/// One prompt in a session, plus the response once it arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub prompt: String,
    pub response: Option<String>,
    pub depth: u32,
    pub template_name: String,
}

impl Step {
    pub fn new(prompt: String, depth: u32, template_name: impl Into<String>) -> Self {
        Self {
            prompt,
            response: None,
            depth,
            template_name: template_name.into(),
        }
    }

    /// True once a non-empty response has been attached.
    pub fn is_answered(&self) -> bool {
        self.response.as_deref().is_some_and(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response_is_not_an_answer() {
        let mut step = Step::new("Why?".to_string(), 0, "initiate");
        assert!(!step.is_answered());
        step.response = Some(String::new());
        assert!(!step.is_answered());
        step.response = Some("Because.".to_string());
        assert!(step.is_answered());
    }
}
