/// Recursion policy: which template comes next, and what fills it.
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::template::{PromptContext, Template};

/// Dimensions offered by the build-on-insights step, indexed by depth.
pub const DIMENSIONS: [&str; 8] = [
    "underlying principles",
    "practical applications",
    "historical context",
    "future implications",
    "ethical considerations",
    "systemic relationships",
    "metaphorical representations",
    "cross-domain connections",
];

pub const DEFAULT_TOPIC: &str = "this subject";
pub const FALLBACK_INSIGHT: &str = "Your exploration of multiple perspectives";
pub const DEFAULT_PATTERN: &str =
    "Our perspectives seem to be building upon each other in interesting ways";

/// Every context key a policy may fill.
pub const CONTEXT_KEYS: [&str; 5] = ["topic", "insight_1", "insight_2", "new_dimension", "pattern"];

/// Picks the template for a step.
pub trait TemplateSelector {
    fn select_template(&self, depth: u32, residue: &FxHashSet<String>) -> &str;
}

/// Template names used by the seed policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTemplates {
    pub initiate: String,
    pub synthesis: String,
    pub build_on_insights: String,
}

impl Default for SeedTemplates {
    fn default() -> Self {
        Self {
            initiate: "initiate".to_string(),
            synthesis: "synthesis".to_string(),
            build_on_insights: "build-on-insights".to_string(),
        }
    }
}

/// The recursion policies a session can run under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecursionPolicy {
    /// Initiate at depth 1, synthesize every third step, build on
    /// insights otherwise.
    Seed(SeedTemplates),
}

impl Default for RecursionPolicy {
    fn default() -> Self {
        Self::Seed(SeedTemplates::default())
    }
}

impl TemplateSelector for RecursionPolicy {
    fn select_template(&self, depth: u32, _residue: &FxHashSet<String>) -> &str {
        match self {
            Self::Seed(names) => {
                if depth == 1 {
                    &names.initiate
                } else if depth % 3 == 0 {
                    &names.synthesis
                } else {
                    &names.build_on_insights
                }
            }
        }
    }
}

/// What a policy knows when building the next prompt.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    pub depth: u32,
    pub topic: &'a str,
    pub insights: &'a [String],
    pub residue: &'a FxHashSet<String>,
}

impl RecursionPolicy {
    /// Names of every template this policy can select.
    pub fn required_templates(&self) -> Vec<&str> {
        match self {
            Self::Seed(names) => vec![
                names.initiate.as_str(),
                names.synthesis.as_str(),
                names.build_on_insights.as_str(),
            ],
        }
    }

    /// Build the context for `template`, filling only the keys it declares.
    pub fn context(&self, template: &Template, inputs: &StepInputs<'_>) -> PromptContext {
        let mut ctx = PromptContext::new();
        for key in template.placeholders() {
            let value = match key.as_str() {
                "topic" => inputs.topic.to_string(),
                "insight_1" => inputs
                    .insights
                    .first()
                    .cloned()
                    .unwrap_or_else(|| inputs.topic.to_string()),
                "insight_2" => inputs
                    .insights
                    .get(1)
                    .cloned()
                    .unwrap_or_else(|| FALLBACK_INSIGHT.to_string()),
                "new_dimension" => dimension(inputs.depth).to_string(),
                "pattern" => pattern(inputs.depth, inputs.residue).to_string(),
                _ => continue,
            };
            ctx.insert(key.as_str(), value);
        }
        ctx
    }
}

/// Dimension for `depth`, clamped to the last entry.
pub fn dimension(depth: u32) -> &'static str {
    let idx = (depth.saturating_sub(1) as usize).min(DIMENSIONS.len() - 1);
    DIMENSIONS[idx]
}

/// Pattern sentence for a synthesis step.
pub fn pattern(depth: u32, residue: &FxHashSet<String>) -> &'static str {
    if depth > 1 {
        if residue.contains("RECURSION-ITSELF") {
            return "Our recursive exploration is creating increasingly deeper layers of understanding";
        }
        if residue.contains("META-REFLECTION") {
            return "We're not just exploring the topic, but also our process of exploration itself";
        }
        if depth > 3 {
            return "Each recursive cycle brings new dimensions that transform our previous understanding";
        }
    }
    DEFAULT_PATTERN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residue(tags: &[&str]) -> FxHashSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn depth_selection() {
        let policy = RecursionPolicy::default();
        let empty = FxHashSet::default();
        assert_eq!(policy.select_template(1, &empty), "initiate");
        for d in [3, 6, 9] {
            assert_eq!(policy.select_template(d, &empty), "synthesis");
        }
        for d in [2, 4, 5, 7, 8] {
            assert_eq!(policy.select_template(d, &empty), "build-on-insights");
        }
    }

    #[test]
    fn custom_names() {
        let policy = RecursionPolicy::Seed(SeedTemplates {
            initiate: "a".to_string(),
            synthesis: "b".to_string(),
            build_on_insights: "c".to_string(),
        });
        let empty = FxHashSet::default();
        assert_eq!(policy.select_template(1, &empty), "a");
        assert_eq!(policy.select_template(3, &empty), "b");
        assert_eq!(policy.select_template(2, &empty), "c");
        assert_eq!(policy.required_templates(), vec!["a", "b", "c"]);
    }

    #[test]
    fn dimension_clamps() {
        assert_eq!(dimension(0), "underlying principles");
        assert_eq!(dimension(1), "underlying principles");
        assert_eq!(dimension(2), "practical applications");
        assert_eq!(dimension(8), "cross-domain connections");
        assert_eq!(dimension(50), "cross-domain connections");
    }

    #[test]
    fn pattern_priority() {
        assert_eq!(pattern(1, &residue(&["RECURSION-ITSELF"])), DEFAULT_PATTERN);
        assert!(pattern(3, &residue(&["RECURSION-ITSELF", "META-REFLECTION"])).contains("deeper layers"));
        assert!(pattern(3, &residue(&["META-REFLECTION"])).contains("process of exploration"));
        assert_eq!(pattern(3, &residue(&[])), DEFAULT_PATTERN);
        assert!(pattern(6, &residue(&[])).contains("Each recursive cycle"));
    }

    #[test]
    fn context_fills_declared_keys_only() {
        let policy = RecursionPolicy::default();
        let template = Template::new("t", "{topic}: {insight_1} / {insight_2} via {new_dimension}");
        let insights = vec!["First idea".to_string()];
        let tags = residue(&[]);
        let ctx = policy.context(
            &template,
            &StepInputs {
                depth: 2,
                topic: "loops",
                insights: &insights,
                residue: &tags,
            },
        );
        assert_eq!(ctx.len(), 4);
        assert!(!ctx.contains_key("pattern"));
        assert_eq!(
            template.render(&ctx),
            "loops: First idea / Your exploration of multiple perspectives via practical applications"
        );
    }

    #[test]
    fn missing_first_insight_uses_topic() {
        let policy = RecursionPolicy::default();
        let template = Template::new("t", "{insight_1}|{unknown}");
        let tags = residue(&[]);
        let ctx = policy.context(
            &template,
            &StepInputs {
                depth: 2,
                topic: "loops",
                insights: &[],
                residue: &tags,
            },
        );
        assert_eq!(template.render(&ctx), "loops|{unknown}");
    }
}
