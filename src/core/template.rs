/// Prompt templates: parsing, registry, loading, and placeholder rendering.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::schema::stage::Stage;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Built-in template set for the seed recursion policy.
const SEED_TEMPLATES: &str = include_str!("../../shells/coinflux_seed/templates.ron");

/// Strict placeholder names in `text`, in order of appearance.
///
/// A declared placeholder is `{` + a non-empty run of `[A-Za-z0-9_.-]` +
/// `}`. Rendering is looser and substitutes any braced context key.
fn placeholder_names(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(len) = placeholder_len(&bytes[i + 1..]) {
                out.push(&text[i + 1..i + 1 + len]);
                i += len + 2;
                continue;
            }
        }
        i += 1;
    }
    out
}

fn placeholder_len(rest: &[u8]) -> Option<usize> {
    let len = rest.iter().take_while(|b| is_key_byte(**b)).count();
    (len > 0 && rest.get(len) == Some(&b'}')).then_some(len)
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.')
}

/// Values for a template's placeholders, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContext {
    values: BTreeMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for PromptContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = PromptContext::new();
        for (k, v) in iter {
            ctx.insert(k, v);
        }
        ctx
    }
}

/// A named prompt template. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub text: String,
    pub description: String,
    /// Residue signature of the template.
    pub tags: Vec<String>,
    /// Earliest stage at which the template may be used.
    pub level: Stage,
    placeholders: Vec<String>,
}

impl Template {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_details(name, text, String::new(), Vec::new())
    }

    pub fn with_details(
        name: impl Into<String>,
        text: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let text = text.into();
        let mut placeholders: Vec<String> = Vec::new();
        for key in placeholder_names(&text) {
            if !placeholders.iter().any(|p| p == key) {
                placeholders.push(key.to_string());
            }
        }
        Self {
            name: name.into(),
            text,
            description: description.into(),
            tags,
            level: Stage::Foundation,
            placeholders,
        }
    }

    pub fn with_level(mut self, level: Stage) -> Self {
        self.level = level;
        self
    }

    /// True if a session at `stage` may use this template.
    pub fn is_available_at(&self, stage: Stage) -> bool {
        self.level <= stage
    }

    /// Declared placeholder names, in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn declares(&self, key: &str) -> bool {
        self.placeholders.iter().any(|p| p == key)
    }

    /// Declared placeholders the context has no value for.
    pub fn missing_keys<'a>(&'a self, context: &PromptContext) -> Vec<&'a str> {
        self.placeholders
            .iter()
            .map(String::as_str)
            .filter(|k| !context.contains_key(k))
            .collect()
    }

    /// Context keys this template does not declare.
    pub fn undeclared_keys<'a>(&self, context: &'a PromptContext) -> Vec<&'a str> {
        context.keys().filter(|k| !self.declares(k)).collect()
    }

    /// Replace every `{key}` whose key is in `context`, scanning left to
    /// right in a single pass.
    ///
    /// The key is whatever sits between a `{` and the next `}`, so keys
    /// with spaces or non-ASCII letters substitute too. Braces with no
    /// matching context key are kept verbatim. Substituted values are
    /// copied as-is and never scanned again.
    pub fn render(&self, context: &PromptContext) -> String {
        let text = self.text.as_str();
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}').and_then(|close| {
                context.get(&after[..close]).map(|value| (close, value))
            }) {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

// RON files use a flatter shape than `Template`, so we go through an
// intermediate struct.

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Template")]
struct RonTemplate {
    text: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    level: Stage,
}

/// Findings from [`TemplateStore::lint`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Registry of templates keyed by command name.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, Template>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in template set used by the seed policy.
    pub fn seed() -> Result<TemplateStore, TemplateError> {
        Self::parse_ron(SEED_TEMPLATES)
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&Template, TemplateError> {
        self.templates
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Templates a session at `stage` may use, sorted by name.
    pub fn available_at(&self, stage: Stage) -> Vec<&Template> {
        self.names()
            .into_iter()
            .map(|name| &self.templates[name])
            .filter(|t| t.is_available_at(stage))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Render the named template with `context`.
    pub fn render(&self, name: &str, context: &PromptContext) -> Result<String, TemplateError> {
        let template = self.resolve(name)?;

        let missing = template.missing_keys(context);
        if !missing.is_empty() {
            tracing::debug!(template = name, ?missing, "placeholders left unfilled");
        }
        let ignored = template.undeclared_keys(context);
        if !ignored.is_empty() {
            tracing::debug!(template = name, ?ignored, "context keys not declared by template");
        }

        Ok(template.render(context))
    }

    /// Load a template set from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<TemplateStore, TemplateError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a template set from a RON string.
    pub fn parse_ron(input: &str) -> Result<TemplateStore, TemplateError> {
        let raw: HashMap<String, RonTemplate> = ron::from_str(input)?;
        let mut store = TemplateStore::new();
        for (name, t) in raw {
            store.register(
                Template::with_details(name, t.text, t.description, t.tags).with_level(t.level),
            );
        }
        Ok(store)
    }

    /// Load and merge every `.ron` file in `dir`, in file-name order.
    pub fn load_from_dir(dir: &Path) -> Result<TemplateStore, TemplateError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                paths.push(path);
            } else {
                tracing::debug!(path = %path.display(), "skipping non-RON entry");
            }
        }
        paths.sort();

        let mut store = TemplateStore::new();
        for path in paths {
            store.merge(Self::load_from_ron(&path)?);
        }
        Ok(store)
    }

    /// Serialize to the same RON shape `parse_ron` reads.
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        let raw: BTreeMap<&str, RonTemplate> = self
            .templates
            .iter()
            .map(|(name, t)| {
                (
                    name.as_str(),
                    RonTemplate {
                        text: t.text.clone(),
                        description: t.description.clone(),
                        tags: t.tags.clone(),
                        level: t.level,
                    },
                )
            })
            .collect();
        ron::ser::to_string_pretty(&raw, ron::ser::PrettyConfig::default())
    }

    /// Merge another set into this one. Templates from `other` replace
    /// templates in `self` with the same name.
    pub fn merge(&mut self, other: TemplateStore) {
        for (name, template) in other.templates {
            self.templates.insert(name, template);
        }
    }

    /// Check the set against the template names and context keys a policy
    /// relies on.
    pub fn lint(&self, required: &[&str], known_keys: &[&str]) -> LintReport {
        let mut report = LintReport::default();

        for name in required {
            if !self.contains(name) {
                report
                    .errors
                    .push(format!("Required template '{}' is missing", name));
            }
        }

        for name in self.names() {
            let template = &self.templates[name];
            if template.text.trim().is_empty() {
                report
                    .errors
                    .push(format!("Template '{}' has empty text", name));
                continue;
            }
            if template.placeholders.is_empty() {
                report
                    .warnings
                    .push(format!("Template '{}' declares no placeholders", name));
            }
            for key in &template.placeholders {
                if !known_keys.contains(&key.as_str()) {
                    report.warnings.push(format!(
                        "Template '{}' uses placeholder '{{{}}}' that no context provides",
                        name, key
                    ));
                }
            }
        }

        report
    }
}
