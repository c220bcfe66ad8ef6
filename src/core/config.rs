/// Engine configuration, loadable from RON.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::extract::{default_catalog, ResidueSignature};
use crate::core::template::TemplateError;

fn default_max_insights() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory of `.ron` template sets merged over the built-in set.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// How many insight sentences feed the next prompt.
    #[serde(default = "default_max_insights")]
    pub max_insights: usize,
    #[serde(default = "default_catalog")]
    pub residue_catalog: Vec<ResidueSignature>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_dir: None,
            max_insights: default_max_insights(),
            residue_catalog: default_catalog(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, TemplateError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, TemplateError> {
        Ok(ron::from_str(input)?)
    }
}
