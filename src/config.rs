use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::attendance::DEFAULT_PAGE_SIZE;
use crate::grades::DEFAULT_PASS_THRESHOLD;

/// View defaults for the portal frontend. Two divergent script revisions
/// shipped two pass thresholds; the resolution is a named default here that a
/// workspace file or a per-request param can override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ViewConfig {
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<ViewConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let config: ViewConfig = serde_json::from_str(&text)
        .with_context(|| format!("parse config file {}", path.display()))?;
    if config.page_size == 0 {
        anyhow::bail!("pageSize must be >= 1 in {}", path.display());
    }
    Ok(config)
}
