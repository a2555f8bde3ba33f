use std::path::PathBuf;

use serde::Deserialize;

use crate::config::ViewConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The sidecar holds no data between requests; the only state is the view
/// config and where it was loaded from.
pub struct AppState {
    pub config_path: Option<PathBuf>,
    pub config: ViewConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: ViewConfig::default(),
        }
    }
}
