use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "configPath": state.config_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            "passThreshold": state.config.pass_threshold,
            "pageSize": state.config.page_size
        }),
    )
}

fn handle_config_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match config::load_config(&path) {
        Ok(cfg) => {
            state.config = cfg;
            state.config_path = Some(path.clone());
            ok(
                &req.id,
                json!({
                    "configPath": path.to_string_lossy(),
                    "passThreshold": state.config.pass_threshold,
                    "pageSize": state.config.page_size
                }),
            )
        }
        Err(e) => err(&req.id, "config_load_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "config.load" => Some(handle_config_load(state, req)),
        _ => None,
    }
}
