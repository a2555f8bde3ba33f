use crate::grades;
use crate::ipc::error::{err, grade_err, ok};
use crate::ipc::types::{AppState, Request};

fn parse_threshold(req: &Request, fallback: f64) -> Result<f64, serde_json::Value> {
    match req.params.get("passThreshold") {
        None => Ok(fallback),
        Some(v) if v.is_null() => Ok(fallback),
        Some(v) => {
            let Some(t) = v.as_f64().filter(|t| t.is_finite()) else {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "passThreshold must be a finite number",
                    None,
                ));
            };
            Ok(t)
        }
    }
}

fn handle_course_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let threshold = match parse_threshold(req, state.config.pass_threshold) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let records = match grades::parse_gradebooks(&req.params) {
        Ok(v) => v,
        Err(e) => return grade_err(&req.id, e),
    };

    let model = grades::course_summary(records, threshold);
    match serde_json::to_value(&model) {
        Ok(result) => ok(&req.id, result),
        Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.courseSummary" => Some(handle_course_summary(state, req)),
        _ => None,
    }
}
