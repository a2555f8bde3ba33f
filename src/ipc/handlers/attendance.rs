use crate::attendance;
use crate::ipc::error::{attendance_err, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parse_usize_param(
    req: &Request,
    key: &str,
    fallback: usize,
) -> Result<usize, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(fallback),
        Some(v) if v.is_null() => Ok(fallback),
        Some(v) => {
            let Some(n) = v.as_u64() else {
                return Err(err(
                    &req.id,
                    "bad_params",
                    format!("{} must be a non-negative integer", key),
                    None,
                ));
            };
            Ok(n as usize)
        }
    }
}

/// The `classes` payload carries a `students` roster alongside `attendances`;
/// when present its length is the roll for the attendance rate. A wrong shape
/// is an error, absence just falls back to the distinct-student count.
fn parse_roll(req: &Request) -> Result<Option<usize>, serde_json::Value> {
    match req.params.get("students") {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(items) = v.as_array() else {
                return Err(err(
                    &req.id,
                    "malformed_input",
                    "students must be an array",
                    None,
                ));
            };
            Ok(Some(items.len()))
        }
    }
}

fn handle_class_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page = match parse_usize_param(req, "page", 1) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let page_size = match parse_usize_param(req, "pageSize", state.config.page_size) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let roll = match parse_roll(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let records = match attendance::parse_attendances(&req.params) {
        Ok(v) => v,
        Err(e) => return attendance_err(&req.id, e),
    };

    let matrix = attendance::build_matrix(&records);
    let summary = attendance::compute_summary(&records, roll);
    let window = match attendance::paginate(&matrix, page_size, page) {
        Ok(w) => w,
        Err(e) => return attendance_err(&req.id, e),
    };

    ok(
        &req.id,
        json!({
            "dates": matrix.dates,
            "rows": window.rows,
            "page": window.page,
            "pageSize": window.page_size,
            "totalPages": window.total_pages,
            "totalRows": window.total_rows,
            "summary": summary
        }),
    )
}

fn handle_summary(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let roll = match parse_roll(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let records = match attendance::parse_attendances(&req.params) {
        Ok(v) => v,
        Err(e) => return attendance_err(&req.id, e),
    };
    let summary = attendance::compute_summary(&records, roll);
    ok(&req.id, json!({ "summary": summary }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.classOpen" => Some(handle_class_open(state, req)),
        "attendance.summary" => Some(handle_summary(state, req)),
        _ => None,
    }
}
