use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AttendanceError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Wire values: 1 present, 0 absent. Anything else is malformed, not coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Absent,
    Present,
}

impl AttendanceStatus {
    fn from_wire(v: i64) -> Option<Self> {
        match v {
            0 => Some(AttendanceStatus::Absent),
            1 => Some(AttendanceStatus::Present),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub student_name: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub student_id: String,
    pub student_name: String,
    /// One cell per matrix date. `None` means no record was fetched for that
    /// (student, date) pair; it is not the same thing as an explicit absence
    /// and serializes as null, never as 0.
    pub cells: Vec<Option<AttendanceStatus>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMatrix {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub total: usize,
    pub enrolled: usize,
    /// Rounded percent of present records against the roll, capped at 100.
    /// Undefined (null on the wire) when nobody is enrolled.
    pub rate: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub rows: Vec<MatrixRow>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

fn elem_str(
    elem: &serde_json::Value,
    index: usize,
    key: &str,
) -> Result<String, AttendanceError> {
    elem.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            AttendanceError::new(
                "malformed_input",
                format!("attendances[{}] missing string field {}", index, key),
            )
            .with_details(serde_json::json!({ "index": index, "field": key }))
        })
}

/// Validates the `attendances` collection: dates must be ISO `YYYY-MM-DD`,
/// status must be the wire 0/1. One bad element fails the whole parse.
pub fn parse_attendances(
    params: &serde_json::Value,
) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    let Some(items) = params.get("attendances").and_then(|v| v.as_array()) else {
        return Err(AttendanceError::new(
            "malformed_input",
            "missing attendances collection",
        ));
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, elem) in items.iter().enumerate() {
        let raw_date = elem_str(elem, index, "date")?;
        let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|_| {
            AttendanceError::new(
                "malformed_input",
                format!("attendances[{}] date must be YYYY-MM-DD, got {:?}", index, raw_date),
            )
            .with_details(serde_json::json!({ "index": index, "field": "date" }))
        })?;
        let raw_status = elem
            .get("status")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                AttendanceError::new(
                    "malformed_input",
                    format!("attendances[{}] missing numeric field status", index),
                )
                .with_details(serde_json::json!({ "index": index, "field": "status" }))
            })?;
        let status = AttendanceStatus::from_wire(raw_status).ok_or_else(|| {
            AttendanceError::new(
                "malformed_input",
                format!("attendances[{}] status must be 0 or 1, got {}", index, raw_status),
            )
            .with_details(serde_json::json!({ "index": index, "field": "status" }))
        })?;
        out.push(AttendanceRecord {
            student_id: elem_str(elem, index, "student_id")?,
            student_name: elem_str(elem, index, "student_name")?,
            date,
            status,
        });
    }
    Ok(out)
}

/// Student x date status grid. Dates are the distinct calendar values in
/// ascending order; students keep first-seen input order. When the payload
/// carries duplicate (student, date) pairs the first record wins.
pub fn build_matrix(records: &[AttendanceRecord]) -> AttendanceMatrix {
    let dates: Vec<NaiveDate> = records
        .iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut by_pair: HashMap<(&str, NaiveDate), AttendanceStatus> = HashMap::new();
    for r in records {
        by_pair
            .entry((r.student_id.as_str(), r.date))
            .or_insert(r.status);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut rows: Vec<MatrixRow> = Vec::new();
    for r in records {
        if !seen.insert(r.student_id.as_str()) {
            continue;
        }
        let cells = dates
            .iter()
            .map(|d| by_pair.get(&(r.student_id.as_str(), *d)).copied())
            .collect();
        rows.push(MatrixRow {
            student_id: r.student_id.clone(),
            student_name: r.student_name.clone(),
            cells,
        });
    }

    AttendanceMatrix { dates, rows }
}

/// Present/absent counts over all records, rate against the roll. The roll is
/// the caller-supplied student list length when available, otherwise the
/// distinct-student count in the records themselves. Zero enrolled means the
/// rate is undefined, not a division artifact.
pub fn compute_summary(records: &[AttendanceRecord], roll: Option<usize>) -> AttendanceSummary {
    let present = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count();
    let absent = records.len() - present;
    let enrolled = roll.unwrap_or_else(|| {
        records
            .iter()
            .map(|r| r.student_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    });

    let rate = if enrolled == 0 {
        None
    } else {
        let pct = (present as f64 / enrolled as f64 * 100.0).round() as i64;
        Some(pct.min(100))
    };

    AttendanceSummary {
        present,
        absent,
        total: records.len(),
        enrolled,
        rate,
    }
}

/// Row window `[(page-1)*size, min(page*size, len))`. Pages are 1-indexed and
/// a cursor outside `[1, totalPages]` is the caller's error, not clamped. An
/// empty matrix has exactly one empty page so page 1 is always addressable.
pub fn paginate(
    matrix: &AttendanceMatrix,
    page_size: usize,
    page: usize,
) -> Result<PageWindow, AttendanceError> {
    if page_size == 0 {
        return Err(AttendanceError::new("bad_params", "pageSize must be >= 1"));
    }
    let total_rows = matrix.rows.len();
    let total_pages = if total_rows == 0 {
        1
    } else {
        total_rows.div_ceil(page_size)
    };
    if page == 0 || page > total_pages {
        return Err(AttendanceError::new(
            "page_out_of_range",
            format!("page {} outside [1, {}]", page, total_pages),
        )
        .with_details(serde_json::json!({ "page": page, "totalPages": total_pages })));
    }

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total_rows);
    Ok(PageWindow {
        rows: matrix.rows[start..end].to_vec(),
        page,
        page_size,
        total_pages,
        total_rows,
    })
}
