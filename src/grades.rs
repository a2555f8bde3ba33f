use serde::Serialize;
use std::collections::BTreeMap;

/// Later frontend revision used 60, the earlier one 50. 60 is authoritative;
/// callers can still override it per request or via the workspace config.
pub const DEFAULT_PASS_THRESHOLD: f64 = 60.0;

#[derive(Debug, Clone, Serialize)]
pub struct GradeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GradeError {
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

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub student_id: String,
    pub grade_desc: String,
    pub grade: f64,
    pub out_of: f64,
    pub academic_year: String,
    pub term: String,
    /// Derived by `compute_percentages`; never read from input.
    pub percentage: Option<f64>,
}

/// A record dropped by the skip-and-report pass, with enough context for the
/// caller to tell the user which row of the fetched payload is bad.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub index: usize,
    pub student_id: String,
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentageOutcome {
    pub records: Vec<GradeRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Academic year -> term -> records, lexically ordered on both key levels.
/// Year and term tokens are grouping keys, not calendar values: "21" and
/// "2021" are distinct buckets and sort as strings.
pub type GradeGrouping = BTreeMap<String, BTreeMap<String, Vec<GradeRecord>>>;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TermStatistics {
    pub desc_counts: BTreeMap<String, usize>,
    pub above_count: usize,
    pub below_count: usize,
    /// Mean of the percentage values at or above the threshold. `None` when
    /// the bucket is empty; never NaN.
    pub above_avg: Option<f64>,
    pub below_avg: Option<f64>,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermModel {
    pub term: String,
    pub records: Vec<GradeRecord>,
    pub stats: TermStatistics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearModel {
    pub academic_year: String,
    pub terms: Vec<TermModel>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummaryModel {
    pub record_count: usize,
    pub desc_counts: BTreeMap<String, usize>,
    pub years: Vec<YearModel>,
    pub rejected: Vec<RejectedRecord>,
    pub threshold: f64,
}

fn elem_str(
    elem: &serde_json::Value,
    index: usize,
    key: &str,
) -> Result<String, GradeError> {
    elem.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            GradeError::new(
                "malformed_input",
                format!("gradebooks[{}] missing string field {}", index, key),
            )
            .with_details(serde_json::json!({ "index": index, "field": key }))
        })
}

fn elem_f64(elem: &serde_json::Value, index: usize, key: &str) -> Result<f64, GradeError> {
    elem.get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| {
            GradeError::new(
                "malformed_input",
                format!("gradebooks[{}] missing numeric field {}", index, key),
            )
            .with_details(serde_json::json!({ "index": index, "field": key }))
        })
}

/// Validates the `gradebooks` collection shape before any derivation runs.
/// All-or-nothing: one bad element fails the whole parse, naming the element
/// and field.
pub fn parse_gradebooks(params: &serde_json::Value) -> Result<Vec<GradeRecord>, GradeError> {
    let Some(items) = params.get("gradebooks").and_then(|v| v.as_array()) else {
        return Err(GradeError::new(
            "malformed_input",
            "missing gradebooks collection",
        ));
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, elem) in items.iter().enumerate() {
        out.push(GradeRecord {
            student_id: elem_str(elem, index, "student_id")?,
            grade_desc: elem_str(elem, index, "grade_desc")?,
            grade: elem_f64(elem, index, "grade")?,
            out_of: elem_f64(elem, index, "out_of")?,
            academic_year: elem_str(elem, index, "academic_year")?,
            term: elem_str(elem, index, "term")?,
            percentage: None,
        });
    }
    Ok(out)
}

/// Derives `percentage = grade / out_of * 100` in input order. Records with
/// `out_of <= 0` or a non-finite numerator would divide into garbage, so they
/// are skipped and reported instead of propagated.
pub fn compute_percentages(records: Vec<GradeRecord>) -> PercentageOutcome {
    let mut out = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for (index, mut r) in records.into_iter().enumerate() {
        if !(r.out_of > 0.0) || !r.out_of.is_finite() {
            rejected.push(RejectedRecord {
                index,
                student_id: r.student_id.clone(),
                code: "invalid_record".to_string(),
                reason: format!("out_of must be > 0, got {}", r.out_of),
            });
            continue;
        }
        if !r.grade.is_finite() {
            rejected.push(RejectedRecord {
                index,
                student_id: r.student_id.clone(),
                code: "invalid_record".to_string(),
                reason: "grade is not a finite number".to_string(),
            });
            continue;
        }
        r.percentage = Some(r.grade / r.out_of * 100.0);
        out.push(r);
    }

    PercentageOutcome {
        records: out,
        rejected,
    }
}

/// Stable partition by academic-year token. BTreeMap gives the lexical key
/// order; pushing in input order keeps each bucket stable.
pub fn group_by_academic_year(records: Vec<GradeRecord>) -> BTreeMap<String, Vec<GradeRecord>> {
    let mut groups: BTreeMap<String, Vec<GradeRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.academic_year.clone()).or_default().push(r);
    }
    groups
}

pub fn group_by_term(year_groups: BTreeMap<String, Vec<GradeRecord>>) -> GradeGrouping {
    let mut grouping: GradeGrouping = BTreeMap::new();
    for (year, records) in year_groups {
        let terms = grouping.entry(year).or_default();
        for r in records {
            terms.entry(r.term.clone()).or_default().push(r);
        }
    }
    grouping
}

pub fn group_by_description(records: &[GradeRecord]) -> BTreeMap<String, Vec<GradeRecord>> {
    let mut groups: BTreeMap<String, Vec<GradeRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.grade_desc.clone()).or_default().push(r.clone());
    }
    groups
}

/// Pass/fail split plus per-description counts for one term's records.
/// Averages are over the derived percentages; records that never went through
/// `compute_percentages` count as below-threshold with no average
/// contribution. An empty bucket reports count 0 and an undefined average.
pub fn term_statistics(records: &[GradeRecord], threshold: f64) -> TermStatistics {
    let mut desc_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut above: Vec<f64> = Vec::new();
    let mut below: Vec<f64> = Vec::new();
    let mut underived_below = 0;

    for r in records {
        *desc_counts.entry(r.grade_desc.clone()).or_insert(0) += 1;
        match r.percentage {
            Some(p) if p >= threshold => above.push(p),
            Some(p) => below.push(p),
            None => underived_below += 1,
        }
    }

    let mean = |vals: &[f64]| -> Option<f64> {
        if vals.is_empty() {
            None
        } else {
            Some(vals.iter().sum::<f64>() / vals.len() as f64)
        }
    };

    TermStatistics {
        desc_counts,
        above_count: above.len(),
        below_count: below.len() + underived_below,
        above_avg: mean(&above),
        below_avg: mean(&below),
        threshold,
    }
}

/// Full course view model: percentages derived, records grouped
/// year -> term -> description, stats per term. Accepted records land in
/// exactly one (year, term) bucket; rejected ones are reported alongside.
pub fn course_summary(records: Vec<GradeRecord>, threshold: f64) -> CourseSummaryModel {
    let record_count = records.len();
    let outcome = compute_percentages(records);
    let desc_counts: BTreeMap<String, usize> = group_by_description(&outcome.records)
        .into_iter()
        .map(|(desc, group)| (desc, group.len()))
        .collect();

    let grouping = group_by_term(group_by_academic_year(outcome.records));
    let years: Vec<YearModel> = grouping
        .into_iter()
        .map(|(academic_year, terms)| YearModel {
            academic_year,
            terms: terms
                .into_iter()
                .map(|(term, records)| {
                    let stats = term_statistics(&records, threshold);
                    TermModel {
                        term,
                        records,
                        stats,
                    }
                })
                .collect(),
        })
        .collect();

    CourseSummaryModel {
        record_count,
        desc_counts,
        years,
        rejected: outcome.rejected,
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(student: &str, desc: &str, grade: f64, out_of: f64, year: &str, term: &str) -> GradeRecord {
        GradeRecord {
            student_id: student.to_string(),
            grade_desc: desc.to_string(),
            grade,
            out_of,
            academic_year: year.to_string(),
            term: term.to_string(),
            percentage: None,
        }
    }

    #[test]
    fn percentages_skip_and_report_bad_out_of() {
        let records = vec![
            rec("s1", "Exam", 25.0, 50.0, "2024", "term 1"),
            rec("s2", "Exam", 10.0, 0.0, "2024", "term 1"),
        ];
        let outcome = compute_percentages(records);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].percentage, Some(50.0));
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].index, 1);
        assert_eq!(outcome.rejected[0].student_id, "s2");
        assert_eq!(outcome.rejected[0].code, "invalid_record");
    }

    #[test]
    fn percentages_preserve_input_order() {
        let records = vec![
            rec("s3", "Quiz", 9.0, 10.0, "2024", "term 1"),
            rec("s1", "Quiz", 7.0, 10.0, "2024", "term 1"),
            rec("s2", "Quiz", 5.0, 10.0, "2024", "term 1"),
        ];
        let outcome = compute_percentages(records);
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["s3", "s1", "s2"]);
    }

    #[test]
    fn year_tokens_sort_lexically_and_never_merge() {
        let records = vec![
            rec("a", "Exam", 5.0, 10.0, "2021", "term 1"),
            rec("b", "Exam", 5.0, 10.0, "2020", "term 1"),
            rec("c", "Exam", 5.0, 10.0, "2022", "term 1"),
            rec("d", "Exam", 5.0, 10.0, "21", "term 1"),
        ];
        let groups = group_by_academic_year(records);
        let keys: Vec<&str> = groups.keys().map(|k| k.as_str()).collect();
        // Lexical order: "2020" < "2021" < "2022" < "21".
        assert_eq!(keys, vec!["2020", "2021", "2022", "21"]);
        assert_eq!(groups["21"].len(), 1);
        assert_eq!(groups["2021"].len(), 1);
    }

    #[test]
    fn grouping_is_a_partition() {
        let records = vec![
            rec("a", "Exam", 5.0, 10.0, "2021", "term 2"),
            rec("b", "Quiz", 5.0, 10.0, "2021", "term 1"),
            rec("c", "Exam", 5.0, 10.0, "2020", "term 1"),
            rec("d", "Quiz", 5.0, 10.0, "2020", "term 2"),
            rec("e", "Exam", 5.0, 10.0, "2020", "term 1"),
        ];
        let total = records.len();
        let grouping = group_by_term(group_by_academic_year(records));
        let counted: usize = grouping
            .values()
            .flat_map(|terms| terms.values())
            .map(|bucket| bucket.len())
            .sum();
        assert_eq!(counted, total);

        // Within a bucket, relative input order survives.
        let t1 = &grouping["2020"]["term 1"];
        let ids: Vec<&str> = t1.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "e"]);
    }

    #[test]
    fn term_statistics_threshold_boundary_and_averages() {
        let records = vec![
            rec("a", "Exam", 60.0, 100.0, "2024", "term 1"),
            rec("b", "Exam", 59.0, 100.0, "2024", "term 1"),
            rec("c", "Quiz", 90.0, 100.0, "2024", "term 1"),
        ];
        let outcome = compute_percentages(records);
        let stats = term_statistics(&outcome.records, DEFAULT_PASS_THRESHOLD);
        // 60.0 sits exactly on the threshold and counts as above.
        assert_eq!(stats.above_count, 2);
        assert_eq!(stats.below_count, 1);
        assert_eq!(stats.above_avg, Some(75.0));
        assert_eq!(stats.below_avg, Some(59.0));
        assert_eq!(stats.desc_counts["Exam"], 2);
        assert_eq!(stats.desc_counts["Quiz"], 1);
    }

    #[test]
    fn underived_records_count_below_without_skewing_the_average() {
        let mut records = compute_percentages(vec![rec("a", "Exam", 40.0, 100.0, "2024", "t1")]).records;
        // A record that skipped the percentage pass counts against the pass
        // rate but carries no value the average could use.
        records.push(rec("b", "Exam", 90.0, 100.0, "2024", "t1"));
        let stats = term_statistics(&records, 60.0);
        assert_eq!(stats.above_count, 0);
        assert_eq!(stats.below_count, 2);
        assert_eq!(stats.below_avg, Some(40.0));
    }

    #[test]
    fn empty_buckets_report_undefined_average_not_nan() {
        let stats = term_statistics(&[], 60.0);
        assert_eq!(stats.above_count, 0);
        assert_eq!(stats.below_count, 0);
        assert_eq!(stats.above_avg, None);
        assert_eq!(stats.below_avg, None);

        let records = compute_percentages(vec![rec("a", "Exam", 90.0, 100.0, "2024", "t1")]);
        let stats = term_statistics(&records.records, 60.0);
        assert_eq!(stats.below_count, 0);
        assert_eq!(stats.below_avg, None);
        assert_eq!(stats.above_avg, Some(90.0));
    }

    #[test]
    fn course_summary_partitions_accepted_records() {
        let records = vec![
            rec("a", "Exam", 50.0, 100.0, "2021", "term 1"),
            rec("b", "Quiz", 8.0, 10.0, "2020", "term 2"),
            rec("c", "Exam", 10.0, 0.0, "2020", "term 1"),
        ];
        let model = course_summary(records, 60.0);
        assert_eq!(model.record_count, 3);
        assert_eq!(model.rejected.len(), 1);
        let grouped: usize = model
            .years
            .iter()
            .flat_map(|y| y.terms.iter())
            .map(|t| t.records.len())
            .sum();
        assert_eq!(grouped, 2);
        let year_keys: Vec<&str> = model.years.iter().map(|y| y.academic_year.as_str()).collect();
        assert_eq!(year_keys, vec!["2020", "2021"]);
    }

    #[test]
    fn parse_gradebooks_names_missing_field() {
        let params = json!({
            "gradebooks": [
                {
                    "student_id": "s1",
                    "grade_desc": "Exam",
                    "grade": 40,
                    "out_of": 50,
                    "academic_year": "2024",
                    "term": "term 1"
                },
                {
                    "student_id": "s2",
                    "grade_desc": "Exam",
                    "grade": 40,
                    "academic_year": "2024",
                    "term": "term 1"
                }
            ]
        });
        let err = parse_gradebooks(&params).expect_err("second element lacks out_of");
        assert_eq!(err.code, "malformed_input");
        assert!(err.message.contains("out_of"));
        assert!(err.message.contains("[1]"));
    }

    #[test]
    fn parse_gradebooks_requires_collection() {
        let err = parse_gradebooks(&json!({})).expect_err("no gradebooks key");
        assert_eq!(err.code, "malformed_input");
    }
}
