mod config;
pub mod manual;

use log::{debug, info};

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

pub use crate::config::*;

/// How many questions the critical rankings keep, globally and per segment.
pub const TOP_CRITICAL: usize = 5;

// Display labels are capped at this many characters, ellipsis included.
const SHORT_LABEL_MAX: usize = 60;

/// The ordered question columns: every header that the schema does not mark
/// as identity or grouping metadata.
pub fn question_headers(headers: &[String], schema: &SurveySchema) -> Vec<String> {
    headers
        .iter()
        .filter(|h| schema.is_question(h))
        .cloned()
        .collect()
}

/// The questions matched to one category.
#[derive(PartialEq, Debug, Clone)]
pub struct CategoryAssignment<'a> {
    pub config: &'a CategoryConfig,
    pub questions: Vec<String>,
}

/// Partitions the question headers into the given categories by substring
/// keyword match. A question matching several categories is assigned to each
/// of them; a question matching none is silently left out.
pub fn classify_questions<'a>(
    questions: &[String],
    categories: &'a [CategoryConfig],
) -> Vec<CategoryAssignment<'a>> {
    categories
        .iter()
        .map(|config| {
            let matched: Vec<String> = questions
                .iter()
                .filter(|q| {
                    let lowered = q.to_lowercase();
                    config
                        .keywords
                        .iter()
                        .any(|k| lowered.contains(&k.to_lowercase()))
                })
                .cloned()
                .collect();
            debug!(
                "classify_questions: {}: {} questions",
                config.name,
                matched.len()
            );
            CategoryAssignment {
                config,
                questions: matched,
            }
        })
        .collect()
}

/// The single numeric coercion point for every aggregate computation.
///
/// A number passes through. A fully numeric string parses as-is. Otherwise a
/// Likert-style label such as `"4 - Often"` yields its embedded integer (the
/// leading one, or failing that the first one anywhere). Everything else is
/// discarded.
pub fn coerce_numeric(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(x) => Some(*x),
        CellValue::Text(s) => coerce_text(s),
        CellValue::Empty => None,
    }
}

fn coerce_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if let Ok(x) = trimmed.parse::<f64>() {
        // "inf" and "nan" parse but cannot enter a mean.
        if x.is_finite() {
            return Some(x);
        }
    }
    first_integer(trimmed).map(|x| x as f64)
}

fn first_integer(s: &str) -> Option<u64> {
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse::<u64>().ok()
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        // An unanswered question keeps the downstream math defined.
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn collect_answers<'a, I>(rows: I, question: &str) -> Vec<f64>
where
    I: IntoIterator<Item = &'a RowRecord>,
{
    rows.into_iter()
        .filter_map(|r| r.get(question).and_then(coerce_numeric))
        .collect()
}

/// Mean over the coercible answers to one question; 0 when nobody answered.
pub fn question_mean(rows: &[RowRecord], question: &str) -> f64 {
    mean_of(&collect_answers(rows.iter(), question))
}

/// Truncated display label for a question header.
pub fn short_label(header: &str) -> String {
    if header.chars().count() > SHORT_LABEL_MAX {
        let cut: String = header.chars().take(SHORT_LABEL_MAX - 3).collect();
        format!("{}...", cut)
    } else {
        header.to_string()
    }
}

fn question_stat(question: &str, mean: f64) -> QuestionStat {
    QuestionStat {
        question: question.to_string(),
        question_short: short_label(question),
        mean,
        level: RiskLevel::from_mean(mean),
    }
}

fn sort_by_mean_desc(stats: &mut [QuestionStat]) {
    // The sort is stable: tied means keep the original column order.
    stats.sort_by(|a, b| b.mean.partial_cmp(&a.mean).unwrap_or(Ordering::Equal));
}

/// Per-question aggregates over all respondents, sorted worst first.
pub fn per_question_stats(rows: &[RowRecord], questions: &[String]) -> Vec<QuestionStat> {
    let mut stats: Vec<QuestionStat> = questions
        .iter()
        .map(|q| question_stat(q, question_mean(rows, q)))
        .collect();
    sort_by_mean_desc(&mut stats);
    stats
}

/// Per-category aggregates.
///
/// The category mean pools the individual answers of every member question.
/// It is not a mean of the question means: questions with more answers weigh
/// more, which matters for categories with uneven response counts.
pub fn category_stats(rows: &[RowRecord], assignments: &[CategoryAssignment]) -> Vec<CategoryStat> {
    assignments
        .iter()
        .map(|assignment| {
            let mut pooled: Vec<f64> = Vec::new();
            for q in assignment.questions.iter() {
                pooled.extend(collect_answers(rows.iter(), q));
            }
            let mean = mean_of(&pooled);
            CategoryStat {
                category: assignment.config.name.to_string(),
                description: assignment.config.description.to_string(),
                mean,
                level: RiskLevel::from_mean(mean),
                question_count: assignment.questions.len(),
                questions: assignment.questions.clone(),
            }
        })
        .collect()
}

// A grouping key for segment columns. Blank and missing cells do not form a
// segment; numeric department codes are kept as their printed form.
fn cell_key(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        CellValue::Number(x) => Some(x.to_string()),
        _ => None,
    }
}

fn segment_values(rows: &[RowRecord], column: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for row in rows.iter() {
        if let Some(key) = row.get(column).and_then(cell_key) {
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
    }
    seen
}

/// Respondent counts per distinct value of a grouping column, in order of
/// first appearance.
pub fn distribution(rows: &[RowRecord], column: &str) -> Vec<SegmentCount> {
    let mut counts: Vec<SegmentCount> = Vec::new();
    for row in rows.iter() {
        if let Some(key) = row.get(column).and_then(cell_key) {
            match counts.iter_mut().find(|c| c.name == key) {
                Some(c) => c.count += 1,
                None => counts.push(SegmentCount {
                    name: key,
                    count: 1,
                }),
            }
        }
    }
    counts
}

/// For each distinct value of the grouping column, the worst-scoring
/// questions among that segment's respondents only.
pub fn worst_by_segment(
    rows: &[RowRecord],
    column: &str,
    questions: &[String],
    top: usize,
) -> BTreeMap<String, SegmentBreakdown> {
    let mut res: BTreeMap<String, SegmentBreakdown> = BTreeMap::new();
    for name in segment_values(rows, column) {
        let members: Vec<&RowRecord> = rows
            .iter()
            .filter(|r| r.get(column).and_then(cell_key).as_deref() == Some(name.as_str()))
            .collect();
        let mut stats: Vec<QuestionStat> = Vec::new();
        for q in questions.iter() {
            let values = collect_answers(members.iter().copied(), q);
            // Questions nobody in the segment answered stay out of the ranking.
            if !values.is_empty() {
                stats.push(question_stat(q, mean_of(&values)));
            }
        }
        sort_by_mean_desc(&mut stats);
        stats.truncate(top);
        debug!(
            "worst_by_segment: {} {:?}: {} respondents, {} ranked questions",
            column,
            name,
            members.len(),
            stats.len()
        );
        res.insert(
            name,
            SegmentBreakdown {
                respondent_count: members.len(),
                worst: stats,
            },
        );
    }
    res
}

/// Runs the full aggregation over one set of parsed rows.
///
/// Deterministic given its inputs: the timestamp is supplied by the caller
/// and is the only field that varies between two runs on the same data.
pub fn build_report(
    rows: &[RowRecord],
    schema: &SurveySchema,
    categories: &[CategoryConfig],
    source_filename: &str,
    generated_at: DateTime<Utc>,
) -> Result<Report, AggregationErrors> {
    if rows.is_empty() {
        return Err(AggregationErrors::EmptyDataset);
    }

    // Column order comes from the first record, which carries every header.
    let headers: Vec<String> = rows[0].headers().cloned().collect();
    let questions = question_headers(&headers, schema);
    info!(
        "build_report: {} respondents, {} question columns",
        rows.len(),
        questions.len()
    );

    let per_question = per_question_stats(rows, &questions);
    let critical_questions: Vec<QuestionStat> =
        per_question.iter().take(TOP_CRITICAL).cloned().collect();

    let assignments = classify_questions(&questions, categories);
    let category_results = category_stats(rows, &assignments);

    // Mean of the question means, unlike the pooled category rule.
    let question_means: Vec<f64> = per_question.iter().map(|s| s.mean).collect();
    let overall_mean = mean_of(&question_means);

    Ok(Report {
        total_respondents: rows.len(),
        per_question,
        critical_questions,
        categories: category_results,
        department_distribution: distribution(rows, &schema.department_column),
        role_distribution: distribution(rows, &schema.role_column),
        worst_by_department: worst_by_segment(
            rows,
            &schema.department_column,
            &questions,
            TOP_CRITICAL,
        ),
        worst_by_role: worst_by_segment(rows, &schema.role_column, &questions, TOP_CRITICAL),
        overall_mean,
        generated_at,
        source_filename: source_filename.to_string(),
        raw_rows: rows.to_vec(),
    })
}

/// Re-derives a fresh report from the rows retained inside a stored report,
/// without touching the source spreadsheet.
pub fn recompute_report(
    report: &Report,
    schema: &SurveySchema,
    categories: &[CategoryConfig],
    generated_at: DateTime<Utc>,
) -> Result<Report, AggregationErrors> {
    build_report(
        &report.raw_rows,
        schema,
        categories,
        &report.source_filename,
        generated_at,
    )
}
