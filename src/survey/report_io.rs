// Reading and writing stored reports.

use std::fs;

use log::{debug, info};
use snafu::prelude::*;

use survey_report::Report;

use crate::survey::*;

/// Writes the report as pretty JSON to the given path, or to the standard
/// output when no path (or `stdout`) is given.
pub fn write_report(report: &Report, out: Option<&str>) -> SurveyResult<()> {
    let pretty = serde_json::to_string_pretty(report).context(ParsingJsonSnafu {})?;
    match out {
        Some(path) if path != "stdout" => {
            fs::write(path, pretty.as_bytes()).context(WritingJsonSnafu { path })?;
            info!("Report written to {}", path);
        }
        _ => {
            println!("{}", pretty);
        }
    }
    Ok(())
}

/// Loads a stored report and checks that it is structurally sound enough to
/// re-aggregate or compare against.
pub fn read_report(path: &str) -> SurveyResult<Report> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_report: {} bytes from {}", contents.len(), path);
    let report: Report = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    validate_report(&report)?;
    Ok(report)
}

fn validate_report(report: &Report) -> SurveyResult<()> {
    ensure!(
        !report.raw_rows.is_empty(),
        InvalidReportSnafu {
            message: "the report retains no rows"
        }
    );
    ensure!(
        report.total_respondents == report.raw_rows.len(),
        InvalidReportSnafu {
            message: format!(
                "respondent count {} does not match the {} retained rows",
                report.total_respondents,
                report.raw_rows.len()
            )
        }
    );
    ensure!(
        !report.per_question.is_empty(),
        InvalidReportSnafu {
            message: "the report has no per-question aggregates"
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use survey_report::{build_report, CellValue, RowRecord, SurveySchema, STANDARD_CATEGORIES};

    fn sample_report() -> Report {
        let row: RowRecord = vec![
            (
                "Department".to_string(),
                CellValue::Text("Ops".to_string()),
            ),
            (
                "Do you feel pressure to deliver?".to_string(),
                CellValue::Number(4.0),
            ),
        ]
        .into_iter()
        .collect();
        build_report(
            &[row],
            &SurveySchema::default(),
            &STANDARD_CATEGORIES,
            "survey.xlsx",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn a_generated_report_validates() {
        assert!(validate_report(&sample_report()).is_ok());
    }

    #[test]
    fn a_report_without_rows_is_invalid() {
        let mut report = sample_report();
        report.raw_rows.clear();
        let res = validate_report(&report);
        assert!(matches!(res, Err(SurveyError::InvalidReport { .. })));
    }

    #[test]
    fn a_report_with_a_wrong_count_is_invalid() {
        let mut report = sample_report();
        report.total_respondents = 7;
        let res = validate_report(&report);
        assert!(matches!(res, Err(SurveyError::InvalidReport { .. })));
    }
}
