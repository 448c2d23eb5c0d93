use log::{info, warn};

use survey_report::*;

use snafu::{prelude::*, Snafu};

use chrono::Utc;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;

pub mod io_xlsx;
pub mod report_io;

#[derive(Debug, Snafu)]
pub enum SurveyError {
    #[snafu(display("Error opening spreadsheet {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The spreadsheet contains no data rows"))]
    EmptyDataset {},
    #[snafu(display("Error reading {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error processing report JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Invalid report file: {message}"))]
    InvalidReport { message: String },
    #[snafu(display("Error aggregating the dataset"))]
    Aggregating { source: AggregationErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

/// Runs one full parse-and-aggregate pass, driven by the CLI arguments.
pub fn run_analysis(args: &Args) -> SurveyResult<()> {
    let schema = SurveySchema::new(&args.department_column, &args.role_column);

    let report = match (&args.input, &args.from_report) {
        (Some(input), _) => {
            let parsed = io_xlsx::read_survey_file(input, args.worksheet.as_deref())?;
            info!(
                "Parsed {} rows with {} columns from {}",
                parsed.rows.len(),
                parsed.headers.len(),
                input
            );
            let filename = io_xlsx::simplify_file_name(input);
            build_report(
                &parsed.rows,
                &schema,
                &STANDARD_CATEGORIES,
                &filename,
                Utc::now(),
            )
            .context(AggregatingSnafu {})?
        }
        (None, Some(path)) => {
            let stored = report_io::read_report(path)?;
            info!(
                "Re-aggregating {} retained rows from {}",
                stored.raw_rows.len(),
                path
            );
            recompute_report(&stored, &schema, &STANDARD_CATEGORIES, Utc::now())
                .context(AggregatingSnafu {})?
        }
        (None, None) => {
            whatever!("either --input or --from-report must be provided")
        }
    };

    info!(
        "Report: {} respondents, {} questions, overall mean {:.2} ({})",
        report.total_respondents,
        report.per_question.len(),
        report.overall_mean,
        RiskLevel::from_mean(report.overall_mean)
    );

    // The reference report, if provided for comparison.
    if let Some(reference_path) = &args.reference {
        check_reference(&report, reference_path)?;
    }

    report_io::write_report(&report, args.out.as_deref())
}

/// The report as pretty JSON with the generation timestamp blanked out, so
/// two runs over the same data compare equal.
pub fn normalized_report_json(report: &Report) -> SurveyResult<String> {
    let mut js = serde_json::to_value(report).context(ParsingJsonSnafu {})?;
    js["generatedAt"] = JSValue::Null;
    serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})
}

fn check_reference(report: &Report, reference_path: &str) -> SurveyResult<()> {
    let reference = report_io::read_report(reference_path)?;
    let expected = normalized_report_json(&reference)?;
    let actual = normalized_report_json(report)?;
    if expected != actual {
        warn!("Found differences with the reference report");
        print_diff(expected.as_str(), actual.as_str(), "\n");
        whatever!("Difference detected between the generated report and the reference report");
    }
    info!("Report matches the reference {}", reference_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use survey_report::{build_report, CellValue, RowRecord, SurveySchema, STANDARD_CATEGORIES};

    fn sample_rows() -> Vec<RowRecord> {
        vec![
            vec![
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
            .collect(),
            vec![
                (
                    "Department".to_string(),
                    CellValue::Text("Eng".to_string()),
                ),
                (
                    "Do you feel pressure to deliver?".to_string(),
                    CellValue::Number(2.0),
                ),
            ]
            .into_iter()
            .collect(),
        ]
    }

    #[test]
    fn normalized_json_ignores_the_timestamp() {
        let rows = sample_rows();
        let schema = SurveySchema::default();
        let t0 = Utc::now();
        let first =
            build_report(&rows, &schema, &STANDARD_CATEGORIES, "survey.xlsx", t0).unwrap();
        let second = build_report(
            &rows,
            &schema,
            &STANDARD_CATEGORIES,
            "survey.xlsx",
            t0 + Duration::seconds(90),
        )
        .unwrap();

        assert_ne!(first.generated_at, second.generated_at);
        assert_eq!(
            normalized_report_json(&first).unwrap(),
            normalized_report_json(&second).unwrap()
        );
    }

    #[test]
    fn missing_input_is_an_error() {
        let args = Args {
            input: None,
            from_report: None,
            out: None,
            reference: None,
            worksheet: None,
            department_column: "Department".to_string(),
            role_column: "Role".to_string(),
            verbose: false,
        };
        let res = run_analysis(&args);
        assert!(matches!(res, Err(SurveyError::Whatever { .. })));
    }
}
