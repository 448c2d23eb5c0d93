use clap::Parser;

/// Aggregates a workplace survey spreadsheet into a psychosocial risk report.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The xlsx export of the survey responses. The first row must be the
    /// column headers; every later row is one respondent.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path) A previously generated report in JSON format. The report is
    /// re-aggregated from the rows it retains, without the source spreadsheet.
    /// Ignored when --input is given.
    #[clap(long, value_parser)]
    pub from_report: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the generated report in JSON format.
    /// Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference report in JSON format. If provided, riskdash checks that
    /// the generated report matches the reference (timestamps excluded).
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (default: the single worksheet) When the workbook has several worksheets,
    /// the name of the one holding the responses.
    #[clap(long, value_parser)]
    pub worksheet: Option<String>,

    /// The header of the column holding each respondent's department.
    #[clap(long, value_parser, default_value = "Department")]
    pub department_column: String,

    /// The header of the column holding each respondent's role.
    #[clap(long, value_parser, default_value = "Role")]
    pub role_column: String,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
