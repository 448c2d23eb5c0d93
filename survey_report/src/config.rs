// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One spreadsheet cell, after ingestion.
///
/// Anything that is not text or a number (dates, formula errors, ...) is
/// degraded to `Empty`: the aggregation only ever looks at numeric answers
/// and at the text of the grouping columns.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    // Serialized as JSON null.
    Empty,
}

/// One respondent's full set of answers, keyed by column header.
///
/// The column order of the source spreadsheet is preserved: it is the
/// tie-breaking order for every ranking in the report. On the wire a record
/// is a plain JSON object, in column order.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RowRecord {
    columns: Vec<(String, CellValue)>,
}

impl RowRecord {
    pub fn new() -> RowRecord {
        RowRecord {
            columns: Vec::new(),
        }
    }

    pub fn push(&mut self, header: String, value: CellValue) {
        self.columns.push((header, value));
    }

    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v)
    }

    /// The headers of this record, in original column order.
    pub fn headers(&self) -> impl Iterator<Item = &String> {
        self.columns.iter().map(|(h, _)| h)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, CellValue)> for RowRecord {
    fn from_iter<T: IntoIterator<Item = (String, CellValue)>>(iter: T) -> RowRecord {
        RowRecord {
            columns: iter.into_iter().collect(),
        }
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (header, value) in self.columns.iter() {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<RowRecord, D::Error> {
        struct RowRecordVisitor;

        impl<'de> Visitor<'de> for RowRecordVisitor {
            type Value = RowRecord;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a map from column header to cell value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RowRecord, A::Error> {
                let mut columns: Vec<(String, CellValue)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((header, value)) = access.next_entry::<String, CellValue>()? {
                    columns.push((header, value));
                }
                Ok(RowRecord { columns })
            }
        }

        deserializer.deserialize_map(RowRecordVisitor)
    }
}

// ********* Schema configuration **********

/// The metadata columns an MS Forms-style export carries in addition to the
/// question columns. None of them holds an answer worth aggregating.
pub const DEFAULT_EXCLUDED_COLUMNS: [&str; 6] = [
    "ID",
    "Start time",
    "Completion time",
    "Email",
    "Name",
    "Last modified time",
];

/// Identifies which columns of the spreadsheet are respondent identity or
/// grouping metadata. Every other column is treated as a survey question.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveySchema {
    pub excluded_columns: Vec<String>,
    pub department_column: String,
    pub role_column: String,
}

impl SurveySchema {
    pub fn new(department_column: &str, role_column: &str) -> SurveySchema {
        SurveySchema {
            excluded_columns: DEFAULT_EXCLUDED_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            department_column: department_column.to_string(),
            role_column: role_column.to_string(),
        }
    }

    pub fn is_question(&self, header: &str) -> bool {
        header != self.department_column
            && header != self.role_column
            && !self.excluded_columns.iter().any(|c| c == header)
    }
}

impl Default for SurveySchema {
    fn default() -> SurveySchema {
        SurveySchema::new("Department", "Role")
    }
}

// ********* Category configuration **********

/// One thematic category of questions. A question belongs to a category when
/// its lowercased header contains at least one of the keywords. Membership is
/// not exclusive: a question may sit in several categories, or in none.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CategoryConfig {
    pub name: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
}

/// The six standard psychosocial categories. This is a closed, static
/// configuration: editing the keyword lists is a data change, not a code
/// change in the aggregation.
pub const STANDARD_CATEGORIES: [CategoryConfig; 6] = [
    CategoryConfig {
        name: "Demands",
        description: "Covers workload, intensity, pace, breaks and deadlines. Reflects how much \
                      the demands of the job may be weighing on the respondent.",
        keywords: &[
            "deadline",
            "intensely",
            "too much",
            "very fast",
            "pace",
            "breaks",
            "pressure",
        ],
    },
    CategoryConfig {
        name: "Relationships",
        description: "Covers the quality of interpersonal interactions at work, including \
                      friction, respect and the way colleagues behave towards each other.",
        keywords: &["friction", "harassed", "strained", "harsh", "respect", "behave"],
    },
    CategoryConfig {
        name: "Control",
        description: "Covers the autonomy, say in decisions and flexibility the respondent has \
                      over their own work.",
        keywords: &[
            "decide", "choice", "break", "freedom", "suggest", "say in", "flexible",
        ],
    },
    CategoryConfig {
        name: "Support",
        description: "Covers the backing offered by colleagues and managers, including trust, \
                      encouragement and availability of help.",
        keywords: &[
            "support",
            "trust",
            "rely",
            "help",
            "listen",
            "information",
            "encourage",
        ],
    },
    CategoryConfig {
        name: "Clarity",
        description: "Covers how well expectations, responsibilities and objectives are defined \
                      and understood by the respondent.",
        keywords: &[
            "clear",
            "direction",
            "objectives",
            "explain",
            "goals",
            "expected",
            "fits in",
            "tasks",
            "responsibilities",
        ],
    },
    CategoryConfig {
        name: "Change",
        description: "Covers how organisational change is communicated and carried out, and how \
                      much respondents are consulted in the process.",
        keywords: &["change", "consulted"],
    },
];

// ******** Output data structures *********

/// Ordinal risk label derived from a mean on the 1-5 answer scale.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    #[serde(rename = "Moderate-Low")]
    ModerateLow,
    Moderate,
    #[serde(rename = "Moderate-High")]
    ModerateHigh,
    High,
}

impl RiskLevel {
    /// Bands are inclusive on their upper bound: a mean of exactly 2.5 is
    /// still Moderate-Low. Downstream coloring and sorting depend on these
    /// exact thresholds.
    pub fn from_mean(mean: f64) -> RiskLevel {
        if mean <= 2.0 {
            RiskLevel::Low
        } else if mean <= 2.5 {
            RiskLevel::ModerateLow
        } else if mean <= 3.5 {
            RiskLevel::Moderate
        } else if mean <= 4.0 {
            RiskLevel::ModerateHigh
        } else {
            RiskLevel::High
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::ModerateLow => "Moderate-Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::ModerateHigh => "Moderate-High",
            RiskLevel::High => "High",
        };
        write!(f, "{}", label)
    }
}

/// Aggregate for one question, either globally or within a segment.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStat {
    pub question: String,
    #[serde(rename = "questionShort")]
    pub question_short: String,
    pub mean: f64,
    pub level: RiskLevel,
}

/// Aggregate for one thematic category.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: String,
    pub description: String,
    pub mean: f64,
    pub level: RiskLevel,
    #[serde(rename = "questionCount")]
    pub question_count: usize,
    pub questions: Vec<String>,
}

/// Respondent count for one distinct value of a grouping column.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SegmentCount {
    pub name: String,
    pub count: usize,
}

/// The worst-scoring questions within one department or role, computed over
/// that segment's respondents only.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SegmentBreakdown {
    #[serde(rename = "respondentCount")]
    pub respondent_count: usize,
    pub worst: Vec<QuestionStat>,
}

/// The terminal artifact of an aggregation run.
///
/// The full row set is retained so that a stored report can be re-aggregated
/// without the source spreadsheet; everything except `generated_at` is
/// reconstructible from `raw_rows` and the static category configuration.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "totalRespondents")]
    pub total_respondents: usize,
    #[serde(rename = "perQuestion")]
    pub per_question: Vec<QuestionStat>,
    #[serde(rename = "criticalQuestions")]
    pub critical_questions: Vec<QuestionStat>,
    pub categories: Vec<CategoryStat>,
    #[serde(rename = "departmentDistribution")]
    pub department_distribution: Vec<SegmentCount>,
    #[serde(rename = "roleDistribution")]
    pub role_distribution: Vec<SegmentCount>,
    #[serde(rename = "worstByDepartment")]
    pub worst_by_department: BTreeMap<String, SegmentBreakdown>,
    #[serde(rename = "worstByRole")]
    pub worst_by_role: BTreeMap<String, SegmentBreakdown>,
    #[serde(rename = "overallMean")]
    pub overall_mean: f64,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
    #[serde(rename = "sourceFilename")]
    pub source_filename: String,
    #[serde(rename = "rawRows")]
    pub raw_rows: Vec<RowRecord>,
}

/// Errors that prevent the aggregation from completing.
///
/// Sparse data (an unanswered question, an empty segment) is never an error:
/// it degrades to a zero mean or an empty ranking.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AggregationErrors {
    EmptyDataset,
}

impl Error for AggregationErrors {}

impl Display for AggregationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationErrors::EmptyDataset => write!(f, "the dataset contains no rows"),
        }
    }
}
