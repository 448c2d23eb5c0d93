/*!

# Using the aggregation engine

The engine is a pure function from parsed survey rows to a [`crate::Report`].
It knows nothing about spreadsheets, files or servers: the `riskdash` binary
owns the xlsx ingestion and the JSON persistence, and hands this crate a
sequence of [`crate::RowRecord`] values.

A minimal run looks like this:

```
use survey_report::{build_report, CellValue, RowRecord, SurveySchema, STANDARD_CATEGORIES};
use chrono::Utc;

let mut row = RowRecord::new();
row.push("Department".to_string(), CellValue::Text("Ops".to_string()));
row.push(
    "Do you feel pressure to meet deadlines?".to_string(),
    CellValue::Number(4.0),
);

let schema = SurveySchema::default();
let report = build_report(&[row], &schema, &STANDARD_CATEGORIES, "survey.xlsx", Utc::now())?;

assert_eq!(report.total_respondents, 1);
assert_eq!(report.per_question.len(), 1);
# Ok::<(), survey_report::AggregationErrors>(())
```

The schema decides which columns are questions: everything that is not in the
exclusion list and is not the department or role column gets aggregated. The
six [`crate::STANDARD_CATEGORIES`] then pick up questions by keyword; a
question may land in several categories or in none, both on purpose.

Two aggregation rules look similar but are deliberately different:

- a category mean pools every individual answer of its member questions;
- the overall mean averages the per-question means.

Both behaviors are preserved from the system this engine reports for, so do
not "unify" them without checking the stored reports that depend on the
current numbers.

A [`crate::Report`] keeps its source rows in `raw_rows`. That makes a stored
report self-contained: [`crate::recompute_report`] re-derives every aggregate
from the retained rows, which is also how reports written by older versions
are upgraded.

*/
