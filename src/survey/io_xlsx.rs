// Ingestion of xlsx survey exports.

use std::io::{Read, Seek};
use std::path::Path;

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::debug;
use snafu::prelude::*;

use survey_report::{CellValue, RowRecord};

use crate::survey::*;

/// The decoded first worksheet: the header row plus one record per
/// respondent. Every record carries every header; a blank cell stays in the
/// record as [`CellValue::Empty`].
#[derive(PartialEq, Debug, Clone)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<RowRecord>,
}

pub fn read_survey_file(path: &str, worksheet: Option<&str>) -> SurveyResult<ParsedSheet> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let range = pick_range(&mut workbook, worksheet, path)?;
    rows_from_range(&range)
}

fn pick_range<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    worksheet: Option<&str>,
    path: &str,
) -> SurveyResult<Range<DataType>> {
    debug!("pick_range: path: {:?} worksheet: {:?}", path, worksheet);
    if let Some(name) = worksheet {
        workbook
            .worksheet_range(name)
            .with_whatever_context(|| format!("worksheet {:?} not found in {}", name, path))?
            .context(OpeningExcelSnafu { path })
    } else {
        // The responses live on the first worksheet.
        workbook
            .worksheet_range_at(0)
            .context(EmptyDatasetSnafu {})?
            .context(OpeningExcelSnafu { path })
    }
}

/// Decodes a worksheet range: first row as headers, every later row as one
/// [`RowRecord`]. A header-only or empty range is rejected.
pub fn rows_from_range(range: &Range<DataType>) -> SurveyResult<ParsedSheet> {
    let mut iter = range.rows();
    let header_row = iter.next().context(EmptyDatasetSnafu {})?;
    debug!("rows_from_range: header: {:?}", header_row);

    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell {
            DataType::String(s) => s.trim().to_string(),
            DataType::Float(x) => x.to_string(),
            DataType::Int(x) => x.to_string(),
            // Unnamed columns still need a stable key.
            _ => format!("Column {}", idx + 1),
        })
        .collect();

    let mut rows: Vec<RowRecord> = Vec::new();
    for row in iter {
        let mut record = RowRecord::new();
        for (idx, header) in headers.iter().enumerate() {
            let value = row.get(idx).map(cell_value).unwrap_or(CellValue::Empty);
            record.push(header.clone(), value);
        }
        rows.push(record);
    }
    ensure!(!rows.is_empty(), EmptyDatasetSnafu);

    Ok(ParsedSheet { headers, rows })
}

fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Float(x) => CellValue::Number(*x),
        DataType::Int(x) => CellValue::Number(*x as f64),
        DataType::String(s) => CellValue::Text(s.clone()),
        DataType::Bool(b) => CellValue::Text(b.to_string()),
        // Dates and cell errors carry no aggregatable answer.
        _ => CellValue::Empty,
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> DataType {
        DataType::String(v.to_string())
    }

    #[test]
    fn decodes_headers_and_rows() {
        let mut range: Range<DataType> = Range::new((0, 0), (2, 2));
        range.set_value((0, 0), s("Department"));
        range.set_value((0, 1), s("Q1"));
        range.set_value((0, 2), s("Q2"));
        range.set_value((1, 0), s("Ops"));
        range.set_value((1, 1), DataType::Float(4.0));
        range.set_value((1, 2), s("2 - Rarely"));
        range.set_value((2, 0), s("Eng"));
        range.set_value((2, 2), DataType::Int(5));

        let parsed = rows_from_range(&range).unwrap();
        assert_eq!(parsed.headers, vec!["Department", "Q1", "Q2"]);
        assert_eq!(parsed.rows.len(), 2);

        let first = &parsed.rows[0];
        assert_eq!(first.get("Department"), Some(&CellValue::Text("Ops".to_string())));
        assert_eq!(first.get("Q1"), Some(&CellValue::Number(4.0)));
        assert_eq!(
            first.get("Q2"),
            Some(&CellValue::Text("2 - Rarely".to_string()))
        );

        // The blank cell is retained as an explicit empty value.
        let second = &parsed.rows[1];
        assert_eq!(second.get("Q1"), Some(&CellValue::Empty));
        assert_eq!(second.get("Q2"), Some(&CellValue::Number(5.0)));
    }

    #[test]
    fn header_only_sheet_is_rejected() {
        let mut range: Range<DataType> = Range::new((0, 0), (0, 1));
        range.set_value((0, 0), s("Department"));
        range.set_value((0, 1), s("Q1"));

        let res = rows_from_range(&range);
        assert!(matches!(res, Err(SurveyError::EmptyDataset { .. })));
    }

    #[test]
    fn unnamed_columns_get_positional_headers() {
        let mut range: Range<DataType> = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), s("Q1"));
        range.set_value((1, 0), DataType::Float(3.0));
        range.set_value((1, 1), DataType::Float(1.0));

        let parsed = rows_from_range(&range).unwrap();
        assert_eq!(parsed.headers, vec!["Q1", "Column 2"]);
        assert_eq!(parsed.rows[0].get("Column 2"), Some(&CellValue::Number(1.0)));
    }

    #[test]
    fn simplify_file_name_keeps_the_basename() {
        assert_eq!(
            simplify_file_name("/data/surveys/q3_export.xlsx"),
            "q3_export.xlsx"
        );
        assert_eq!(simplify_file_name("q3_export.xlsx"), "q3_export.xlsx");
    }
}
