use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook, Data, ExcelDateTime, Reader, Xlsx};
use chrono::NaiveTime;
use csv::ReaderBuilder;

use crate::types::DatasetError;

/// Cell tokens read as missing values.
const MISSING_MARKERS: [&str; 12] = [
    "NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "None", "#N/A", "<NA>", "-NaN", "-nan",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Text => write!(f, "text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    /// Whether the cell at `row` holds a value.
    pub fn is_present(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Numeric(values) => matches!(values.get(row), Some(Some(_))),
            ColumnData::Text(values) => matches!(values.get(row), Some(Some(_))),
        }
    }

    /// Non-missing numeric values, in row order. Empty for text columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        match &self.data {
            ColumnData::Numeric(values) => values.iter().flatten().copied().collect(),
            ColumnData::Text(_) => Vec::new(),
        }
    }
}

/// A dataset held in memory as an ordered list of named, typed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build a table from raw string cells, inferring each column's type.
    /// Short rows are padded with missing cells; surplus cells are ignored.
    pub fn from_records(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let names = normalize_headers(headers);
        let row_count = rows.len();

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(row_count); names.len()];
        for row in rows {
            let mut cells = row.into_iter();
            for column in raw.iter_mut() {
                let cell = cells.next().flatten().filter(|c| !is_missing(c));
                column.push(cell);
            }
        }

        let columns = names
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| Column {
                name,
                data: infer_column(cells),
            })
            .collect();

        Self { columns, row_count }
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| DatasetError::Read(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        if headers.is_empty() {
            return Err(DatasetError::Read("file contains no columns".to_string()));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| DatasetError::Read(e.to_string()))?;
            rows.push(record.iter().map(|cell| Some(cell.to_string())).collect());
        }

        Ok(Self::from_records(headers, rows))
    }

    pub fn read_csv_path(path: &Path) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path).map_err(|e| DatasetError::Read(e.to_string()))?;
        Self::read_csv(file)
    }

    /// Read the first worksheet; its first row holds the headers.
    pub fn read_xlsx_path(path: &Path) -> Result<Self, DatasetError> {
        let mut workbook: Xlsx<_> =
            open_workbook(path).map_err(|e: calamine::XlsxError| DatasetError::Read(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| DatasetError::Read("workbook has no worksheets".to_string()))?
            .map_err(|e| DatasetError::Read(e.to_string()))?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell_to_string(cell).unwrap_or_default())
                .collect(),
            None => return Err(DatasetError::Read("worksheet is empty".to_string())),
        };

        let records = rows
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        Ok(Self::from_records(headers, records))
    }

    /// Load a stored data file, dispatching on its extension.
    pub fn load(path: &Path, extension: &str) -> Result<Self, DatasetError> {
        match extension {
            ".csv" => Self::read_csv_path(path),
            ".xlsx" => Self::read_xlsx_path(path),
            other => Err(DatasetError::Unsupported(other.to_string())),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed)
}

/// Numeric when at least one value exists and every value parses as a float.
fn infer_column(cells: Vec<Option<String>>) -> ColumnData {
    let has_values = cells.iter().any(Option::is_some);
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            Some(text) => text.trim().parse::<f64>().ok().map(Some),
            None => Some(None),
        })
        .collect();

    match parsed {
        Some(values) if has_values => ColumnData::Numeric(values),
        _ => ColumnData::Text(cells),
    }
}

/// Blank headers become `Unnamed: <index>`; repeats get `.1`, `.2`, ... suffixes.
fn normalize_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(headers.len());

    for (idx, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header
        };

        let mut name = base.clone();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{}.{}", base, count);
        }
        seen.insert(name.clone(), 0);
        if name != base {
            seen.entry(base).or_insert(0);
        }
        names.push(name);
    }

    names
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(format_excel_datetime(dt)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Dates as `YYYY-MM-DD` (with ` HH:MM:SS` when there is a time part),
/// durations as `H:MM:SS`. Either way the column reads as text.
fn format_excel_datetime(value: &ExcelDateTime) -> String {
    if value.is_duration() {
        if let Some(duration) = value.as_duration() {
            let total = duration.num_seconds();
            let sign = if total < 0 { "-" } else { "" };
            let total = total.abs();
            return format!("{}{}:{:02}:{:02}", sign, total / 3600, total % 3600 / 60, total % 60);
        }
    } else if let Some(datetime) = value.as_datetime() {
        if datetime.time() == NaiveTime::MIN {
            return datetime.date().format("%Y-%m-%d").to_string();
        }
        return datetime.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    format!("serial {}", value.as_f64())
}
