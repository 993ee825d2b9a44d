//! Dataset Profiler
//!
//! Turns a table into the Summary Pack: a bounded plain-text profile with a
//! fixed section order (schema, numeric statistics, categorical values,
//! correlation pairs) separated by single blank lines.

use std::collections::HashMap;
use std::fmt::Write;
use std::path::Path;

use tracing::{debug, info};

use super::stats::{self, Describe};
use super::table::{Column, ColumnData, Table};
use crate::config::ProfilingConfig;
use crate::storage::{file_extension, DatasetStore};
use crate::types::DatasetError;

/// Distinct-value count at which a text column is reported as high cardinality.
pub const HIGH_CARDINALITY: usize = 50;
pub const TOP_VALUES: usize = 5;
pub const TOP_CORRELATIONS: usize = 5;
pub const TRUNCATION_MARKER: &str = "[summary truncated]";

/// Absolute correlations within this distance of 1.0 count as perfect.
/// Exactly collinear columns often compute to 0.9999999999999998.
pub const PERFECT_TOLERANCE: f64 = 1e-12;

pub async fn create_summary_pack(
    store: &DatasetStore,
    dataset_id: &str,
    config: &ProfilingConfig,
) -> Result<String, DatasetError> {
    let manifest = store.locate(dataset_id).await?;
    let config = config.clone();

    let summary = tokio::task::spawn_blocking(move || {
        let table = Table::load(Path::new(&manifest.storage_path), &manifest.file_extension)?;
        Ok::<_, DatasetError>(summarize_table(&manifest.original_filename, &table, &config))
    })
    .await
    .map_err(|e| DatasetError::Read(format!("profiling task failed: {}", e)))??;

    info!(dataset_id = %dataset_id, summary_len = summary.len(), "Summary pack created");
    Ok(summary)
}

/// Profile a local file without going through the store.
pub fn summarize_file(path: &Path, config: &ProfilingConfig) -> Result<String, DatasetError> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = file_extension(&filename);
    let table = Table::load(path, &extension)?;
    Ok(summarize_table(&filename, &table, config))
}

pub fn summarize_table(filename: &str, table: &Table, config: &ProfilingConfig) -> String {
    let profiled: Vec<&Column> = table.columns().iter().take(config.max_columns).collect();
    let skipped = table.column_count() - profiled.len();

    let numeric: Vec<&Column> = profiled
        .iter()
        .copied()
        .filter(|c| matches!(c.data, ColumnData::Numeric(_)))
        .collect();
    let text: Vec<&Column> = profiled
        .iter()
        .copied()
        .filter(|c| matches!(c.data, ColumnData::Text(_)))
        .collect();

    let mut sections = vec![schema_section(filename, table, &profiled, skipped)];
    if !numeric.is_empty() {
        sections.push(numeric_section(&numeric));
    }
    if !text.is_empty() {
        sections.push(categorical_section(&text));
    }
    if let Some(section) = correlation_section(&numeric) {
        sections.push(section);
    }

    let summary = sections.join("\n\n");
    debug!(
        columns = profiled.len(),
        skipped,
        len = summary.len(),
        "Profiled table"
    );
    truncate_summary(summary, config.max_chars)
}

fn schema_section(filename: &str, table: &Table, profiled: &[&Column], skipped: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Dataset Schema and Basic Info ---");
    let _ = writeln!(out, "Filename: {}", filename);
    let _ = writeln!(out, "Number of Rows: {}", table.row_count());
    let _ = writeln!(out, "Number of Columns: {}", table.column_count());
    let _ = write!(out, "Column Names and Data Types:");
    for column in profiled {
        let _ = write!(out, "\n- '{}' (Type: {})", column.name, column.kind());
    }
    if skipped > 0 {
        let _ = write!(out, "\n... {} more column(s) not profiled", skipped);
    }
    out
}

/// Right-aligned table with one row per statistic and one column per
/// numeric column.
fn numeric_section(columns: &[&Column]) -> String {
    const LABEL_WIDTH: usize = 5;

    let described: Vec<(&str, Vec<String>)> = columns
        .iter()
        .map(|column| {
            let describe = Describe::of(&column.numeric_values());
            let cells = describe
                .rows()
                .iter()
                .map(|(label, value)| format_stat(label, *value))
                .collect();
            (column.name.as_str(), cells)
        })
        .collect();

    let widths: Vec<usize> = described
        .iter()
        .map(|(name, cells)| {
            cells
                .iter()
                .map(|c| c.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::from("--- Statistical Summary for Numerical Columns ---\n");
    out.push_str(&" ".repeat(LABEL_WIDTH));
    for ((name, _), width) in described.iter().zip(&widths) {
        let _ = write!(out, "  {:>width$}", name, width = width);
    }

    let labels = Describe::of(&[]).rows().map(|(label, _)| label);
    for (row, label) in labels.iter().enumerate() {
        let _ = write!(out, "\n{:<width$}", label, width = LABEL_WIDTH);
        for ((_, cells), width) in described.iter().zip(&widths) {
            let _ = write!(out, "  {:>width$}", cells[row], width = width);
        }
    }
    out
}

fn format_stat(label: &str, value: f64) -> String {
    if label == "count" {
        format!("{}", value as u64)
    } else if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.6}", value)
    }
}

fn categorical_section(columns: &[&Column]) -> String {
    let mut out = String::from("--- Analysis of Categorical Columns (Top 5 Values) ---");
    for column in columns {
        let ColumnData::Text(values) = &column.data else {
            continue;
        };

        // Counts in first-encountered order so the stable sort keeps ties that way.
        let mut order: Vec<(&str, usize)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for value in values.iter().flatten() {
            match index.get(value.as_str()) {
                Some(&pos) => order[pos].1 += 1,
                None => {
                    index.insert(value.as_str(), order.len());
                    order.push((value.as_str(), 1));
                }
            }
        }

        if order.len() >= HIGH_CARDINALITY {
            let _ = write!(
                out,
                "\nColumn: '{}' has high cardinality ({} or more unique values).",
                column.name, HIGH_CARDINALITY
            );
            continue;
        }

        let _ = write!(out, "\nColumn: '{}'", column.name);
        if order.is_empty() {
            out.push_str("\n  (no non-missing values)");
            continue;
        }
        order.sort_by(|a, b| b.1.cmp(&a.1));
        for (value, count) in order.iter().take(TOP_VALUES) {
            let _ = write!(out, "\n  {}: {}", value, count);
        }
    }
    out
}

/// Top absolute Pearson correlations between distinct numeric columns.
/// Perfect correlations, including self-pairs, are left out.
fn correlation_section(columns: &[&Column]) -> Option<String> {
    if columns.len() < 2 {
        return None;
    }

    let mut pairs: Vec<(&str, &str, f64)> = Vec::new();
    for (i, a) in columns.iter().enumerate() {
        for b in columns.iter().skip(i + 1) {
            let (ColumnData::Numeric(xs), ColumnData::Numeric(ys)) = (&a.data, &b.data) else {
                continue;
            };
            if let Some(r) = stats::correlation(xs, ys).map(f64::abs) {
                if !is_perfect(r) {
                    pairs.push((a.name.as_str(), b.name.as_str(), r));
                }
            }
        }
    }
    if pairs.is_empty() {
        return None;
    }

    pairs.sort_by(|x, y| y.2.total_cmp(&x.2));
    let mut out = String::from("--- Correlation Matrix (Top 5 Pairs by Absolute Value) ---");
    for (a, b, r) in pairs.iter().take(TOP_CORRELATIONS) {
        let _ = write!(out, "\n{}~{}: {:.6}", a, b, r);
    }
    Some(out)
}

fn is_perfect(abs_r: f64) -> bool {
    abs_r >= 1.0 - PERFECT_TOLERANCE
}

/// Cut at the last line break within `max_chars` and mark the cut.
fn truncate_summary(summary: String, max_chars: usize) -> String {
    if summary.len() <= max_chars {
        return summary;
    }
    let mut end = max_chars;
    while !summary.is_char_boundary(end) {
        end -= 1;
    }
    let head = &summary[..end];
    let head = match head.rfind('\n') {
        Some(pos) => &head[..pos],
        None => head,
    };
    format!("{}\n{}", head, TRUNCATION_MARKER)
}
