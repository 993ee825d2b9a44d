pub mod charts;
pub mod profiler;
pub mod stats;
pub mod table;

#[cfg(test)]
pub(crate) mod fixtures;

pub use charts::{aggregate, generate_chart_data, ChartError};
pub use profiler::{create_summary_pack, summarize_file, summarize_table};
pub use table::{Column, ColumnData, ColumnKind, Table};
