//! Chart Aggregator
//!
//! Group-by aggregation of one column over the distinct values of another,
//! producing a single point series labeled with the y-axis column.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use super::stats;
use super::table::{ColumnData, Table};
use crate::models::{Aggregation, ChartDataResponse, ChartParameters, ChartPoint, ChartSeries, GroupKey};
use crate::storage::DatasetStore;
use crate::types::{AppError, DatasetError};

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Column '{0}' does not exist in the dataset.")]
    InvalidColumn(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl From<ChartError> for AppError {
    fn from(err: ChartError) -> Self {
        match err {
            ChartError::Dataset(e) => e.into(),
            other => AppError::InvalidRequest(other.to_string()),
        }
    }
}

pub async fn generate_chart_data(
    store: &DatasetStore,
    dataset_id: &str,
    params: ChartParameters,
) -> Result<ChartDataResponse, ChartError> {
    let manifest = store.locate(dataset_id).await?;

    let response = tokio::task::spawn_blocking(move || {
        let table = Table::load(Path::new(&manifest.storage_path), &manifest.file_extension)?;
        aggregate(&table, &params)
    })
    .await
    .map_err(|e| DatasetError::Read(format!("aggregation task failed: {}", e)))??;

    info!(
        dataset_id = %dataset_id,
        points = response.series.first().map(|s| s.data.len()).unwrap_or(0),
        "Chart data generated"
    );
    Ok(response)
}

#[derive(Default)]
struct Group {
    values: Vec<f64>,
    present: usize,
}

pub fn aggregate(table: &Table, params: &ChartParameters) -> Result<ChartDataResponse, ChartError> {
    let x = table
        .column(&params.x_axis)
        .ok_or_else(|| ChartError::InvalidColumn(params.x_axis.clone()))?;
    let y = table
        .column(&params.y_axis)
        .ok_or_else(|| ChartError::InvalidColumn(params.y_axis.clone()))?;

    if matches!(y.data, ColumnData::Text(_)) && params.aggregation != Aggregation::Count {
        return Err(ChartError::InvalidInput(format!(
            "Aggregation '{}' requires a numeric column, but '{}' contains text.",
            params.aggregation, params.y_axis
        )));
    }

    let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();
    for row in 0..table.row_count() {
        let Some(key) = group_key(&x.data, row) else {
            continue;
        };
        let group = groups.entry(key).or_default();
        if let ColumnData::Numeric(values) = &y.data {
            if let Some(Some(v)) = values.get(row) {
                group.values.push(*v);
            }
        }
        if y.is_present(row) {
            group.present += 1;
        }
    }

    let data = groups
        .into_iter()
        .map(|(x, group)| ChartPoint {
            x,
            y: reduce(params.aggregation, &group),
        })
        .collect();

    Ok(ChartDataResponse {
        series: vec![ChartSeries {
            label: params.y_axis.clone(),
            data,
        }],
    })
}

fn group_key(data: &ColumnData, row: usize) -> Option<GroupKey> {
    match data {
        ColumnData::Numeric(values) => values.get(row).copied().flatten().map(GroupKey::Number),
        ColumnData::Text(values) => values.get(row).cloned().flatten().map(GroupKey::Text),
    }
}

fn reduce(aggregation: Aggregation, group: &Group) -> Option<f64> {
    let values = &group.values;
    match aggregation {
        Aggregation::Sum => Some(values.iter().sum()),
        Aggregation::Mean => stats::mean(values),
        Aggregation::Count => Some(group.present as f64),
        Aggregation::Median => stats::median(values),
        Aggregation::Min => values.iter().copied().reduce(f64::min),
        Aggregation::Max => values.iter().copied().reduce(f64::max),
    }
}
