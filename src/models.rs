use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use validator::Validate;

use crate::config::Config;
use crate::llm::ModelClient;
use crate::storage::DatasetStore;
use crate::types::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: DatasetStore,
    pub model_client: Arc<ModelClient>,
}

/// Chart kinds the frontend knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
}

impl ChartType {
    pub const ALL: [ChartType; 4] = [ChartType::Bar, ChartType::Line, ChartType::Pie, ChartType::Scatter];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "Invalid chart_type '{}'. Must be one of: {}",
                    s,
                    allowed_list(ChartType::ALL.iter().map(ChartType::as_str))
                ))
            })
    }
}

/// Reductions applied to the y-axis column within each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Count,
    Median,
    Min,
    Max,
}

impl Aggregation {
    pub const ALL: [Aggregation; 6] = [
        Aggregation::Sum,
        Aggregation::Mean,
        Aggregation::Count,
        Aggregation::Median,
        Aggregation::Min,
        Aggregation::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Count => "count",
            Aggregation::Median => "median",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregation::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "Invalid aggregation '{}'. Must be one of: {}",
                    s,
                    allowed_list(Aggregation::ALL.iter().map(Aggregation::as_str))
                ))
            })
    }
}

fn allowed_list<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChartParameters {
    pub chart_type: ChartType,
    #[validate(length(min = 1))]
    pub x_axis: String,
    #[validate(length(min = 1))]
    pub y_axis: String,
    pub aggregation: Aggregation,
}

/// A chart proposed by the model, accepted only after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChartSuggestion {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub insight: String,
    #[validate(nested)]
    pub parameters: ChartParameters,
}

// API Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub dataset_id: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub dataset_id: String,
}

/// Chart data request as received on the wire. `chart_type` and
/// `aggregation` stay plain strings here so that values outside the
/// allow-lists surface as `InvalidRequest` rather than a JSON rejection.
#[derive(Debug, Deserialize)]
pub struct ChartDataRequest {
    #[serde(rename = "datasetId")]
    pub dataset_id: String,
    pub chart_type: String,
    pub x_axis: String,
    pub y_axis: String,
    pub aggregation: String,
}

impl ChartDataRequest {
    pub fn into_parameters(self) -> AppResult<(String, ChartParameters)> {
        let params = ChartParameters {
            chart_type: self.chart_type.parse()?,
            x_axis: self.x_axis,
            y_axis: self.y_axis,
            aggregation: self.aggregation.parse()?,
        };
        params
            .validate()
            .map_err(|_| AppError::InvalidRequest("x_axis and y_axis must not be empty".to_string()))?;
        Ok((self.dataset_id, params))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataResponse {
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: String,
    pub data: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: GroupKey,
    pub y: Option<f64>,
}

/// Value of the x-axis column that defines one group.
///
/// Keys order ascending: numbers numerically, text by byte order.
#[derive(Debug, Clone)]
pub enum GroupKey {
    Number(f64),
    Text(String),
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (GroupKey::Number(a), GroupKey::Number(b)) => a.total_cmp(b),
            (GroupKey::Text(a), GroupKey::Text(b)) => a.cmp(b),
            (GroupKey::Number(_), GroupKey::Text(_)) => Ordering::Less,
            (GroupKey::Text(_), GroupKey::Number(_)) => Ordering::Greater,
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
        match self {
            GroupKey::Number(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT => {
                serializer.serialize_i64(*v as i64)
            }
            GroupKey::Number(v) => serializer.serialize_f64(*v),
            GroupKey::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub model_client: String,
}
