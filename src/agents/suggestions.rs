//! Suggestion Agent
//!
//! Asks the model for chart proposals based on a dataset's Summary Pack and
//! accepts the answer only if every proposal passes validation.

use serde_json::Value;
use tracing::{error, info, warn};
use validator::Validate;

use crate::analysis::profiler::create_summary_pack;
use crate::config::ProfilingConfig;
use crate::llm::{ModelClient, ModelClientError};
use crate::models::{Aggregation, ChartSuggestion, ChartType};
use crate::storage::DatasetStore;
use crate::types::{AppError, DatasetError};

pub const SUMMARY_START: &str = "--- DATASET SUMMARY ---";
pub const SUMMARY_END: &str = "--- END OF SUMMARY ---";

#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelClientError),

    #[error("malformed model response: {0}")]
    Malformed(String),
}

impl From<SuggestionError> for AppError {
    fn from(err: SuggestionError) -> Self {
        match err {
            SuggestionError::Dataset(e) => e.into(),
            SuggestionError::Model(e) => e.into(),
            SuggestionError::Malformed(_) => AppError::UpstreamMalformed(
                "The AI service returned a malformed response. Could not extract valid chart suggestions."
                    .to_string(),
            ),
        }
    }
}

pub struct SuggestionAgent;

impl SuggestionAgent {
    pub async fn generate_suggestions(
        store: &DatasetStore,
        client: &ModelClient,
        profiling: &ProfilingConfig,
        dataset_id: &str,
    ) -> Result<Vec<ChartSuggestion>, SuggestionError> {
        let summary = create_summary_pack(store, dataset_id, profiling).await?;
        let prompt = Self::create_suggestion_prompt(&summary);

        let raw = client.complete(&prompt).await?;
        info!(dataset_id = %dataset_id, response_len = raw.len(), "Received suggestion response");

        let suggestions = Self::parse_llm_json(&raw)
            .and_then(Self::validate_suggestions)
            .inspect_err(|e| error!(dataset_id = %dataset_id, error = %e, "Rejected model response"))?;

        info!(
            dataset_id = %dataset_id,
            count = suggestions.len(),
            "Generated and validated suggestions"
        );
        Ok(suggestions)
    }

    pub fn create_suggestion_prompt(summary: &str) -> String {
        let chart_types = quoted_list(ChartType::ALL.iter().map(ChartType::as_str));
        let aggregations = quoted_list(Aggregation::ALL.iter().map(Aggregation::as_str));

        format!(
            r#"You are an expert data analyst. Study the dataset summary below and propose 3 to 5 charts that reveal the most useful patterns in the data.

Respond with ONLY a JSON array of 3 to 5 objects. Each object must have exactly these keys:
- "title": a short, descriptive chart title
- "insight": a single sentence explaining what the chart reveals
- "parameters": an object with exactly these keys:
  - "chart_type": one of {chart_types}
  - "x_axis": the exact name of a column from the summary
  - "y_axis": the exact name of a column from the summary
  - "aggregation": one of {aggregations}

Example of the expected format:
[
  {{
    "title": "Total Sales by Region",
    "insight": "The North region generates the majority of total sales.",
    "parameters": {{
      "chart_type": "bar",
      "x_axis": "Region",
      "y_axis": "Sales",
      "aggregation": "sum"
    }}
  }}
]

{start}
{summary}
{end}

Now respond with the JSON array only, without explanations or code fences."#,
            chart_types = chart_types,
            aggregations = aggregations,
            start = SUMMARY_START,
            summary = summary,
            end = SUMMARY_END,
        )
    }

    /// Read the model text as a JSON array. An object is wrapped into a
    /// one-element array. When the text is not JSON, the span from the first
    /// `[` to the last `]` is tried instead.
    pub fn parse_llm_json(raw: &str) -> Result<Vec<Value>, SuggestionError> {
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Array(items)) => return Ok(items),
            Ok(object @ Value::Object(_)) => return Ok(vec![object]),
            Ok(other) => {
                return Err(SuggestionError::Malformed(format!(
                    "expected an array or object, got {}",
                    json_kind(&other)
                )));
            }
            Err(e) => warn!(error = %e, "Direct JSON parse failed, extracting array"),
        }

        let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) else {
            return Err(SuggestionError::Malformed("no JSON array found".to_string()));
        };
        if end < start {
            return Err(SuggestionError::Malformed("no JSON array found".to_string()));
        }

        match serde_json::from_str::<Value>(&raw[start..=end]) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(other) => Err(SuggestionError::Malformed(format!(
                "expected an array, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(SuggestionError::Malformed(format!("invalid JSON: {}", e))),
        }
    }

    /// All-or-nothing: one invalid element rejects the whole response.
    pub fn validate_suggestions(items: Vec<Value>) -> Result<Vec<ChartSuggestion>, SuggestionError> {
        items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                if !item.is_object() {
                    return Err(SuggestionError::Malformed(format!(
                        "suggestion {} is {}, not an object",
                        idx,
                        json_kind(&item)
                    )));
                }
                let suggestion: ChartSuggestion = serde_json::from_value(item)
                    .map_err(|e| SuggestionError::Malformed(format!("suggestion {}: {}", idx, e)))?;
                suggestion
                    .validate()
                    .map_err(|e| SuggestionError::Malformed(format!("suggestion {}: {}", idx, e)))?;
                Ok(suggestion)
            })
            .collect()
    }
}

fn quoted_list<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = values.map(|v| format!("\"{}\"", v)).collect();
    format!("[{}]", quoted.join(", "))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionSettings, LLMAdapter, LLMError};
    use crate::types::{LLMRequest, LLMResponse, TokenUsage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replies with a fixed text and records the prompts it receives.
    struct ScriptedAdapter {
        reply: String,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMAdapter for ScriptedAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> Result<LLMResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(last) = request.messages.last() {
                self.prompts.lock().unwrap().push(last.content.clone());
            }
            Ok(LLMResponse {
                content: self.reply.clone(),
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    fn client(adapter: Arc<ScriptedAdapter>) -> ModelClient {
        ModelClient::new(
            Some(adapter as Arc<dyn LLMAdapter>),
            CompletionSettings {
                model: "gpt-3.5-turbo".to_string(),
                temperature: 0.2,
                max_tokens: 1500,
            },
        )
    }

    fn valid_item() -> Value {
        json!({
            "title": "Sales by Region",
            "insight": "North sells the most.",
            "parameters": {
                "chart_type": "bar",
                "x_axis": "Region",
                "y_axis": "Sales",
                "aggregation": "sum"
            }
        })
    }

    #[test]
    fn test_parse_array() {
        let items = SuggestionAgent::parse_llm_json(r#"[{"a":1}]"#).unwrap();
        assert_eq!(items, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_parse_object_is_wrapped() {
        let items = SuggestionAgent::parse_llm_json(r#"{"a":1}"#).unwrap();
        assert_eq!(items, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_parse_fenced_array_in_prose() {
        let raw = "Here you go:\n```json\n[{\"a\":1}]\n```";
        let items = SuggestionAgent::parse_llm_json(raw).unwrap();
        assert_eq!(items, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = SuggestionAgent::parse_llm_json("not json at all").unwrap_err();
        assert!(matches!(err, SuggestionError::Malformed(_)));
    }

    #[test]
    fn test_parse_rejects_scalars_and_reversed_brackets() {
        assert!(SuggestionAgent::parse_llm_json("42").is_err());
        assert!(SuggestionAgent::parse_llm_json("\"[1]\"").is_err());
        assert!(SuggestionAgent::parse_llm_json("] nothing [").is_err());
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(SuggestionAgent::parse_llm_json("[]").unwrap().is_empty());
    }

    #[test]
    fn test_validate_accepts_valid_items() {
        let suggestions = SuggestionAgent::validate_suggestions(vec![valid_item(), valid_item()]).unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].parameters.chart_type, ChartType::Bar);
        assert_eq!(suggestions[0].parameters.aggregation, Aggregation::Sum);
    }

    #[test]
    fn test_validate_is_all_or_nothing() {
        let mut bad = valid_item();
        bad["parameters"]["aggregation"] = json!("average");
        let err = SuggestionAgent::validate_suggestions(vec![valid_item(), bad]).unwrap_err();
        assert!(matches!(err, SuggestionError::Malformed(_)));
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let mut empty_title = valid_item();
        empty_title["title"] = json!("");
        assert!(SuggestionAgent::validate_suggestions(vec![empty_title]).is_err());

        let mut missing_params = valid_item();
        missing_params.as_object_mut().unwrap().remove("parameters");
        assert!(SuggestionAgent::validate_suggestions(vec![missing_params]).is_err());

        let mut upper_type = valid_item();
        upper_type["parameters"]["chart_type"] = json!("Bar");
        assert!(SuggestionAgent::validate_suggestions(vec![upper_type]).is_err());

        assert!(SuggestionAgent::validate_suggestions(vec![json!("chart")]).is_err());
    }

    #[test]
    fn test_prompt_contains_summary_between_markers() {
        let prompt = SuggestionAgent::create_suggestion_prompt("Number of Rows: 3");
        let start = prompt.find(SUMMARY_START).unwrap();
        let body = prompt.find("Number of Rows: 3").unwrap();
        let end = prompt.find(SUMMARY_END).unwrap();
        assert!(start < body && body < end);
        assert!(prompt.contains(r#"["bar", "line", "pie", "scatter"]"#));
        assert!(prompt.contains(r#"["sum", "mean", "count", "median", "min", "max"]"#));
    }

    async fn stored_dataset() -> (tempfile::TempDir, DatasetStore, String) {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = DatasetStore::open(temp_dir.path(), 1 << 20).await.unwrap();
        let manifest = store
            .save_bytes("sales.csv", b"Region,Sales\nNorth,100\nNorth,50\nSouth,30\n")
            .await
            .unwrap();
        (temp_dir, store, manifest.dataset_id)
    }

    #[tokio::test]
    async fn test_generate_suggestions_end_to_end() {
        let (_tmp, store, id) = stored_dataset().await;
        let reply = format!("Sure!\n```json\n{}\n```", json!([valid_item()]));
        let adapter = ScriptedAdapter::new(&reply);

        let suggestions = SuggestionAgent::generate_suggestions(
            &store,
            &client(adapter.clone()),
            &ProfilingConfig::default(),
            &id,
        )
        .await
        .unwrap();

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Sales by Region");
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        let prompts = adapter.prompts.lock().unwrap();
        assert!(prompts[0].contains("Filename: sales.csv"));
    }

    #[tokio::test]
    async fn test_invalid_model_json_is_upstream_malformed() {
        let (_tmp, store, id) = stored_dataset().await;
        let adapter = ScriptedAdapter::new("I cannot help with that.");

        let err = SuggestionAgent::generate_suggestions(&store, &client(adapter), &ProfilingConfig::default(), &id)
            .await
            .unwrap_err();
        assert!(matches!(AppError::from(err), AppError::UpstreamMalformed(_)));
    }

    #[tokio::test]
    async fn test_unknown_dataset_skips_model_call() {
        let (_tmp, store, _id) = stored_dataset().await;
        let adapter = ScriptedAdapter::new("[]");
        let missing = uuid::Uuid::new_v4().to_string();

        let err = SuggestionAgent::generate_suggestions(
            &store,
            &client(adapter.clone()),
            &ProfilingConfig::default(),
            &missing,
        )
        .await
        .unwrap_err();
        assert!(matches!(AppError::from(err), AppError::NotFound(_)));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }
}
