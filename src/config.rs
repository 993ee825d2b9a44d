use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::llm::openai::DEFAULT_API_BASE;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub llm: LLMConfig,
    pub profiling: ProfilingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub max_upload_bytes: u64,
}

#[derive(Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

// Never print the credential.
impl fmt::Debug for LLMConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Bounds applied to the summary pack handed to the model.
#[derive(Debug, Clone)]
pub struct ProfilingConfig {
    pub max_columns: usize,
    pub max_chars: usize,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            max_columns: 60,
            max_chars: 16_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_upload_bytes: u64 = parse_var("MAX_UPLOAD_BYTES", &var("MAX_UPLOAD_BYTES", "20971520"))?;
        if max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }

        Ok(Self {
            server: ServerConfig {
                port: parse_var("PORT", &var("PORT", "8000"))?,
                host: var("HOST", "0.0.0.0"),
                cors_allowed_origins: var(
                    "ALLOWED_ORIGINS",
                    "http://localhost:5173,http://127.0.0.1:5173",
                )
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            storage: StorageConfig {
                root: PathBuf::from(var("STORAGE_PATH", "/tmp/dashboard_ai_uploads")),
                max_upload_bytes,
            },
            llm: LLMConfig {
                api_key: non_empty("OPENAI_API_KEY"),
                api_base: var("LLM_API_BASE", DEFAULT_API_BASE)
                    .trim_end_matches('/')
                    .to_string(),
                model: var("LLM_MODEL", "gpt-3.5-turbo"),
                temperature: parse_var("LLM_TEMPERATURE", &var("LLM_TEMPERATURE", "0.2"))?,
                max_tokens: parse_var("LLM_MAX_TOKENS", &var("LLM_MAX_TOKENS", "1500"))?,
                timeout_secs: parse_var("LLM_TIMEOUT_SECS", &var("LLM_TIMEOUT_SECS", "30"))?,
            },
            profiling: ProfilingConfig {
                max_columns: parse_var("SUMMARY_MAX_COLUMNS", &var("SUMMARY_MAX_COLUMNS", "60"))?,
                max_chars: parse_var("SUMMARY_MAX_CHARS", &var("SUMMARY_MAX_CHARS", "16000"))?,
            },
            logging: LoggingConfig {
                directory: non_empty("LOG_DIR").map(PathBuf::from),
            },
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: '{}'", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.profiling.max_columns, 60);
        assert_eq!(config.server.cors_allowed_origins.len(), 2);
    }

    #[test]
    fn test_empty_api_key_is_unset() {
        let config = config_from(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        assert!(config_from(&[("MAX_UPLOAD_BYTES", "0")]).is_err());
    }

    #[test]
    fn test_api_key_is_masked_in_debug() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-secret-123")]).unwrap();
        let printed = format!("{:?}", config.llm);
        assert!(!printed.contains("sk-secret-123"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let config = config_from(&[("LLM_API_BASE", "http://localhost:1234/v1/")]).unwrap();
        assert_eq!(config.llm.api_base, "http://localhost:1234/v1");
    }
}
