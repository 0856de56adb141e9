//! Runtime configuration
//!
//! Built once at startup from the environment (a `.env` file is honoured)
//! and passed explicitly to everything that needs it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{KbError, Result};
use crate::search::embedding::{EmbeddingGenerator, EmbeddingProvider};
use crate::search::htp::{HtpProvider, HTP_DIM};
use crate::search::openai::OpenAiProvider;

pub const DEFAULT_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_DIMENSION: usize = 1536;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_STORE_PATH: &str = "knowledge_base.db";
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_PROGRESS_EVERY: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// Offline harmonic token projection.
    Local,
}

impl std::str::FromStr for ProviderKind {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "local" | "htp" => Ok(Self::Local),
            other => Err(KbError::Config(format!(
                "unknown embedding provider '{other}' (expected 'openai' or 'local')"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub store_path: PathBuf,
    pub top_k: usize,
    pub progress_every: usize,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("store_path", &self.store_path)
            .field("top_k", &self.top_k)
            .field("progress_every", &self.progress_every)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(HashMap::new())
    }

    /// Like [`from_env`](Self::from_env), with `overrides` taking precedence.
    pub fn from_env_with(overrides: HashMap<String, String>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to read .env");
            }
        }
        let mut vars: HashMap<String, String> = std::env::vars().collect();
        vars.extend(overrides);
        Self::from_vars(vars)
    }

    /// Build from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("OPENAI_API_KEY");
        let provider = match get("SHELF_PROVIDER") {
            Some(p) => p.parse()?,
            None if api_key.is_some() => ProviderKind::OpenAi,
            None => ProviderKind::Local,
        };

        let default_dimension = match provider {
            ProviderKind::OpenAi => DEFAULT_DIMENSION,
            ProviderKind::Local => HTP_DIM,
        };
        let dimension = parse_or(get("SHELF_EMBEDDING_DIM"), "SHELF_EMBEDDING_DIM", default_dimension)?;

        let config = Self {
            provider,
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: get("SHELF_EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            dimension,
            store_path: get("SHELF_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            top_k: parse_or(get("SHELF_TOP_K"), "SHELF_TOP_K", DEFAULT_TOP_K)?,
            progress_every: parse_or(
                get("SHELF_PROGRESS_EVERY"),
                "SHELF_PROGRESS_EVERY",
                DEFAULT_PROGRESS_EVERY,
            )?,
            request_timeout: Duration::from_secs(parse_or(
                get("SHELF_REQUEST_TIMEOUT_SECS"),
                "SHELF_REQUEST_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(KbError::Config("embedding dimension must be positive".to_string()));
        }
        if self.provider == ProviderKind::Local && self.dimension != HTP_DIM {
            return Err(KbError::Config(format!(
                "local provider produces {HTP_DIM}-dimensional vectors, configured {}",
                self.dimension
            )));
        }
        if self.provider == ProviderKind::OpenAi && self.api_key.is_none() {
            return Err(KbError::Config(
                "OPENAI_API_KEY is required for the openai provider".to_string(),
            ));
        }
        Ok(())
    }

    /// Model id recorded with the stored vectors.
    pub fn model_id(&self) -> &str {
        match self.provider {
            ProviderKind::OpenAi => &self.model,
            ProviderKind::Local => "htp-384",
        }
    }

    /// Provider and generator for this configuration.
    pub fn generator(&self) -> Result<EmbeddingGenerator> {
        let provider: Arc<dyn EmbeddingProvider> = match self.provider {
            ProviderKind::OpenAi => {
                let api_key = self.api_key.clone().ok_or_else(|| {
                    KbError::Config("OPENAI_API_KEY is required for the openai provider".to_string())
                })?;
                Arc::new(OpenAiProvider::new(&self.base_url, api_key, self.request_timeout)?)
            }
            ProviderKind::Local => Arc::new(HtpProvider::new()),
        };
        Ok(EmbeddingGenerator::new(provider, self.model_id(), self.dimension))
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| KbError::Config(format!("{key} has invalid value '{v}'"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_key_use_local_provider() {
        let config = Config::from_vars(HashMap::new()).unwrap();
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.dimension, HTP_DIM);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert_eq!(config.progress_every, 10);
        assert_eq!(config.store_path, PathBuf::from("knowledge_base.db"));
    }

    #[test]
    fn test_api_key_selects_openai() {
        let config = Config::from_vars(vars(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.dimension, 1536);
        assert_eq!(config.model_id(), "text-embedding-ada-002");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(vars(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("SHELF_EMBEDDING_MODEL", "text-embedding-3-small"),
            ("SHELF_EMBEDDING_DIM", "512"),
            ("SHELF_TOP_K", "5"),
            ("SHELF_STORE_PATH", "/tmp/kb.db"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
        ]))
        .unwrap();
        assert_eq!(config.model, "text-embedding-3-small");
        assert_eq!(config.dimension, 512);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.store_path, PathBuf::from("/tmp/kb.db"));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_openai_without_key_is_rejected() {
        let err = Config::from_vars(vars(&[("SHELF_PROVIDER", "openai")])).unwrap_err();
        assert!(matches!(err, KbError::Config(_)));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = Config::from_vars(vars(&[("SHELF_TOP_K", "many")])).unwrap_err();
        assert!(err.to_string().contains("SHELF_TOP_K"));
    }

    #[test]
    fn test_local_dimension_is_fixed() {
        let err = Config::from_vars(vars(&[
            ("SHELF_PROVIDER", "local"),
            ("SHELF_EMBEDDING_DIM", "1536"),
        ]))
        .unwrap_err();
        assert!(matches!(err, KbError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config::from_vars(vars(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
