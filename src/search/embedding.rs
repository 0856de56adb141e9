//! Embedding generation
//!
//! `EmbeddingProvider` is the external boundary: text in, vector out,
//! fallible. `EmbeddingGenerator` wraps one provider with the model id and
//! the expected dimension and offers the two failure policies:
//!
//! - `embed`: errors propagate (query time)
//! - `embed_or_fallback`: errors become a zero vector (ingestion time)

use std::fmt;
use std::sync::Arc;

use crate::core::item::is_blank;
use crate::error::{KbError, ProviderError, Result};

/// Something that turns text into a vector.
///
/// Implementations make exactly one upstream call per invocation and never
/// retry internally.
pub trait EmbeddingProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn embed_text(&self, text: &str, model_id: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}

/// Vector produced by the ingestion-time policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    pub vector: Vec<f32>,
    /// The provider failed and `vector` is all zeros.
    pub degraded: bool,
}

#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    model_id: String,
    dimension: usize,
}

impl fmt::Debug for EmbeddingGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field("provider", &self.provider.name())
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl EmbeddingGenerator {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        model_id: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            dimension,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed `text`, surfacing every failure.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if is_blank(text) {
            return Err(KbError::InvalidInput(
                "cannot embed empty or whitespace-only text".to_string(),
            ));
        }

        let vector = self.provider.embed_text(text, &self.model_id)?;
        if vector.len() != self.dimension {
            return Err(ProviderError::Dimension {
                expected: self.dimension,
                actual: vector.len(),
            }
            .into());
        }

        Ok(vector)
    }

    /// Embed the item at `index`, substituting the zero vector on failure.
    pub fn embed_or_fallback(&self, index: usize, text: &str) -> Embedded {
        match self.embed(text) {
            Ok(vector) => Embedded {
                vector,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(
                    index,
                    provider = self.provider.name(),
                    error = %e,
                    "embedding failed, using zero vector"
                );
                Embedded {
                    vector: self.fallback_vector(),
                    degraded: true,
                }
            }
        }
    }

    pub fn fallback_vector(&self) -> Vec<f32> {
        vec![0.0; self.dimension]
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub providers shared by tests across the crate.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Returns a fixed vector per text; unknown text or texts listed in
    /// `failing` produce a provider error.
    #[derive(Default)]
    pub struct StubProvider {
        pub vectors: HashMap<String, Vec<f32>>,
        pub failing: Vec<String>,
        pub calls: AtomicUsize,
    }

    impl StubProvider {
        pub fn with(entries: &[(&str, &[f32])]) -> Self {
            Self {
                vectors: entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.to_vec()))
                    .collect(),
                ..Default::default()
            }
        }

        pub fn failing_on(mut self, text: &str) -> Self {
            self.failing.push(text.to_string());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EmbeddingProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn embed_text(
            &self,
            text: &str,
            _model_id: &str,
        ) -> std::result::Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|t| t == text) {
                return Err(ProviderError::Unavailable(format!("stub refuses {text:?}")));
            }
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| ProviderError::Malformed(format!("no stub vector for {text:?}")))
        }
    }

    /// Fails every call.
    pub struct DownProvider;

    impl EmbeddingProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        fn embed_text(
            &self,
            _text: &str,
            _model_id: &str,
        ) -> std::result::Result<Vec<f32>, ProviderError> {
            Err(ProviderError::Quota("insufficient_quota".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{DownProvider, StubProvider};
    use super::*;

    fn generator(provider: impl EmbeddingProvider + 'static, dim: usize) -> EmbeddingGenerator {
        EmbeddingGenerator::new(Arc::new(provider), "test-model", dim)
    }

    #[test]
    fn test_embed_returns_provider_vector() {
        let gen = generator(StubProvider::with(&[("hola", &[0.1, 0.2])]), 2);
        assert_eq!(gen.embed("hola").unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_embed_rejects_blank_without_calling_provider() {
        let provider = Arc::new(StubProvider::default());
        let gen = EmbeddingGenerator::new(provider.clone(), "m", 2);

        let err = gen.embed("   ").unwrap_err();
        assert!(matches!(err, KbError::InvalidInput(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_embed_checks_dimension() {
        let gen = generator(StubProvider::with(&[("short", &[1.0])]), 3);
        let err = gen.embed("short").unwrap_err();
        assert!(matches!(
            err,
            KbError::EmbeddingProvider(ProviderError::Dimension {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_embed_propagates_provider_error() {
        let gen = generator(DownProvider, 4);
        assert!(matches!(
            gen.embed("anything"),
            Err(KbError::EmbeddingProvider(ProviderError::Quota(_)))
        ));
    }

    #[test]
    fn test_fallback_is_zero_vector_of_dimension() {
        let gen = generator(DownProvider, 1536);
        let embedded = gen.embed_or_fallback(7, "anything");
        assert!(embedded.degraded);
        assert_eq!(embedded.vector.len(), 1536);
        assert!(embedded.vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_provider_called_once_per_embed() {
        let provider = Arc::new(StubProvider::default().failing_on("x"));
        let gen = EmbeddingGenerator::new(provider.clone(), "m", 2);
        let _ = gen.embed_or_fallback(0, "x");
        assert_eq!(provider.call_count(), 1);
    }
}
