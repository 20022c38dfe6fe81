use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "all-minilm";
pub const MINILM_DIMENSIONS: usize = 384;

/// Maps text to fixed-length dense vectors. One instance is shared by every
/// ingestion and query of a store.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| SearchError::Embedding {
            model: self.model_name().to_string(),
            details: "no embedding returned".to_string(),
        })
    }
}

/// Hashed character-trigram vectors. Deterministic and offline.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "char-trigram"
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            dimensions: MINILM_DIMENSIONS,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Embeddings served by a local Ollama instance through `POST /api/embed`.
pub struct OllamaEmbedder {
    client: Client,
    endpoint: Url,
    config: OllamaConfig,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaConfig) -> Result<Self, SearchError> {
        if config.dimensions == 0 || config.batch_size == 0 {
            return Err(SearchError::Request(
                "ollama dimensions and batch size must be positive".to_string(),
            ));
        }

        let base = if config.base_url.ends_with('/') {
            Url::parse(&config.base_url)?
        } else {
            Url::parse(&format!("{}/", config.base_url))?
        };

        Ok(Self {
            client: Client::new(),
            endpoint: base.join("api/embed")?,
            config,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&OllamaEmbedRequest {
                model: &self.config.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: OllamaEmbedResponse = response.json().await?;
        self.check_vectors(payload.embeddings, texts.len())
    }

    fn check_vectors(
        &self,
        vectors: Vec<Vec<f32>>,
        expected_count: usize,
    ) -> Result<Vec<Vec<f32>>, SearchError> {
        if vectors.len() != expected_count {
            return Err(SearchError::Embedding {
                model: self.config.model.clone(),
                details: format!(
                    "expected {expected_count} embeddings, received {}",
                    vectors.len()
                ),
            });
        }

        if let Some(vector) = vectors
            .iter()
            .find(|vector| vector.len() != self.config.dimensions)
        {
            return Err(SearchError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: vector.len(),
            });
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            vectors.extend(self.embed_request(batch).await?);
        }
        Ok(vectors)
    }
}

#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;

#[cfg(feature = "fastembed")]
mod local {
    use super::{Embedder, MINILM_DIMENSIONS};
    use crate::error::SearchError;
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::{Arc, Mutex};

    const MODEL_NAME: &str = "all-MiniLM-L6-v2";

    /// In-process `all-MiniLM-L6-v2`. Inference runs on the blocking pool.
    #[derive(Clone)]
    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl FastEmbedder {
        pub fn new() -> Result<Self, SearchError> {
            let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2);
            let model = TextEmbedding::try_new(options).map_err(|error| SearchError::Embedding {
                model: MODEL_NAME.to_string(),
                details: error.to_string(),
            })?;

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        fn model_name(&self) -> &str {
            MODEL_NAME
        }

        fn dimensions(&self) -> usize {
            MINILM_DIMENSIONS
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();

            let embedded = tokio::task::spawn_blocking(move || {
                let mut model = model.lock().map_err(|_| "embedding model lock poisoned".to_string())?;
                model.embed(texts, None).map_err(|error| error.to_string())
            })
            .await
            .map_err(|error| error.to_string())
            .and_then(|result| result);

            embedded.map_err(|details| SearchError::Embedding {
                model: MODEL_NAME.to_string(),
                details,
            })
        }
    }
}
