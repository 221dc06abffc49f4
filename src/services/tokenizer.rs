//! Token counting used to size chunks.

use std::path::Path;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::models::{ChunkingConfig, TokenizerKind};

/// Counts tokens the way the embedding model will.
///
/// Implementations must return `0` for empty input and be deterministic.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// About four characters per token, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

/// Adapter over a Hugging Face `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| ConfigError::TokenizerError(e.to_string()))?;
        // Counting must see the whole text, not a model-length prefix.
        inner
            .with_truncation(None)
            .map_err(|e| ConfigError::TokenizerError(e.to_string()))?;
        inner.with_padding(None);
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self.inner.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                tracing::debug!(error = %e, "tokenizer failed, falling back to estimate");
                HeuristicTokenizer.count(text)
            }
        }
    }
}

pub fn build_tokenizer(config: &ChunkingConfig) -> Result<Arc<dyn Tokenizer>, ConfigError> {
    Ok(match config.tokenizer {
        TokenizerKind::Words => Arc::new(WordTokenizer),
        TokenizerKind::Heuristic => Arc::new(HeuristicTokenizer),
        TokenizerKind::HuggingFace => {
            let path = config.tokenizer_path.as_deref().ok_or_else(|| {
                ConfigError::ValidationError("chunking.tokenizer_path is not set".to_string())
            })?;
            Arc::new(HfTokenizer::from_file(path)?)
        }
    })
}
