//! Token-budgeted chunking of documents.

use std::sync::Arc;

use tracing::warn;

use super::splitter::{split_lines, split_paragraphs};
use super::tokenizer::Tokenizer;
use crate::error::ChunkError;
use crate::models::{ChunkingConfig, Chunk, Document};

/// Chunks produced for one document.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutcome {
    pub chunks: Vec<Chunk>,
    /// The split was redone with the wider overlap.
    pub retried: bool,
    /// Chunks still over budget after the retry, kept as-is.
    pub oversize: usize,
}

/// Splits document bodies into chunks of at most `context_length` tokens,
/// header included.
#[derive(Clone)]
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    context_length: usize,
    passage_prefix: String,
}

impl Chunker {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, context_length: usize, passage_prefix: impl Into<String>) -> Self {
        Self {
            tokenizer,
            context_length,
            passage_prefix: passage_prefix.into(),
        }
    }

    pub fn from_config(tokenizer: Arc<dyn Tokenizer>, config: &ChunkingConfig) -> Self {
        Self::new(tokenizer, config.context_length, config.passage_prefix.clone())
    }

    /// Text prepended to every chunk of a document with this header.
    pub fn header_prefix(&self, header: &str) -> String {
        if header.is_empty() {
            self.passage_prefix.clone()
        } else {
            format!("{}{}\n", self.passage_prefix, header)
        }
    }

    pub fn passage_prefix(&self) -> &str {
        &self.passage_prefix
    }

    /// Budget left once the header is reserved. Fails when nothing is left.
    pub fn adjusted_budget(&self, header_prefix: &str) -> Result<usize, ChunkError> {
        let header_tokens = self.tokenizer.count(header_prefix);
        match self.context_length.checked_sub(header_tokens) {
            Some(budget) if budget > 0 => Ok(budget),
            _ => Err(ChunkError::HeaderExceedsBudget {
                header_tokens,
                budget: self.context_length,
            }),
        }
    }

    pub fn chunk(&self, document: &Document) -> Result<ChunkOutcome, ChunkError> {
        if document.header_line.is_empty() && !document.has_body() {
            return Err(ChunkError::EmptyDocument);
        }
        let header_prefix = self.header_prefix(&document.header_line);
        let budget = self.adjusted_budget(&header_prefix)?;

        if !document.has_body() {
            let header = header_prefix.trim_end().to_string();
            let token_count = self.tokenizer.count(&header);
            return Ok(ChunkOutcome {
                chunks: vec![Chunk {
                    document_id: document.id.clone(),
                    header_prefix: header,
                    text: String::new(),
                    token_count,
                }],
                ..Default::default()
            });
        }

        let tokenizer = self.tokenizer.as_ref();
        let lines = split_lines(&document.body(), budget, tokenizer);
        let mut chunks = self.build_chunks(document, &header_prefix, &lines, budget, self.context_length / 8);

        let mut retried = false;
        if chunks.iter().any(|c| c.token_count > budget) {
            retried = true;
            chunks = self.build_chunks(document, &header_prefix, &lines, budget, self.context_length / 4);
        }

        let oversize = chunks.iter().filter(|c| c.token_count > budget).count();
        if oversize > 0 {
            let largest = chunks.iter().map(|c| c.token_count).max().unwrap_or(0);
            warn!(
                document_id = %document.id,
                oversize,
                largest,
                budget,
                "chunks exceed token budget after retry; keeping them"
            );
        }

        Ok(ChunkOutcome {
            chunks,
            retried,
            oversize,
        })
    }

    fn build_chunks(
        &self,
        document: &Document,
        header_prefix: &str,
        lines: &[String],
        budget: usize,
        overlap: usize,
    ) -> Vec<Chunk> {
        split_paragraphs(lines, budget, overlap, header_prefix, self.tokenizer.as_ref())
            .into_iter()
            .map(|text| {
                let token_count = self.tokenizer.count(&format!("{header_prefix}{text}"));
                Chunk {
                    document_id: document.id.clone(),
                    header_prefix: header_prefix.to_string(),
                    text,
                    token_count,
                }
            })
            .collect()
    }
}
