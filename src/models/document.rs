use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One decoded input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    /// Empty for line-delimited inputs, which carry no header.
    pub header_line: String,
    pub body_lines: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, header_line: impl Into<String>, body_lines: Vec<String>) -> Self {
        Self {
            id: id.into(),
            header_line: header_line.into(),
            body_lines,
        }
    }

    pub fn has_body(&self) -> bool {
        self.body_lines.iter().any(|line| !line.trim().is_empty())
    }

    pub fn body(&self) -> String {
        self.body_lines.join("\n")
    }

    /// Header and body as stored alongside each chunk.
    pub fn source_content(&self) -> String {
        match (self.header_line.is_empty(), self.has_body()) {
            (_, false) => self.header_line.clone(),
            (true, true) => self.body(),
            (false, true) => format!("{}\n{}", self.header_line, self.body()),
        }
    }

    /// Decoded size in characters, used for throughput reporting.
    pub fn char_len(&self) -> usize {
        self.header_line.chars().count()
            + self
                .body_lines
                .iter()
                .map(|line| line.chars().count())
                .sum::<usize>()
    }
}

/// A token-bounded excerpt of a document, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub document_id: String,
    pub header_prefix: String,
    pub text: String,
    pub token_count: usize,
}

impl Chunk {
    /// The text sent to the embedding service.
    pub fn content(&self) -> String {
        format!("{}{}", self.header_prefix, self.text)
    }
}

/// Chunks grouped for one embedding + upsert round trip.
///
/// `chunks`, `document_ids` and `source_contents` stay index-aligned.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub sequence: u64,
    chunks: Vec<Chunk>,
    document_ids: Vec<String>,
    source_contents: Vec<Option<Arc<str>>>,
}

impl Batch {
    pub fn with_capacity(sequence: u64, capacity: usize) -> Self {
        Self {
            sequence,
            chunks: Vec::with_capacity(capacity),
            document_ids: Vec::with_capacity(capacity),
            source_contents: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, chunk: Chunk, source_content: Option<Arc<str>>) {
        self.document_ids.push(chunk.document_id.clone());
        self.source_contents.push(source_content);
        self.chunks.push(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn document_ids(&self) -> &[String] {
        &self.document_ids
    }

    pub fn source_contents(&self) -> &[Option<Arc<str>>] {
        &self.source_contents
    }

    /// Texts to embed, in chunk order.
    pub fn texts(&self) -> Vec<String> {
        self.chunks.iter().map(Chunk::content).collect()
    }
}

/// Identifier of a stored point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointId {
    Num(u64),
    Uuid(uuid::Uuid),
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointId::Num(id) => write!(f, "{}", id),
            PointId::Uuid(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_content: Option<String>,
}

/// The unit persisted to the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, text: &str) -> Chunk {
        Chunk {
            document_id: doc.to_string(),
            header_prefix: "passage: H\n".to_string(),
            text: text.to_string(),
            token_count: 1,
        }
    }

    #[test]
    fn test_source_content_variants() {
        let doc = Document::new("d", "Header", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(doc.source_content(), "Header\na\nb");

        let empty = Document::new("d", "Header", vec!["  ".to_string()]);
        assert!(!empty.has_body());
        assert_eq!(empty.source_content(), "Header");

        let headerless = Document::new("d", "", vec!["line".to_string()]);
        assert_eq!(headerless.source_content(), "line");
    }

    #[test]
    fn test_batch_stays_aligned() {
        let mut batch = Batch::with_capacity(3, 2);
        batch.push(chunk("doc1", "one"), None);
        batch.push(chunk("doc2", "two"), Some(Arc::from("src")));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.document_ids(), ["doc1", "doc2"]);
        assert_eq!(batch.source_contents().len(), 2);
        assert_eq!(batch.texts(), vec!["passage: H\none", "passage: H\ntwo"]);
    }

    #[test]
    fn test_point_id_display() {
        assert_eq!(PointId::Num(42).to_string(), "42");
        let uuid = uuid::Uuid::nil();
        assert_eq!(
            PointId::Uuid(uuid).to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
    }
}
