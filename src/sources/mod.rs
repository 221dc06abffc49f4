//! Record sources: turn input files into a lazy stream of [`Document`]s.
//!
//! Two encodings are supported, length-prefixed frames ([`FramedRecords`])
//! and one record per line ([`LineRecords`]). Either may be gzip-compressed.

mod buffer;
mod framed;
mod lines;

pub use buffer::{BufferPool, Lease, PoolStats, Scratch};
pub use framed::{FramedRecords, encode_frame};
pub use lines::LineRecords;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use walkdir::WalkDir;

use crate::error::DecodeError;
use crate::models::{Document, IngestConfig, InputFormat, LineIdScheme};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A finite, non-restartable stream of decoded documents.
pub type RecordSource = Box<dyn Iterator<Item = Result<Document, DecodeError>> + Send>;

/// Scratch pools shared by every reader in a run.
#[derive(Debug, Default)]
pub struct DecodeBuffers {
    pub bytes: BufferPool<Vec<u8>>,
    pub text: BufferPool<String>,
}

/// Per-run decoding options derived from the ingest configuration.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub format: InputFormat,
    pub line_id: LineIdScheme,
    pub max_record_bytes: usize,
}

impl From<&IngestConfig> for SourceOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            format: config.format,
            line_id: config.line_id,
            max_record_bytes: config.max_record_bytes,
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Extension of the file once a trailing `.gz` is removed.
fn inner_extension(path: &Path) -> Option<String> {
    let path = if is_gzip(path) {
        Path::new(path.file_stem()?)
    } else {
        path
    };
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Resolve `Auto` to a concrete format for `path`.
pub fn resolve_format(path: &Path, configured: InputFormat) -> InputFormat {
    if configured != InputFormat::Auto {
        return configured;
    }
    match inner_extension(path).as_deref() {
        Some("csv" | "tsv" | "jsonl") => InputFormat::Lines,
        _ if is_gzip(path) => InputFormat::Framed,
        _ => InputFormat::Lines,
    }
}

fn line_delimiter(path: &Path) -> char {
    match inner_extension(path).as_deref() {
        Some("tsv") => '\t',
        _ => ',',
    }
}

/// Name used in line-number ids: the file name without any extensions.
fn source_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

/// Open `path` and return its record stream.
pub fn open_records(
    path: &Path,
    options: &SourceOptions,
    buffers: Arc<DecodeBuffers>,
) -> std::io::Result<RecordSource> {
    let file = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(path)?);
    let reader: Box<dyn Read + Send> = if is_gzip(path) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let source: RecordSource = match resolve_format(path, options.format) {
        InputFormat::Lines => Box::new(LineRecords::new(
            BufReader::with_capacity(READ_BUFFER_SIZE, reader),
            buffers,
            source_name(path),
            options.line_id,
            line_delimiter(path),
        )),
        _ => Box::new(FramedRecords::new(
            reader,
            buffers,
            options.max_record_bytes,
        )),
    };
    Ok(source)
}

/// Collect input files under `root` whose file name matches `pattern`,
/// in sorted path order. A file path is returned as-is.
pub fn discover_files(root: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let pattern = glob::Pattern::new(pattern)
        .map_err(|e| anyhow::anyhow!("invalid input pattern '{}': {}", pattern, e))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| anyhow::anyhow!("failed to read directory entry: {}", e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if pattern.matches(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_resolve_format() {
        let auto = InputFormat::Auto;
        assert_eq!(resolve_format(Path::new("a.txt.gz"), auto), InputFormat::Framed);
        assert_eq!(resolve_format(Path::new("a.csv.gz"), auto), InputFormat::Lines);
        assert_eq!(resolve_format(Path::new("a.tsv"), auto), InputFormat::Lines);
        assert_eq!(resolve_format(Path::new("a.txt"), auto), InputFormat::Lines);
        assert_eq!(
            resolve_format(Path::new("a.txt"), InputFormat::Framed),
            InputFormat::Framed
        );
    }

    #[test]
    fn test_source_name_strips_all_extensions() {
        assert_eq!(source_name(Path::new("/data/faq.csv.gz")), "faq");
        assert_eq!(source_name(Path::new("notes")), "notes");
    }

    #[test]
    fn test_open_gzip_framed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part-0.txt.gz");

        let mut raw = Vec::new();
        encode_frame("doc1\nCategory A\nHello world.", &mut raw);
        encode_frame("doc2\nCategory B\nBye.", &mut raw);
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(&raw).unwrap();
        encoder.finish().unwrap();

        let options = SourceOptions {
            format: InputFormat::Auto,
            line_id: LineIdScheme::LineNumber,
            max_record_bytes: 1 << 20,
        };
        let buffers = Arc::new(DecodeBuffers::default());
        let docs: Vec<Document> = open_records(&path, &options, buffers.clone())
            .unwrap()
            .map(Result::unwrap)
            .collect();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].header_line, "Category B");
        assert_eq!(buffers.bytes.stats().outstanding(), 0);
    }

    #[test]
    fn test_open_tsv_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq.tsv");
        std::fs::write(&path, "q1\tWhat is it?\nq2\tHow?\n").unwrap();

        let options = SourceOptions {
            format: InputFormat::Auto,
            line_id: LineIdScheme::FirstField,
            max_record_bytes: 1 << 20,
        };
        let docs: Vec<Document> = open_records(&path, &options, Arc::default())
            .unwrap()
            .map(Result::unwrap)
            .collect();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "q1");
        assert_eq!(docs[0].body_lines, vec!["What is it?"]);
    }

    #[test]
    fn test_discover_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.txt.gz"), b"").unwrap();
        std::fs::write(dir.path().join("a.txt.gz"), b"").unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt.gz"), b"").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"").unwrap();

        let files = discover_files(dir.path(), "*.txt.gz").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "a.txt.gz".to_string(),
                "b.txt.gz".to_string(),
                format!("nested{}c.txt.gz", std::path::MAIN_SEPARATOR)
            ]
        );
    }
}
