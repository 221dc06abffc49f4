//! Line-per-record text inputs.

use std::io::BufRead;
use std::sync::Arc;

use super::DecodeBuffers;
use crate::error::DecodeError;
use crate::models::{Document, LineIdScheme};

pub struct LineRecords<R> {
    reader: R,
    buffers: Arc<DecodeBuffers>,
    source_name: String,
    scheme: LineIdScheme,
    delimiter: char,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> LineRecords<R> {
    pub fn new(
        reader: R,
        buffers: Arc<DecodeBuffers>,
        source_name: impl Into<String>,
        scheme: LineIdScheme,
        delimiter: char,
    ) -> Self {
        Self {
            reader,
            buffers,
            source_name: source_name.into(),
            scheme,
            delimiter,
            line_no: 0,
            done: false,
        }
    }

    fn read_record(&mut self) -> Result<Option<Document>, DecodeError> {
        let mut raw = self.buffers.bytes.lease(0);
        let mut line = self.buffers.text.lease(0);
        loop {
            raw.clear();
            if self.reader.read_until(b'\n', &mut raw)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            line.clear();
            line.push_str(&String::from_utf8_lossy(&raw));
            let text = line.trim_end_matches(['\n', '\r']);
            if text.trim().is_empty() {
                continue;
            }

            let (id, body) = match self.scheme {
                LineIdScheme::LineNumber => {
                    (format!("{}:{}", self.source_name, self.line_no), text)
                }
                LineIdScheme::FirstField => {
                    let (id, rest) = text
                        .split_once(self.delimiter)
                        .ok_or(DecodeError::MissingMetadata {
                            record: self.line_no,
                        })?;
                    let id = id.trim();
                    if id.is_empty() {
                        return Err(DecodeError::MissingMetadata {
                            record: self.line_no,
                        });
                    }
                    (id.to_string(), rest.trim())
                }
            };

            let body_lines = if body.is_empty() {
                Vec::new()
            } else {
                vec![body.to_string()]
            };
            return Ok(Some(Document::new(id, String::new(), body_lines)));
        }
    }
}

impl<R: BufRead> Iterator for LineRecords<R> {
    type Item = Result<Document, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(document)) => Some(Ok(document)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
