//! Length-prefixed binary records.
//!
//! Each frame is a little-endian `i32` byte length followed by that many bytes
//! of UTF-8 text. Inside the text the first non-empty line is the document id,
//! the second the header, and the remaining non-empty lines the body.

use std::io::{ErrorKind, Read};
use std::sync::Arc;

use super::DecodeBuffers;
use crate::error::DecodeError;
use crate::models::Document;

pub struct FramedRecords<R> {
    reader: R,
    buffers: Arc<DecodeBuffers>,
    max_record_bytes: usize,
    records: u64,
    done: bool,
}

impl<R: Read> FramedRecords<R> {
    pub fn new(reader: R, buffers: Arc<DecodeBuffers>, max_record_bytes: usize) -> Self {
        Self {
            reader,
            buffers,
            max_record_bytes,
            records: 0,
            done: false,
        }
    }

    fn read_record(&mut self) -> Result<Option<Document>, DecodeError> {
        let Some(prefix) = read_prefix(&mut self.reader)? else {
            return Ok(None);
        };

        let len = i32::from_le_bytes(prefix);
        let len = usize::try_from(len).map_err(|_| DecodeError::InvalidLength(len))?;
        if len > self.max_record_bytes {
            return Err(DecodeError::RecordTooLarge {
                len,
                max: self.max_record_bytes,
            });
        }
        self.records += 1;

        let mut text = self.buffers.text.lease(len);
        {
            let mut bytes = self.buffers.bytes.lease(len);
            let got = (&mut self.reader)
                .take(len as u64)
                .read_to_end(&mut bytes)?;
            if got < len {
                return Err(DecodeError::TruncatedPayload {
                    expected: len,
                    got,
                });
            }
            text.push_str(&String::from_utf8_lossy(&bytes));
        }

        parse_payload(&text, self.records).map(Some)
    }
}

impl<R: Read> Iterator for FramedRecords<R> {
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

/// Returns `None` on a clean end of stream before any prefix byte.
fn read_prefix<R: Read>(reader: &mut R) -> Result<Option<[u8; 4]>, DecodeError> {
    let mut prefix = [0u8; 4];
    let mut got = 0;
    while got < prefix.len() {
        match reader.read(&mut prefix[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    match got {
        0 => Ok(None),
        4 => Ok(Some(prefix)),
        got => Err(DecodeError::TruncatedPrefix { got }),
    }
}

fn parse_payload(text: &str, record: u64) -> Result<Document, DecodeError> {
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty());

    match (lines.next(), lines.next()) {
        (Some(id), Some(header)) => Ok(Document::new(
            id,
            header,
            lines.map(str::to_string).collect(),
        )),
        _ => Err(DecodeError::MissingMetadata { record }),
    }
}

/// Append `payload` to `out` as one frame.
pub fn encode_frame(payload: &str, out: &mut Vec<u8>) {
    let len = i32::try_from(payload.len()).unwrap_or(i32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn records(data: Vec<u8>) -> (Vec<Result<Document, DecodeError>>, Arc<DecodeBuffers>) {
        let buffers = Arc::new(DecodeBuffers::default());
        let items = FramedRecords::new(Cursor::new(data), buffers.clone(), 1024).collect();
        (items, buffers)
    }

    #[test]
    fn test_decodes_sequence_of_frames() {
        let mut data = Vec::new();
        encode_frame("doc1\nCategory A\nHello world.\n", &mut data);
        encode_frame("doc2\r\n\r\nCategory B\r\nfirst\r\n\r\nsecond", &mut data);

        let (items, buffers) = records(data);
        let docs: Vec<Document> = items.into_iter().map(Result::unwrap).collect();

        assert_eq!(docs.len(), 2);
        assert_eq!(
            docs[0],
            Document::new("doc1", "Category A", vec!["Hello world.".to_string()])
        );
        assert_eq!(docs[1].id, "doc2");
        assert_eq!(docs[1].header_line, "Category B");
        assert_eq!(docs[1].body_lines, vec!["first", "second"]);
        assert_eq!(buffers.bytes.stats().outstanding(), 0);
        assert_eq!(buffers.text.stats().outstanding(), 0);
    }

    #[test]
    fn test_empty_stream_ends_cleanly() {
        let (items, _) = records(Vec::new());
        assert!(items.is_empty());
    }

    #[test]
    fn test_metadata_only_record_has_empty_body() {
        let mut data = Vec::new();
        encode_frame("doc1\nOnly header", &mut data);
        let (items, _) = records(data);
        let doc = items.into_iter().next().unwrap().unwrap();
        assert!(doc.body_lines.is_empty());
        assert!(!doc.has_body());
    }

    #[test]
    fn test_truncated_payload_is_fatal() {
        let mut data = Vec::new();
        encode_frame("doc1\nHeader\nbody", &mut data);
        encode_frame("doc2\nHeader\nbody that gets cut", &mut data);
        data.truncate(data.len() - 5);

        let (items, buffers) = records(data);
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(DecodeError::TruncatedPayload { got, .. }) if got > 0
        ));

        let bytes = buffers.bytes.stats();
        let text = buffers.text.stats();
        assert_eq!(bytes.acquired, 2);
        assert_eq!(bytes.acquired, bytes.released);
        assert_eq!(text.acquired, text.released);
    }

    #[test]
    fn test_truncated_prefix_is_fatal() {
        let mut data = Vec::new();
        encode_frame("doc1\nHeader\nbody", &mut data);
        data.extend_from_slice(&[3, 0]);

        let (items, _) = records(data);
        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[1],
            Err(DecodeError::TruncatedPrefix { got: 2 })
        ));
    }

    #[test]
    fn test_missing_header_is_fatal_and_stops() {
        let mut data = Vec::new();
        encode_frame("lonely-id\n\n", &mut data);
        encode_frame("doc2\nHeader\nbody", &mut data);

        let (items, buffers) = records(data);
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(DecodeError::MissingMetadata { record: 1 })
        ));
        assert_eq!(buffers.text.stats().outstanding(), 0);
    }

    #[test]
    fn test_negative_and_oversized_lengths() {
        let (items, _) = records((-1i32).to_le_bytes().to_vec());
        assert!(matches!(items[0], Err(DecodeError::InvalidLength(-1))));

        let (items, _) = records(4096i32.to_le_bytes().to_vec());
        assert!(matches!(
            items[0],
            Err(DecodeError::RecordTooLarge { len: 4096, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut data = Vec::new();
        let payload = b"doc1\nHeader\nbad \xFF byte";
        data.extend_from_slice(&(payload.len() as i32).to_le_bytes());
        data.extend_from_slice(payload);

        let (items, _) = records(data);
        let doc = items.into_iter().next().unwrap().unwrap();
        assert_eq!(doc.body_lines, vec!["bad \u{FFFD} byte"]);
    }
}
