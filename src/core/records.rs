//! JSON Lines hand-off from the ingestion side
//!
//! One object per line: `{"content": "...", "metadata": {...}}`. Whatever
//! produced the text (catalog export, chat transcript splitter) has already
//! run; this only moves records into a store.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::Deserialize;

use super::item::{is_blank, Metadata};
use super::store::KnowledgeStore;
use crate::error::{KbError, Result};

#[derive(Debug, Deserialize)]
struct RawRecord {
    content: String,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// A record ready for `KnowledgeStore::append`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based line in the input.
    pub line: usize,
    pub content: String,
    pub metadata: Metadata,
}

/// Counts from [`append_records`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub appended: usize,
    /// Lines whose content was blank.
    pub skipped_lines: Vec<usize>,
}

/// Parse every non-empty line. A line that is not a valid record is an
/// error naming the line.
pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawRecord = serde_json::from_str(&line)
            .map_err(|e| KbError::InvalidInput(format!("line {line_no}: {e}")))?;
        records.push(Record {
            line: line_no,
            content: raw.content,
            metadata: flatten_metadata(raw.metadata),
        });
    }
    Ok(records)
}

/// Append records in order, skipping blank content with a warning.
pub fn append_records(store: &mut KnowledgeStore, records: Vec<Record>) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();
    for record in records {
        if is_blank(&record.content) {
            tracing::warn!(line = record.line, "skipping record with empty content");
            summary.skipped_lines.push(record.line);
            continue;
        }
        store.append(record.content, record.metadata)?;
        summary.appended += 1;
    }
    Ok(summary)
}

/// Strings stay as they are; anything else keeps its JSON text.
fn flatten_metadata(raw: BTreeMap<String, serde_json::Value>) -> Metadata {
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const INPUT: &str = r#"{"content": "Libro: Rayuela\nAutor: Julio Cortázar", "metadata": {"tipo": "catalogo", "precio": "15000", "stock": 3}}

{"content": "Conversación sobre libros:\n¿Tienen a Borges?", "metadata": {"tipo": "conversacion", "numero": 1, "temas": ["autor", "libro"]}}
{"content": "   ", "metadata": {}}
{"content": "Libro: Ficciones"}
"#;

    #[test]
    fn test_parse_records() {
        let records = parse_records(Cursor::new(INPUT)).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].line, 3);
        assert_eq!(records[0].metadata["stock"], "3");
        assert_eq!(records[1].metadata["temas"], r#"["autor","libro"]"#);
        assert_eq!(records[1].metadata["numero"], "1");
        assert!(records[3].metadata.is_empty());
    }

    #[test]
    fn test_append_skips_blank_content() {
        let records = parse_records(Cursor::new(INPUT)).unwrap();
        let mut store = KnowledgeStore::new();

        let summary = append_records(&mut store, records).unwrap();

        assert_eq!(summary.appended, 3);
        assert_eq!(summary.skipped_lines, vec![4]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.items()[2].content(), "Libro: Ficciones");
    }

    #[test]
    fn test_bad_line_names_line_number() {
        let err = parse_records(Cursor::new("{\"content\": \"ok\"}\nnot json\n")).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
