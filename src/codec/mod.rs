//! Record codec for GenBank flat files
//!
//! A release archive is a gzip stream of concatenated flat-file records. Each
//! record runs from a `LOCUS` line through a `//` terminator line. Records are
//! kept verbatim so that re-encoding a decoded record reproduces its bytes.

pub mod bgzf;

use std::io::{self, BufRead, Write};

/// Line that starts a record
const RECORD_START: &str = "LOCUS";
/// Line that ends a record
const RECORD_END: &str = "//";
/// Keyword introducing the organism name inside the SOURCE block
const ORGANISM_KEYWORD: &str = "  ORGANISM";
/// Continuation lines of the lineage are indented by this many columns
const CONTINUATION_INDENT: usize = 12;

/// One flat-file record with its parsed categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    text: String,
    organism: Option<String>,
    lineage: Vec<String>,
}

impl Record {
    /// Build a record from its verbatim text, parsing the organism block
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let (organism, lineage) = parse_organism(&text);
        Self {
            text,
            organism,
            lineage,
        }
    }

    /// The verbatim record text, terminator included
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Scientific name from the `ORGANISM` line
    pub fn organism(&self) -> Option<&str> {
        self.organism.as_deref()
    }

    /// Taxa listed below the `ORGANISM` line, root first
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Every name this record can be classified by: organism then lineage
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.organism
            .as_deref()
            .into_iter()
            .chain(self.lineage.iter().map(String::as_str))
    }
}

fn parse_organism(text: &str) -> (Option<String>, Vec<String>) {
    let mut lines = text.lines();
    let Some(name) = lines.by_ref().find_map(|l| l.strip_prefix(ORGANISM_KEYWORD)) else {
        return (None, Vec::new());
    };
    let organism = Some(name.trim().to_string()).filter(|n| !n.is_empty());

    let mut lineage = Vec::new();
    for line in lines {
        let indent = line.len() - line.trim_start().len();
        if indent < CONTINUATION_INDENT || line.trim().is_empty() {
            break;
        }
        lineage.extend(
            line.trim()
                .trim_end_matches('.')
                .split(';')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
        );
    }
    (organism, lineage)
}

/// Decode failures surfaced per record
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Underlying read failed (including corrupt compression)
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// The stream ended inside a record
    #[error("record starting at line {line} has no '//' terminator")]
    Unterminated {
        /// 1-based line number of the record's first line
        line: usize,
    },

    /// Content between records that does not start with a `LOCUS` line
    #[error("line {line} is outside any record: {content:?}")]
    Stray {
        /// 1-based line number
        line: usize,
        /// The offending line, without its line ending
        content: String,
    },
}

/// Converts between byte streams and [`Record`]s
///
/// Implementations can wrap other flat-file dialects; the filter stage only
/// relies on [`Record::categories`].
pub trait RecordCodec: Send + Sync {
    /// Lazily decode records from a buffered reader
    fn decode<'a>(
        &self,
        reader: Box<dyn BufRead + Send + 'a>,
    ) -> Box<dyn Iterator<Item = Result<Record, CodecError>> + Send + 'a>;

    /// Write one record in the codec's native form
    fn encode(&self, record: &Record, writer: &mut dyn Write) -> io::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Codec for GenBank flat-file records
#[derive(Debug, Default, Clone, Copy)]
pub struct FlatFileCodec;

impl RecordCodec for FlatFileCodec {
    fn decode<'a>(
        &self,
        reader: Box<dyn BufRead + Send + 'a>,
    ) -> Box<dyn Iterator<Item = Result<Record, CodecError>> + Send + 'a> {
        Box::new(FlatFileRecords {
            reader,
            line_no: 0,
            in_body: false,
            done: false,
        })
    }

    fn encode(&self, record: &Record, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(record.as_str().as_bytes())
    }

    fn name(&self) -> &'static str {
        "genbank-flatfile"
    }
}

struct FlatFileRecords<'a> {
    reader: Box<dyn BufRead + Send + 'a>,
    line_no: usize,
    /// Set once the first `LOCUS` line is seen; the release header ends there
    in_body: bool,
    done: bool,
}

impl Iterator for FlatFileRecords<'_> {
    type Item = Result<Record, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut current: Option<(usize, String)> = None;
        let mut line = String::new();
        loop {
            line.clear();
            let read = match self.reader.read_line(&mut line) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            if read == 0 {
                self.done = true;
                return current.map(|(start, _)| Err(CodecError::Unterminated { line: start }));
            }
            self.line_no += 1;

            match current.as_mut() {
                None if line.starts_with(RECORD_START) => {
                    self.in_body = true;
                    current = Some((self.line_no, line.clone()));
                }
                None if line.trim().is_empty() => {}
                None if !self.in_body && !line.starts_with(RECORD_END) => {}
                None => {
                    self.done = true;
                    return Some(Err(CodecError::Stray {
                        line: self.line_no,
                        content: line.trim_end().to_string(),
                    }));
                }
                Some((_, text)) => {
                    text.push_str(&line);
                    if line.starts_with(RECORD_END) {
                        if !text.ends_with('\n') {
                            text.push('\n');
                        }
                        let (_, text) = current.take()?;
                        return Some(Ok(Record::from_text(text)));
                    }
                }
            }
        }
    }
}
