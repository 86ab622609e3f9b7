//! Block-compressed (BGZF) intermediates and gzip recompression
//!
//! Matched records are first written through a BGZF writer, then streamed
//! back out of it into a plain gzip distribution file.

use flate2::{Compression, write::GzEncoder};
use noodles_bgzf as bgzf;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::{Record, RecordCodec};

/// BGZF writer that encodes records as they arrive
pub struct BlockWriter {
    inner: bgzf::Writer<BufWriter<File>>,
    records: u64,
}

impl BlockWriter {
    /// Create (or truncate) a BGZF file
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: bgzf::Writer::new(BufWriter::new(file)),
            records: 0,
        })
    }

    /// Encode one record followed by a separating newline
    pub fn write_record(&mut self, codec: &dyn RecordCodec, record: &Record) -> io::Result<()> {
        codec.encode(record, &mut self.inner)?;
        self.inner.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush the final block and the BGZF end-of-file marker
    pub fn finish(self) -> io::Result<u64> {
        let Self { inner, records } = self;
        inner.finish()?.flush()?;
        Ok(records)
    }
}

/// Stream a BGZF file into a gzip file, returning the uncompressed byte count
pub fn recompress(bgzf_path: &Path, gz_path: &Path) -> io::Result<u64> {
    let mut reader = bgzf::Reader::new(File::open(bgzf_path)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(gz_path)?), Compression::default());
    let copied = io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()?;
    Ok(copied)
}

/// Remove a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
