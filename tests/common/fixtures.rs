//! GenBank flat-file fixtures and listing generators

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// Release header that precedes the first LOCUS line in real archives
pub const RELEASE_HEADER: &str = "GBBCT1.SEQ          Genetic Sequence Data Bank\n\
                                  \x20                         June 15 2024\n\
                                  \n\
                                  \x20                 Bacterial Sequences (Part 1)\n\
                                  \n";

/// One complete record with the given organism and lineage
pub fn record(accession: &str, organism: &str, lineage: &str) -> String {
    format!(
        "LOCUS       {accession}               10 bp    DNA     linear   BCT 01-JAN-2020\n\
         DEFINITION  {organism} test sequence.\n\
         ACCESSION   {accession}\n\
         SOURCE      {organism}\n\
         \x20 ORGANISM  {organism}\n\
         \x20           {lineage}\n\
         ORIGIN\n\
         \x20       1 acgtacgtac\n\
         //\n"
    )
}

/// An E. coli record
pub fn ecoli(accession: &str) -> String {
    record(
        accession,
        "Escherichia coli",
        "Bacteria; Pseudomonadota; Gammaproteobacteria; Enterobacterales.",
    )
}

/// A B. subtilis record
pub fn subtilis(accession: &str) -> String {
    record(
        accession,
        "Bacillus subtilis",
        "Bacteria; Bacillota; Bacilli; Bacillales.",
    )
}

/// Archive body: header followed by the records
pub fn archive_body(records: &[String]) -> String {
    let mut body = RELEASE_HEADER.to_string();
    for r in records {
        body.push_str(r);
    }
    body
}

/// Gzip-compress text
pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .expect("writing to a Vec cannot fail");
    encoder.finish().expect("writing to a Vec cannot fail")
}

/// Directory listing page linking each name, like an FTP-over-HTTP index
pub fn listing_html(names: &[&str]) -> String {
    let mut html = String::from("<html><head><title>Index of /genbank</title></head><body><pre>\n");
    for name in names {
        html.push_str(&format!(
            "<a href=\"{name}\">{name}</a>    15-Jun-2024 10:00  1.2M\n"
        ));
    }
    html.push_str("</pre></body></html>\n");
    html
}
