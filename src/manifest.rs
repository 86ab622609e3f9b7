//! Archive file names: extraction from listing text and numeric ordering

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Matches `<letters><digits><suffix>` archive names in arbitrary text
#[derive(Debug, Clone)]
pub struct ArchivePattern {
    regex: Regex,
    suffix: String,
}

impl ArchivePattern {
    /// Build a pattern for archive names ending in `suffix` (e.g. ".seq.gz")
    pub fn new(suffix: &str) -> Result<Self> {
        if suffix.is_empty() {
            return Err(Error::config("archive_suffix", "must not be empty"));
        }
        let regex = Regex::new(&format!(r"([A-Za-z]+)(\d+){}", regex::escape(suffix)))
            .map_err(|e| Error::config("archive_suffix", e.to_string()))?;
        Ok(Self {
            regex,
            suffix: suffix.to_string(),
        })
    }

    /// The fixed archive suffix
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Split a full archive name into its letters prefix and numeric index
    ///
    /// Returns `None` when the name is not exactly `<letters><digits><suffix>`
    /// or the index does not fit in a `u64`.
    pub fn parse<'a>(&self, name: &'a str) -> Option<(&'a str, u64)> {
        let stem = name.strip_suffix(self.suffix.as_str())?;
        let digits_at = stem.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = stem.split_at(digits_at);
        if letters.is_empty()
            || !letters.chars().all(|c| c.is_ascii_alphabetic())
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        Some((letters, digits.parse().ok()?))
    }

    /// Build the ordered identifier list for `prefix` from raw listing text
    ///
    /// Identifiers are de-duplicated, restricted to the exact letters prefix
    /// and sorted ascending by numeric index (so "AB10" follows "AB9").
    /// Names with the same numeric index keep the first spelling seen.
    ///
    /// ```
    /// use genbank_dl::manifest::ArchivePattern;
    ///
    /// let pattern = ArchivePattern::new(".seq.gz").unwrap();
    /// let listing = r#"<a href="AB10.seq.gz">AB10.seq.gz</a> AB2.seq.gz AB1.seq.gz ABC3.seq.gz"#;
    /// assert_eq!(
    ///     pattern.build_index("AB", listing),
    ///     vec!["AB1.seq.gz", "AB2.seq.gz", "AB10.seq.gz"],
    /// );
    /// ```
    pub fn build_index(&self, prefix: &str, listing: &str) -> Vec<String> {
        let mut by_index: BTreeMap<u64, &str> = BTreeMap::new();

        for caps in self.regex.captures_iter(listing) {
            let (Some(letters), Some(digits)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if letters.as_str() != prefix {
                continue;
            }
            let Ok(index) = digits.as_str().parse::<u64>() else {
                tracing::debug!(name = caps.get(0).map(|m| m.as_str()), "index out of range");
                continue;
            };
            by_index.entry(index).or_insert(digits.as_str());
        }

        by_index
            .into_values()
            .map(|digits| format!("{}{}{}", prefix, digits, self.suffix))
            .filter(|name| self.parse(name).is_some_and(|(letters, _)| letters == prefix))
            .collect()
    }

    /// Sort paths by the numeric index embedded in their file names
    ///
    /// Paths whose names do not parse sort last, by name.
    pub fn sort_paths(&self, paths: &mut [PathBuf]) {
        paths.sort_by_cached_key(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let index = self.parse(&name).map(|(_, i)| i).unwrap_or(u64::MAX);
            (index, name)
        });
    }
}

/// One remote archive and where it lives locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileManifestEntry {
    /// Remote file name, e.g. "gbbct12.seq.gz"
    pub identifier: String,
    /// Numeric index taken from the identifier's trailing digits
    pub sequence: u64,
    /// Destination path of the downloaded file
    pub local_path: PathBuf,
}

/// Ordered archive list for one prefix
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<FileManifestEntry>,
}

impl Manifest {
    /// Derive the manifest for `prefix` from listing text
    pub fn build(pattern: &ArchivePattern, prefix: &str, listing: &str, dest_dir: &Path) -> Self {
        let entries = pattern
            .build_index(prefix, listing)
            .into_iter()
            .filter_map(|identifier| {
                let (_, sequence) = pattern.parse(&identifier)?;
                Some(FileManifestEntry {
                    local_path: dest_dir.join(&identifier),
                    identifier,
                    sequence,
                })
            })
            .collect();
        Self { entries }
    }

    /// Entries in ascending sequence order
    pub fn entries(&self) -> &[FileManifestEntry] {
        &self.entries
    }

    /// Remote identifiers in ascending sequence order
    pub fn identifiers(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.identifier.clone()).collect()
    }

    /// Number of archives
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no archive matched the prefix
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
