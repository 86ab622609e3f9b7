//! Include/exclude classification of records by organism and lineage

use crate::codec::Record;
use std::collections::HashSet;

/// Outcome of classifying one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A category is in the exclude set
    Excluded,
    /// A category is in the include set, or no include set is configured
    Included,
    /// An include set is configured and no category is in it
    NotIncluded,
}

impl Classification {
    /// Whether the record should be written to the output
    pub fn is_match(self) -> bool {
        matches!(self, Classification::Included)
    }
}

/// Lower-cased include and exclude sets
///
/// Exclusion is evaluated first and wins unconditionally. The include set is
/// only consulted for records that were not excluded; when it is empty every
/// non-excluded record matches.
///
/// ```
/// use genbank_dl::ClassificationRule;
///
/// let rule = ClassificationRule::new(&["Bacteria"], &["Escherichia coli"]);
/// assert!(rule.classify_names(["Bacillus subtilis", "Bacteria"]).is_match());
/// assert!(!rule.classify_names(["Escherichia coli", "Bacteria"]).is_match());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationRule {
    include: HashSet<String>,
    exclude: HashSet<String>,
}

impl ClassificationRule {
    /// Build a rule; entries are trimmed and lower-cased, blanks dropped
    pub fn new<I, E>(include: &[I], exclude: &[E]) -> Self
    where
        I: AsRef<str>,
        E: AsRef<str>,
    {
        Self {
            include: normalize(include),
            exclude: normalize(exclude),
        }
    }

    /// Whether an include set is configured
    pub fn has_include(&self) -> bool {
        !self.include.is_empty()
    }

    /// Whether an exclude set is configured
    pub fn has_exclude(&self) -> bool {
        !self.exclude.is_empty()
    }

    /// Classify a record by its organism and lineage
    pub fn classify(&self, record: &Record) -> Classification {
        self.classify_names(record.categories())
    }

    /// Classify an arbitrary set of category names
    pub fn classify_names<'a, I>(&self, names: I) -> Classification
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<String> = names.into_iter().map(str::to_lowercase).collect();

        if names.iter().any(|n| self.exclude.contains(n)) {
            return Classification::Excluded;
        }
        if !self.has_include() || names.iter().any(|n| self.include.contains(n)) {
            return Classification::Included;
        }
        Classification::NotIncluded
    }
}

fn normalize<S: AsRef<str>>(entries: &[S]) -> HashSet<String> {
    entries
        .iter()
        .map(|e| e.as_ref().trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn empty_rule_matches_everything() {
        let rule = ClassificationRule::default();
        assert!(rule.classify_names(["anything"]).is_match());
        assert!(rule.classify_names(std::iter::empty()).is_match());
    }

    #[test]
    fn exclude_wins_over_include() {
        let rule = ClassificationRule::new(&["x"], &["x"]);
        assert_eq!(rule.classify_names(["x"]), Classification::Excluded);

        let rule = ClassificationRule::new(&["Bacteria"], &["Escherichia coli"]);
        assert_eq!(
            rule.classify_names(["Escherichia coli", "Bacteria"]),
            Classification::Excluded
        );
    }

    #[test]
    fn include_set_restricts_matches() {
        let rule = ClassificationRule::new(&["Homo sapiens"], NONE);
        assert_eq!(
            rule.classify_names(["homo SAPIENS"]),
            Classification::Included
        );
        assert_eq!(
            rule.classify_names(["Mus musculus"]),
            Classification::NotIncluded
        );
        assert_eq!(
            rule.classify_names(std::iter::empty()),
            Classification::NotIncluded
        );
    }

    #[test]
    fn exclude_only_rule_keeps_the_rest() {
        let rule = ClassificationRule::new(NONE, &["x"]);
        let verdicts: Vec<bool> = ["a", "b", "x", "c", "d"]
            .into_iter()
            .map(|c| rule.classify_names([c]).is_match())
            .collect();
        assert_eq!(verdicts.iter().filter(|m| **m).count(), 4);
        assert!(!verdicts[2]);
    }

    #[test]
    fn entries_are_normalized() {
        let rule = ClassificationRule::new(&["  Bacteria ", ""], NONE);
        assert!(rule.has_include());
        assert!(!rule.has_exclude());
        assert!(rule.classify_names(["bacteria"]).is_match());
    }

    #[test]
    fn classifies_parsed_records_by_lineage() {
        let record = Record::from_text(
            "LOCUS       A1\n  ORGANISM  Bacillus subtilis\n            Bacteria; Bacillota.\n//\n",
        );
        let rule = ClassificationRule::new(&["bacillota"], NONE);
        assert_eq!(rule.classify(&record), Classification::Included);
    }
}
