use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::entrez::{NUCLEOTIDE_DB, SequenceRecordProvider};
use crate::error::JarvisError;

pub const DEFAULT_MAX_RECORDS: usize = 20;
pub const DEFAULT_SEARCH_FILTERS: &str = "\"complete genome\"[Title] AND refseq[Filter]";

static LOCUS_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^LOCUS\s+\S+\s+(\d+)\s+bp\b").expect("LOCUS pattern compiles")
});

pub struct GenomeSizeExtractor<P: SequenceRecordProvider> {
    provider: P,
    max_records: usize,
    search_filters: String,
}

impl<P: SequenceRecordProvider> GenomeSizeExtractor<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            max_records: DEFAULT_MAX_RECORDS,
            search_filters: DEFAULT_SEARCH_FILTERS.to_string(),
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_search_filters(mut self, filters: impl Into<String>) -> Self {
        self.search_filters = filters.into();
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn search_term(&self, scientific_name: &str) -> String {
        let name = scientific_name.trim().replace('"', "");
        let filters = self.search_filters.trim();
        if filters.is_empty() {
            format!("\"{name}\"[Organism]")
        } else {
            format!("\"{name}\"[Organism] AND {filters}")
        }
    }

    /// Scans candidates in provider order and stops at the first parsable
    /// LOCUS length. A candidate that fails to fetch or parse is skipped.
    ///
    /// Errors only for an empty name or a failed search.
    pub fn extract_size(&self, scientific_name: &str) -> Result<Option<u64>, JarvisError> {
        if scientific_name.trim().is_empty() {
            return Err(JarvisError::EmptyOrganismName);
        }
        let term = self.search_term(scientific_name);
        let candidates = self
            .provider
            .search(NUCLEOTIDE_DB, &term, self.max_records)?;
        debug!(%term, candidates = candidates.len(), "sequence search finished");

        for record_id in candidates.iter().take(self.max_records) {
            let text = match self.provider.fetch(record_id) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%record_id, error = %err, "skipping record: fetch failed");
                    continue;
                }
            };
            match parse_locus_length(record_id, &text) {
                Ok(length) => {
                    debug!(%record_id, length, "genome size resolved");
                    return Ok(Some(length));
                }
                Err(err) => warn!(%record_id, error = %err, "skipping record: no LOCUS length"),
            }
        }
        Ok(None)
    }
}

pub fn parse_locus_length(record_id: &str, text: &str) -> Result<u64, JarvisError> {
    let malformed = |reason: &str| JarvisError::MalformedRecord {
        record_id: record_id.to_string(),
        reason: reason.to_string(),
    };
    let captures = LOCUS_LENGTH
        .captures(text)
        .ok_or_else(|| malformed("no LOCUS line with a bp length"))?;
    captures[1]
        .parse::<u64>()
        .map_err(|err| malformed(&format!("invalid length: {err}")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_genbank_locus_line() {
        let text = "LOCUS       NC_045512              29903 bp ss-RNA     linear   VRL 18-JUL-2020\n\
                    DEFINITION  Severe acute respiratory syndrome coronavirus 2 isolate Wuhan-Hu-1.\n";
        assert_eq!(parse_locus_length("1798174254", text).unwrap(), 29903);
    }

    #[test]
    fn protein_locus_is_not_a_genome_length() {
        let text = "LOCUS       YP_009724390            1273 aa            linear   VRL 18-JUL-2020\n";
        assert_matches!(
            parse_locus_length("x", text),
            Err(JarvisError::MalformedRecord { .. })
        );
    }

    #[test]
    fn locus_must_start_a_line() {
        let text = "COMMENT     see LOCUS ABC 100 bp elsewhere\n";
        assert!(parse_locus_length("x", text).is_err());
    }

    #[test]
    fn overflowing_length_is_malformed() {
        let text = "LOCUS       X 99999999999999999999999 bp DNA\n";
        assert_matches!(
            parse_locus_length("x", text),
            Err(JarvisError::MalformedRecord { .. })
        );
    }
}
