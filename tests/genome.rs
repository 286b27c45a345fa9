use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;

use bio_jarvis::entrez::SequenceRecordProvider;
use bio_jarvis::error::JarvisError;
use bio_jarvis::genome::{GenomeSizeExtractor, parse_locus_length};

fn genbank(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/genbank")
        .join(name);
    fs::read_to_string(path).unwrap()
}

#[derive(Default)]
struct MockProvider {
    ids: Vec<String>,
    records: HashMap<String, String>,
    fail_search: bool,
    searches: Mutex<Vec<(String, String, usize)>>,
    fetches: Mutex<Vec<String>>,
}

impl MockProvider {
    fn with_record(mut self, id: &str, text: String) -> Self {
        self.ids.push(id.to_string());
        self.records.insert(id.to_string(), text);
        self
    }

    fn with_missing(mut self, id: &str) -> Self {
        self.ids.push(id.to_string());
        self
    }
}

impl SequenceRecordProvider for MockProvider {
    fn search(
        &self,
        database: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<String>, JarvisError> {
        self.searches
            .lock()
            .unwrap()
            .push((database.to_string(), query.to_string(), max_results));
        if self.fail_search {
            return Err(JarvisError::EntrezStatus {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(self.ids.clone())
    }

    fn fetch(&self, record_id: &str) -> Result<String, JarvisError> {
        self.fetches.lock().unwrap().push(record_id.to_string());
        self.records
            .get(record_id)
            .cloned()
            .ok_or_else(|| JarvisError::EntrezHttp(format!("no record {record_id}")))
    }
}

#[test]
fn skips_record_without_locus_length() {
    let provider = MockProvider::default()
        .with_record("MN000000", genbank("truncated.gb"))
        .with_record("NC_045512", genbank("NC_045512.gb"));
    let extractor = GenomeSizeExtractor::new(provider);
    let size = extractor
        .extract_size("Severe acute respiratory syndrome coronavirus 2")
        .unwrap();
    assert_eq!(size, Some(29903));
}

#[test]
fn skips_failed_fetch_and_stops_at_first_hit() {
    let provider = MockProvider::default()
        .with_missing("GONE_1")
        .with_record("NC_045512", genbank("NC_045512.gb"))
        .with_record("NC_999999", genbank("NC_045512.gb"));
    let extractor = GenomeSizeExtractor::new(provider);
    assert_eq!(extractor.extract_size("SARS-CoV-2").unwrap(), Some(29903));
    let fetched = extractor.provider().fetches.lock().unwrap().clone();
    assert_eq!(fetched, vec!["GONE_1", "NC_045512"]);
}

#[test]
fn no_usable_candidate_is_none() {
    let provider = MockProvider::default().with_record("MN000000", genbank("truncated.gb"));
    let extractor = GenomeSizeExtractor::new(provider);
    assert_eq!(extractor.extract_size("Orphan virus X").unwrap(), None);

    let empty = GenomeSizeExtractor::new(MockProvider::default());
    assert_eq!(empty.extract_size("Orphan virus X").unwrap(), None);
}

#[test]
fn empty_name_is_rejected_before_searching() {
    let extractor = GenomeSizeExtractor::new(MockProvider::default());
    let err = extractor.extract_size("   ").unwrap_err();
    assert_matches!(err, JarvisError::EmptyOrganismName);
    assert!(extractor.provider().searches.lock().unwrap().is_empty());
}

#[test]
fn search_failure_propagates() {
    let provider = MockProvider {
        fail_search: true,
        ..MockProvider::default()
    };
    let err = GenomeSizeExtractor::new(provider)
        .extract_size("Homo sapiens")
        .unwrap_err();
    assert_matches!(err, JarvisError::EntrezStatus { status: 503, .. });
}

#[test]
fn search_uses_organism_term_and_record_cap() {
    let extractor = GenomeSizeExtractor::new(MockProvider::default())
        .with_max_records(5)
        .with_search_filters("complete genome");
    extractor.extract_size("Human immunodeficiency virus 1").unwrap();
    let searches = extractor.provider().searches.lock().unwrap().clone();
    assert_eq!(
        searches,
        vec![(
            "nucleotide".to_string(),
            "\"Human immunodeficiency virus 1\"[Organism] AND complete genome".to_string(),
            5
        )]
    );
}

#[test]
fn candidates_beyond_cap_are_not_fetched() {
    let provider = MockProvider::default()
        .with_missing("A")
        .with_missing("B")
        .with_record("C", genbank("NC_045512.gb"));
    let extractor = GenomeSizeExtractor::new(provider).with_max_records(2);
    assert_eq!(extractor.extract_size("SARS-CoV-2").unwrap(), None);
    assert_eq!(extractor.provider().fetches.lock().unwrap().len(), 2);
}

#[test]
fn locus_length_from_fixture() {
    assert_eq!(
        parse_locus_length("NC_045512", &genbank("NC_045512.gb")).unwrap(),
        29903
    );
    let err = parse_locus_length("MN000000", &genbank("truncated.gb")).unwrap_err();
    assert_matches!(err, JarvisError::MalformedRecord { ref record_id, .. } if record_id == "MN000000");
}
