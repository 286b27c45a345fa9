use std::path::{Path, PathBuf};
use std::sync::Mutex;

use assert_matches::assert_matches;
use rand::SeedableRng;
use rand::rngs::StdRng;

use bio_jarvis::aggregator::FieldAggregator;
use bio_jarvis::app::{App, OrganismQuery};
use bio_jarvis::attributes::AttributeTables;
use bio_jarvis::domain::{Language, OrganismInfo, TaxId};
use bio_jarvis::entrez::SequenceRecordProvider;
use bio_jarvis::error::JarvisError;
use bio_jarvis::genome::GenomeSizeExtractor;
use bio_jarvis::report::{ReportGenerator, StyleReferences};
use bio_jarvis::resolver::ResolverOptions;
use bio_jarvis::taxonomy::NcbiTaxonomy;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

struct NoRecords;

impl SequenceRecordProvider for NoRecords {
    fn search(
        &self,
        _database: &str,
        _query: &str,
        _max_results: usize,
    ) -> Result<Vec<String>, JarvisError> {
        Ok(Vec::new())
    }

    fn fetch(&self, record_id: &str) -> Result<String, JarvisError> {
        Err(JarvisError::EntrezHttp(format!("unexpected fetch of {record_id}")))
    }
}

#[derive(Default)]
struct MockGenerator {
    calls: Mutex<Vec<(OrganismInfo, usize, Language)>>,
}

impl ReportGenerator for MockGenerator {
    fn generate(
        &self,
        organism: &OrganismInfo,
        references: &[String],
        language: Language,
    ) -> Result<String, JarvisError> {
        self.calls
            .lock()
            .unwrap()
            .push((organism.clone(), references.len(), language));
        Ok(format!(
            "{} report",
            organism.name.as_deref().unwrap_or_default()
        ))
    }
}

fn app() -> App<NcbiTaxonomy, NoRecords, MockGenerator> {
    let taxonomy = NcbiTaxonomy::load(&fixtures().join("taxdump")).unwrap();
    let tables = AttributeTables::load(
        &fixtures().join("acronyms.csv"),
        &fixtures().join("data_for_biojarvis.csv"),
    )
    .unwrap();
    let aggregator = FieldAggregator::new(
        taxonomy,
        tables,
        GenomeSizeExtractor::new(NoRecords),
        ResolverOptions::default(),
    );
    let references = StyleReferences::load(&fixtures().join("old_reports.csv")).unwrap();
    App::new(aggregator, references, MockGenerator::default())
}

#[test]
fn taxid_query_passes_through() {
    let id = app()
        .resolve_tax_id(&OrganismQuery::TaxId(TaxId::new(424242)))
        .unwrap();
    assert_eq!(id, TaxId::new(424242));
}

#[test]
fn name_query_resolves_case_insensitively() {
    let id = app()
        .resolve_tax_id(&OrganismQuery::Name(
            "  human immunodeficiency virus 1 ".to_string(),
        ))
        .unwrap();
    assert_eq!(id, TaxId::new(11676));
}

#[test]
fn ambiguous_name_takes_first_candidate() {
    let id = app()
        .resolve_tax_id(&OrganismQuery::Name("Lentivirus".to_string()))
        .unwrap();
    assert_eq!(id, TaxId::new(11646));
}

#[test]
fn name_query_errors() {
    let app = app();
    let err = app
        .resolve_tax_id(&OrganismQuery::Name(" ".to_string()))
        .unwrap_err();
    assert_matches!(err, JarvisError::EmptyOrganismName);

    let err = app
        .resolve_tax_id(&OrganismQuery::Name("Unobtainium virus".to_string()))
        .unwrap_err();
    assert_matches!(err, JarvisError::NameNotFound(ref name) if name == "Unobtainium virus");
}

#[test]
fn report_uses_aggregated_record_and_two_references() {
    let app = app();
    let mut rng = StdRng::seed_from_u64(42);
    let result = app
        .generate_report(TaxId::new(2697049), Language::Portuguese, &mut rng)
        .unwrap();
    assert_eq!(result.tax_id, TaxId::new(2697049));
    assert_eq!(
        result.report,
        "Severe acute respiratory syndrome coronavirus 2 report"
    );
    assert_eq!(result.organism.acronym.as_deref(), Some("SARS-CoV-2"));
    assert_eq!(result.organism.size, None);
    assert!(!result.generated_at.is_empty());

    let calls = app.generator().calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, 2);
    assert_eq!(calls[0].2, Language::Portuguese);
}

#[test]
fn unknown_taxid_never_reaches_generator() {
    let app = app();
    let mut rng = StdRng::seed_from_u64(42);
    let err = app
        .generate_report(TaxId::new(424242), Language::English, &mut rng)
        .unwrap_err();
    assert_matches!(err, JarvisError::TaxonNotFound(_));
    assert!(app.generator().calls.lock().unwrap().is_empty());
}

#[test]
fn organism_info_matches_aggregation() {
    let info = app().organism_info(TaxId::new(11676)).unwrap();
    assert_eq!(info.diseases.as_deref(), Some("AIDS"));
    assert_eq!(info.transmissions.as_deref(), Some("Sexual contact; blood"));
}
