use std::fs;

use tempfile::tempdir;

use bio_jarvis::app::ReportResult;
use bio_jarvis::domain::{Language, OrganismInfo, ReportFormat, TaxId};
use bio_jarvis::output::{report_path, save_report};

fn result(report: &str) -> ReportResult {
    ReportResult {
        tax_id: TaxId::new(11676),
        organism: OrganismInfo {
            name: Some("Human immunodeficiency virus 1".to_string()),
            acronym: Some("HIV-1".to_string()),
            ..OrganismInfo::default()
        },
        language: Language::English,
        report: report.to_string(),
        generated_at: "2026-01-01T00:00:00+00:00".to_string(),
    }
}

#[test]
fn report_path_uses_taxid_and_extension() {
    let dir = tempdir().unwrap();
    let path = report_path(dir.path(), &result("text"), ReportFormat::Txt);
    assert_eq!(path, dir.path().join("11676_report.txt"));
}

#[test]
fn saves_json_report() {
    let dir = tempdir().unwrap();
    let path = save_report(dir.path(), &result("HIV-1 is a lentivirus."), ReportFormat::Json).unwrap();
    assert_eq!(path, dir.path().join("11676_report.json"));

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["tax_id"], 11676);
    assert_eq!(saved["language"], "english");
    assert_eq!(saved["report"], "HIV-1 is a lentivirus.");
    assert_eq!(saved["organism"]["Acronym"], "HIV-1");
    assert!(saved["organism"].get("Diseases").is_none());
}

#[test]
fn txt_report_replaces_previous_file() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("reports");
    save_report(&nested, &result("first draft"), ReportFormat::Txt).unwrap();
    let path = save_report(&nested, &result("second draft"), ReportFormat::Txt).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "second draft\n");
    assert_eq!(fs::read_dir(&nested).unwrap().count(), 1);
}
