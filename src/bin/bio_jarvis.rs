use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use bio_jarvis::aggregator::FieldAggregator;
use bio_jarvis::app::{App, OrganismQuery};
use bio_jarvis::attributes::AttributeTables;
use bio_jarvis::config::{ConfigLoader, ResolvedConfig};
use bio_jarvis::domain::{Language, OrganismInfo, ReportFormat, TaxId};
use bio_jarvis::entrez::EntrezHttpClient;
use bio_jarvis::error::{ErrorKind, JarvisError};
use bio_jarvis::genome::GenomeSizeExtractor;
use bio_jarvis::output::{JsonOutput, save_report};
use bio_jarvis::report::{GeminiHttpClient, ReportGenerator, StyleReferences};
use bio_jarvis::taxonomy::NcbiTaxonomy;

#[derive(Parser)]
#[command(name = "bio-jarvis")]
#[command(about = "Clinical organism report from an NCBI TaxID or scientific name")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    target: Target,

    #[arg(short, long, value_enum, default_value_t = Language::English)]
    language: Language,

    #[arg(short, long, help = "Directory to save the report file")]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
    format: ReportFormat,

    #[arg(short, long, help = "Text-generation model; overrides report.model")]
    model: Option<String>,

    #[arg(long, help = "Path to bio-jarvis.json")]
    config: Option<String>,

    #[arg(long, help = "Print the resolved organism record and skip report generation")]
    info_only: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    #[arg(short = 't', long, help = "NCBI TaxID of the organism")]
    taxid: Option<String>,

    #[arg(short = 'n', long, help = "Scientific name of the organism")]
    organism_name: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<JarvisError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &JarvisError) -> u8 {
    match error.kind() {
        ErrorKind::NotFound => 2,
        ErrorKind::Transient => 3,
        ErrorKind::InvalidInput => 4,
        ErrorKind::Malformed | ErrorKind::Environment => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let query = match (&cli.target.taxid, &cli.target.organism_name) {
        (Some(taxid), _) => OrganismQuery::TaxId(taxid.parse::<TaxId>()?),
        (None, Some(name)) => OrganismQuery::Name(name.clone()),
        (None, None) => return Err(miette::Report::msg("--taxid or --organism-name is required")),
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    config.override_model(cli.model.as_deref());
    let aggregator = build_aggregator(&config)?;

    if cli.info_only {
        let app = App::new(aggregator, StyleReferences::default(), NopGenerator);
        let tax_id = app.resolve_tax_id(&query)?;
        let info = app.organism_info(tax_id)?;
        JsonOutput::print_info(&info).into_diagnostic()?;
        return Ok(());
    }

    let references = StyleReferences::load(config.style_references_path.as_std_path())?;
    let generator = GeminiHttpClient::from_env(
        &config.report.api_key_env,
        config.report.generation.clone(),
    )?;
    let app = App::new(aggregator, references, generator);
    let tax_id = app.resolve_tax_id(&query)?;
    let result = app.generate_report(tax_id, cli.language, &mut rand::thread_rng())?;

    if let Some(dir) = &cli.output {
        let path = save_report(dir, &result, cli.format)?;
        eprintln!("report saved to {}", path.display());
    }
    match cli.format {
        ReportFormat::Json => JsonOutput::print_report(&result).into_diagnostic()?,
        ReportFormat::Txt => println!("{}", result.report),
    }
    Ok(())
}

fn build_aggregator(
    config: &ResolvedConfig,
) -> Result<FieldAggregator<NcbiTaxonomy, EntrezHttpClient>, JarvisError> {
    let taxonomy = NcbiTaxonomy::load(config.taxonomy_path.as_std_path())?;
    let tables = AttributeTables::load(
        config.acronyms_path.as_std_path(),
        config.clinical_path.as_std_path(),
    )?;
    let entrez = EntrezHttpClient::new(&config.entrez.settings())?;
    let genome = GenomeSizeExtractor::new(entrez)
        .with_max_records(config.entrez.max_records)
        .with_search_filters(config.entrez.search_filters.clone());
    Ok(FieldAggregator::new(
        taxonomy,
        tables,
        genome,
        config.resolver,
    ))
}

struct NopGenerator;

impl ReportGenerator for NopGenerator {
    fn generate(
        &self,
        _organism: &OrganismInfo,
        _references: &[String],
        _language: Language,
    ) -> Result<String, JarvisError> {
        Err(JarvisError::ReportHttp(
            "report generator not configured".to_string(),
        ))
    }
}
