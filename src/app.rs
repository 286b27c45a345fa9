use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::FieldAggregator;
use crate::domain::{Language, OrganismInfo, TaxId};
use crate::entrez::SequenceRecordProvider;
use crate::error::JarvisError;
use crate::report::{REFERENCE_SAMPLE_SIZE, ReportGenerator, StyleReferences};
use crate::taxonomy::TaxonomyStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganismQuery {
    TaxId(TaxId),
    Name(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportResult {
    pub tax_id: TaxId,
    pub organism: OrganismInfo,
    pub language: Language,
    pub report: String,
    pub generated_at: String,
}

pub struct App<T: TaxonomyStore, P: SequenceRecordProvider, G: ReportGenerator> {
    aggregator: FieldAggregator<T, P>,
    references: StyleReferences,
    generator: G,
}

impl<T: TaxonomyStore, P: SequenceRecordProvider, G: ReportGenerator> App<T, P, G> {
    pub fn new(aggregator: FieldAggregator<T, P>, references: StyleReferences, generator: G) -> Self {
        Self {
            aggregator,
            references,
            generator,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn resolve_tax_id(&self, query: &OrganismQuery) -> Result<TaxId, JarvisError> {
        let name = match query {
            OrganismQuery::TaxId(id) => return Ok(*id),
            OrganismQuery::Name(name) => name.trim(),
        };
        if name.is_empty() {
            return Err(JarvisError::EmptyOrganismName);
        }
        let candidates = self.aggregator.taxonomy().name_to_ids(name);
        let first = *candidates
            .first()
            .ok_or_else(|| JarvisError::NameNotFound(name.to_string()))?;
        if candidates.len() > 1 {
            warn!(name, chosen = %first, candidates = candidates.len(), "ambiguous organism name");
        }
        info!(name, tax_id = %first, "organism name resolved");
        Ok(first)
    }

    pub fn organism_info(&self, tax_id: TaxId) -> Result<OrganismInfo, JarvisError> {
        self.aggregator.aggregate(tax_id)
    }

    pub fn generate_report<R: Rng + ?Sized>(
        &self,
        tax_id: TaxId,
        language: Language,
        rng: &mut R,
    ) -> Result<ReportResult, JarvisError> {
        let organism = self.organism_info(tax_id)?;
        if !organism.is_usable() {
            return Err(JarvisError::UnusableRecord);
        }
        let references = self.references.sample(rng, REFERENCE_SAMPLE_SIZE);
        info!(%tax_id, %language, references = references.len(), "generating report");
        let report = self.generator.generate(&organism, &references, language)?;
        Ok(ReportResult {
            tax_id,
            organism,
            language,
            report,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
