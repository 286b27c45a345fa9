use std::panic;
use std::thread::{self, ScopedJoinHandle};

use tracing::{debug, warn};

use crate::attributes::AttributeTables;
use crate::domain::{AttributeField, OrganismInfo, TaxId, non_blank};
use crate::entrez::SequenceRecordProvider;
use crate::error::JarvisError;
use crate::genome::GenomeSizeExtractor;
use crate::resolver::{CascadingResolver, ResolverOptions};
use crate::taxonomy::{RANK_FAMILY, RANK_GENUS, TaxonomyStore};

pub struct FieldAggregator<T: TaxonomyStore, P: SequenceRecordProvider> {
    taxonomy: T,
    tables: AttributeTables,
    genome: GenomeSizeExtractor<P>,
    options: ResolverOptions,
}

impl<T: TaxonomyStore, P: SequenceRecordProvider> FieldAggregator<T, P> {
    pub fn new(
        taxonomy: T,
        tables: AttributeTables,
        genome: GenomeSizeExtractor<P>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            taxonomy,
            tables,
            genome,
            options,
        }
    }

    pub fn taxonomy(&self) -> &T {
        &self.taxonomy
    }

    pub fn resolver(&self) -> CascadingResolver<'_, T> {
        CascadingResolver::new(&self.taxonomy, self.options)
    }

    pub fn aggregate(&self, tax_id: TaxId) -> Result<OrganismInfo, JarvisError> {
        let current = self
            .taxonomy
            .current_id(tax_id)
            .ok_or(JarvisError::TaxonNotFound(tax_id))?;
        let name = self
            .taxonomy
            .name_of(&[current])
            .remove(&current)
            .and_then(|name| non_blank(Some(name)))
            .ok_or(JarvisError::TaxonNotFound(tax_id))?;
        debug!(%tax_id, %current, %name, "aggregating organism fields");

        let resolver = self.resolver();
        let info = thread::scope(|scope| {
            let size = scope.spawn(|| self.genome_size(&name));
            let family = scope.spawn(|| self.rank_name(current, RANK_FAMILY));
            let genus = scope.spawn(|| self.rank_name(current, RANK_GENUS));
            let fields: Vec<(AttributeField, ScopedJoinHandle<'_, Option<String>>)> =
                AttributeField::ALL
                    .iter()
                    .map(|field| {
                        let field = *field;
                        let resolver = &resolver;
                        (
                            field,
                            scope.spawn(move || {
                                self.resolve_field(resolver, tax_id, current, field)
                            }),
                        )
                    })
                    .collect();

            let mut info = OrganismInfo {
                name: Some(name.clone()),
                size: join(size),
                family: join(family),
                genus: join(genus),
                ..OrganismInfo::default()
            };
            for (field, handle) in fields {
                let value = join(handle);
                match field {
                    AttributeField::Acronym => info.acronym = value,
                    AttributeField::Diseases => info.diseases = value,
                    AttributeField::Transmissions => info.transmissions = value,
                    AttributeField::Hosts => info.hosts = value,
                }
            }
            info
        });
        Ok(info.normalized())
    }

    // A merged-away id keeps its own row ahead of anything found by widening
    // from the live node.
    fn resolve_field(
        &self,
        resolver: &CascadingResolver<'_, T>,
        tax_id: TaxId,
        current: TaxId,
        field: AttributeField,
    ) -> Option<String> {
        let table = self.tables.table_for(field);
        if tax_id != current
            && let Some(value) = resolver.direct(table, tax_id, field)
        {
            debug!(%tax_id, %current, %field, "resolved from row of merged id");
            return Some(value.to_string());
        }
        match resolver.resolve_taxid(table, current, field) {
            Ok(value) => value,
            Err(err) => {
                warn!(%tax_id, %field, error = %err, "field resolution failed");
                None
            }
        }
    }

    fn rank_name(&self, tax_id: TaxId, rank: &str) -> Option<String> {
        match self.taxonomy.rank_name(tax_id, rank) {
            Ok(value) => value,
            Err(err) => {
                warn!(%tax_id, rank, error = %err, "rank lookup failed");
                None
            }
        }
    }

    fn genome_size(&self, name: &str) -> Option<u64> {
        match self.genome.extract_size(name) {
            Ok(size) => size,
            Err(err) => {
                warn!(name, error = %err, "genome size lookup failed");
                None
            }
        }
    }
}

fn join<V>(handle: ScopedJoinHandle<'_, V>) -> V {
    handle
        .join()
        .unwrap_or_else(|payload| panic::resume_unwind(payload))
}
