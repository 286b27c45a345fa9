use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::attributes::AttributeTable;
use crate::domain::{AttributeField, TaxId};
use crate::error::JarvisError;
use crate::taxonomy::{DescendantBudget, TaxonomyStore};

#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    pub descendant_budget: DescendantBudget,
    pub transitive_merges: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            descendant_budget: DescendantBudget::default(),
            transitive_merges: true,
        }
    }
}

/// The row keyed by the taxid wins. Otherwise the first row in table order
/// keyed by a merged predecessor, child or descendant is used.
pub struct CascadingResolver<'a, T: TaxonomyStore + ?Sized> {
    taxonomy: &'a T,
    options: ResolverOptions,
}

impl<'a, T: TaxonomyStore + ?Sized> CascadingResolver<'a, T> {
    pub fn new(taxonomy: &'a T, options: ResolverOptions) -> Self {
        Self { taxonomy, options }
    }

    pub fn resolve(
        &self,
        table: &AttributeTable,
        id: &str,
        field: AttributeField,
    ) -> Result<Option<String>, JarvisError> {
        let tax_id: TaxId = id.parse()?;
        self.resolve_taxid(table, tax_id, field)
    }

    pub fn resolve_taxid(
        &self,
        table: &AttributeTable,
        tax_id: TaxId,
        field: AttributeField,
    ) -> Result<Option<String>, JarvisError> {
        if let Some(value) = self.direct(table, tax_id, field) {
            debug!(%tax_id, %field, "resolved from direct row");
            return Ok(Some(value.to_string()));
        }

        let candidates = self.candidates(tax_id);
        if candidates.is_empty() {
            debug!(%tax_id, %field, "no related taxa to widen to");
            return Ok(None);
        }

        // First related row in table order; lineage distance is not considered.
        let matched = table
            .records()
            .find(|record| candidates.contains(record.tax_id.as_str()));
        match matched {
            Some(record) => {
                let value = record.get(field).map(str::to_string);
                debug!(
                    %tax_id,
                    %field,
                    via = %record.tax_id,
                    found = value.is_some(),
                    "resolved from related taxon"
                );
                Ok(value)
            }
            None => {
                debug!(%tax_id, %field, candidates = candidates.len(), "no related taxon in table");
                Ok(None)
            }
        }
    }

    pub fn direct<'t>(
        &self,
        table: &'t AttributeTable,
        tax_id: TaxId,
        field: AttributeField,
    ) -> Option<&'t str> {
        table
            .get(&tax_id.to_string())
            .and_then(|record| record.get(field))
    }

    fn candidates(&self, tax_id: TaxId) -> HashSet<String> {
        let mut related = BTreeSet::new();
        related.extend(self.merged_predecessors(tax_id));
        related.extend(self.taxonomy.children(tax_id));
        match self
            .taxonomy
            .descendants(tax_id, &self.options.descendant_budget)
        {
            Ok(descendants) => related.extend(descendants),
            Err(err) => warn!(%tax_id, error = %err, "descendant enumeration abandoned"),
        }
        related.remove(&tax_id);
        related.into_iter().map(|id| id.to_string()).collect()
    }

    fn merged_predecessors(&self, tax_id: TaxId) -> BTreeSet<TaxId> {
        let mut found = self.taxonomy.merged_predecessors(tax_id);
        if !self.options.transitive_merges {
            return found;
        }
        let mut frontier: Vec<TaxId> = found.iter().copied().collect();
        while let Some(old) = frontier.pop() {
            for older in self.taxonomy.merged_predecessors(old) {
                if older != tax_id && found.insert(older) {
                    frontier.push(older);
                }
            }
        }
        found
    }
}
