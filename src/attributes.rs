use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::domain::{AttributeField, non_blank};
use crate::error::JarvisError;

const TAXID_COLUMN: &str = "TaxID";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRecord {
    pub tax_id: String,
    pub acronym: Option<String>,
    pub diseases: Option<String>,
    pub transmissions: Option<String>,
    pub hosts: Option<String>,
}

impl AttributeRecord {
    pub fn new(tax_id: impl Into<String>) -> Self {
        Self {
            tax_id: tax_id.into(),
            ..Self::default()
        }
    }

    pub fn with(mut self, field: AttributeField, value: impl Into<String>) -> Self {
        let value = non_blank(Some(value.into()));
        match field {
            AttributeField::Acronym => self.acronym = value,
            AttributeField::Diseases => self.diseases = value,
            AttributeField::Transmissions => self.transmissions = value,
            AttributeField::Hosts => self.hosts = value,
        }
        self
    }

    pub fn get(&self, field: AttributeField) -> Option<&str> {
        match field {
            AttributeField::Acronym => self.acronym.as_deref(),
            AttributeField::Diseases => self.diseases.as_deref(),
            AttributeField::Transmissions => self.transmissions.as_deref(),
            AttributeField::Hosts => self.hosts.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    records: Vec<AttributeRecord>,
    index: HashMap<String, usize>,
}

impl AttributeTable {
    pub fn from_records(records: impl IntoIterator<Item = AttributeRecord>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.push(record);
        }
        table
    }

    pub fn load(path: &Path) -> Result<Self, JarvisError> {
        let file = File::open(path).map_err(|err| JarvisError::AttributeTable {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        info!(rows = table.len(), "attribute table loaded from {}", path.display());
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self, JarvisError> {
        let table_error = |message: String| JarvisError::AttributeTable {
            path: source.to_string(),
            message,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| table_error(err.to_string()))?
            .clone();
        let column = |name: &str| headers.iter().position(|header| header.trim() == name);
        let taxid_idx = column(TAXID_COLUMN)
            .ok_or_else(|| table_error(format!("missing {TAXID_COLUMN} column")))?;
        let field_columns: Vec<(AttributeField, usize)> = AttributeField::ALL
            .iter()
            .filter_map(|field| column(field.column()).map(|idx| (*field, idx)))
            .collect();

        let mut table = Self::default();
        for (idx, row) in reader.records().enumerate() {
            let row = row.map_err(|err| table_error(format!("row {}: {err}", idx + 1)))?;
            let Some(tax_id) = row.get(taxid_idx).map(str::trim).filter(|v| !v.is_empty()) else {
                warn!(source, row = idx + 1, "skipping row without {TAXID_COLUMN}");
                continue;
            };
            let mut record = AttributeRecord::new(tax_id);
            for (field, col) in &field_columns {
                if let Some(value) = row.get(*col) {
                    record = record.with(*field, value);
                }
            }
            table.push(record);
        }
        Ok(table)
    }

    fn push(&mut self, record: AttributeRecord) {
        if self.index.contains_key(&record.tax_id) {
            warn!(tax_id = %record.tax_id, "duplicate attribute row ignored");
            return;
        }
        self.index.insert(record.tax_id.clone(), self.records.len());
        self.records.push(record);
    }

    pub fn get(&self, tax_id: &str) -> Option<&AttributeRecord> {
        self.index.get(tax_id).map(|idx| &self.records[*idx])
    }

    pub fn records(&self) -> impl Iterator<Item = &AttributeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttributeTables {
    pub acronyms: AttributeTable,
    pub clinical: AttributeTable,
}

impl AttributeTables {
    pub fn load(acronyms: &Path, clinical: &Path) -> Result<Self, JarvisError> {
        Ok(Self {
            acronyms: AttributeTable::load(acronyms)?,
            clinical: AttributeTable::load(clinical)?,
        })
    }

    pub fn table_for(&self, field: AttributeField) -> &AttributeTable {
        match field {
            AttributeField::Acronym => &self.acronyms,
            AttributeField::Diseases | AttributeField::Transmissions | AttributeField::Hosts => {
                &self.clinical
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_keep_order_and_drop_blank_cells() {
        let csv = "TaxID,Diseases,Transmissions,Hosts\n\
                   11676,AIDS,,Humans\n\
                   9606,, ,\n\
                   11676,duplicate,,\n";
        let table = AttributeTable::from_reader(csv.as_bytes(), "inline").unwrap();
        assert_eq!(table.len(), 2);
        let hiv = table.get("11676").unwrap();
        assert_eq!(hiv.get(AttributeField::Diseases), Some("AIDS"));
        assert_eq!(hiv.get(AttributeField::Transmissions), None);
        assert_eq!(hiv.get(AttributeField::Acronym), None);
        let ids: Vec<&str> = table.records().map(|r| r.tax_id.as_str()).collect();
        assert_eq!(ids, vec!["11676", "9606"]);
    }

    #[test]
    fn missing_taxid_column_is_an_error() {
        let err = AttributeTable::from_reader("Acronym\nHs\n".as_bytes(), "inline").unwrap_err();
        assert!(err.to_string().contains("TaxID"));
    }
}
