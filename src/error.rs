use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::TaxId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Transient,
    Malformed,
    InvalidInput,
    Environment,
}

#[derive(Debug, Error, Diagnostic)]
pub enum JarvisError {
    #[error("invalid taxonomy identifier: {0}")]
    InvalidTaxId(String),

    #[error("organism name must not be empty")]
    EmptyOrganismName,

    #[error("taxon not found in taxonomy: {0}")]
    TaxonNotFound(TaxId),

    #[error("no taxon matches organism name: {0}")]
    NameNotFound(String),

    #[error("descendant enumeration of {taxid} exceeded {limit} nodes")]
    DescendantLimit { taxid: TaxId, limit: usize },

    #[error("descendant enumeration of {taxid} timed out after {elapsed_ms} ms")]
    DescendantTimeout { taxid: TaxId, elapsed_ms: u128 },

    #[error("failed to parse {file} at line {line}: {message}")]
    TaxonomyParse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("taxonomy file missing: {0}")]
    TaxonomyMissing(PathBuf),

    #[error("failed to load attribute table {path}: {message}")]
    AttributeTable { path: String, message: String },

    #[error("NCBI E-utilities request failed: {0}")]
    EntrezHttp(String),

    #[error("NCBI E-utilities returned status {status}: {message}")]
    EntrezStatus { status: u16, message: String },

    #[error("malformed sequence record {record_id}: {reason}")]
    MalformedRecord { record_id: String, reason: String },

    #[error("report service request failed: {0}")]
    ReportHttp(String),

    #[error("report service returned status {status}: {message}")]
    ReportStatus { status: u16, message: String },

    #[error("unexpected report service response: {0}")]
    ReportResponse(String),

    #[error("organism record has no name and cannot be reported")]
    UnusableRecord,

    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl JarvisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JarvisError::TaxonNotFound(_) | JarvisError::NameNotFound(_) => ErrorKind::NotFound,
            JarvisError::DescendantLimit { .. }
            | JarvisError::DescendantTimeout { .. }
            | JarvisError::EntrezHttp(_)
            | JarvisError::EntrezStatus { .. }
            | JarvisError::ReportHttp(_)
            | JarvisError::ReportStatus { .. } => ErrorKind::Transient,
            JarvisError::TaxonomyParse { .. }
            | JarvisError::MalformedRecord { .. }
            | JarvisError::ReportResponse(_) => ErrorKind::Malformed,
            JarvisError::InvalidTaxId(_)
            | JarvisError::EmptyOrganismName
            | JarvisError::UnusableRecord => ErrorKind::InvalidInput,
            JarvisError::TaxonomyMissing(_)
            | JarvisError::AttributeTable { .. }
            | JarvisError::MissingCredential(_)
            | JarvisError::ConfigRead(_)
            | JarvisError::ConfigParse(_)
            | JarvisError::Filesystem(_) => ErrorKind::Environment,
        }
    }
}
