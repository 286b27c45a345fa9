use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::entrez::EntrezSettings;
use crate::error::JarvisError;
use crate::genome::{DEFAULT_MAX_RECORDS, DEFAULT_SEARCH_FILTERS};
use crate::report::GenerationSettings;
use crate::resolver::ResolverOptions;
use crate::taxonomy::DescendantBudget;

pub const CONFIG_FILE: &str = "bio-jarvis.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub taxonomy_path: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub files: FilesSection,
    #[serde(default)]
    pub entrez: EntrezSection,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FilesSection {
    #[serde(default)]
    pub acronyms: Option<String>,
    #[serde(default)]
    pub clinical: Option<String>,
    #[serde(default)]
    pub style_references: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EntrezSection {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub max_records: Option<usize>,
    #[serde(default)]
    pub search_filters: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ResolverSection {
    #[serde(default)]
    pub descendant_limit: Option<usize>,
    #[serde(default)]
    pub descendant_timeout_ms: Option<u64>,
    #[serde(default)]
    pub transitive_merges: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ReportSection {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EntrezConfig {
    pub email: Option<String>,
    pub api_key_env: String,
    pub max_records: usize,
    pub search_filters: String,
    pub timeout: Duration,
}

impl EntrezConfig {
    pub fn settings(&self) -> EntrezSettings {
        EntrezSettings {
            email: self.email.clone(),
            api_key: std::env::var(&self.api_key_env).ok(),
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub api_key_env: String,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub taxonomy_path: Utf8PathBuf,
    pub acronyms_path: Utf8PathBuf,
    pub clinical_path: Utf8PathBuf,
    pub style_references_path: Utf8PathBuf,
    pub entrez: EntrezConfig,
    pub resolver: ResolverOptions,
    pub report: ReportConfig,
}

impl ResolvedConfig {
    pub fn override_model(&mut self, model: Option<&str>) {
        if let Some(model) = model.map(str::trim).filter(|model| !model.is_empty()) {
            self.report.generation.model = model.to_string();
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `bio-jarvis.json` in the working directory when no
    /// path is given. A missing default file yields the built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, JarvisError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| JarvisError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| JarvisError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, JarvisError> {
        let taxonomy_path = match config.taxonomy_path {
            Some(path) => Utf8PathBuf::from(path),
            None => default_taxonomy_path()?,
        };
        let data_dir = Utf8PathBuf::from(config.data_dir.unwrap_or_else(|| "./files".to_string()));
        let files = config.files;

        let max_records = config.entrez.max_records.unwrap_or(DEFAULT_MAX_RECORDS);
        if max_records == 0 {
            return Err(JarvisError::ConfigParse(
                "entrez.max_records must be at least 1".to_string(),
            ));
        }
        let entrez = EntrezConfig {
            email: config.entrez.email,
            api_key_env: config
                .entrez
                .api_key_env
                .unwrap_or_else(|| "NCBI_API_KEY".to_string()),
            max_records,
            search_filters: config
                .entrez
                .search_filters
                .unwrap_or_else(|| DEFAULT_SEARCH_FILTERS.to_string()),
            timeout: Duration::from_secs(config.entrez.timeout_secs.unwrap_or(60)),
        };

        let budget_defaults = DescendantBudget::default();
        let resolver = ResolverOptions {
            descendant_budget: DescendantBudget {
                max_nodes: config
                    .resolver
                    .descendant_limit
                    .unwrap_or(budget_defaults.max_nodes),
                timeout: config
                    .resolver
                    .descendant_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(budget_defaults.timeout),
            },
            transitive_merges: config.resolver.transitive_merges.unwrap_or(true),
        };

        let generation_defaults = GenerationSettings::default();
        let report = ReportConfig {
            api_key_env: config
                .report
                .api_key_env
                .unwrap_or_else(|| "GEMINI_API_KEY".to_string()),
            generation: GenerationSettings {
                model: config.report.model.unwrap_or(generation_defaults.model),
                max_tokens: config
                    .report
                    .max_tokens
                    .unwrap_or(generation_defaults.max_tokens),
                temperature: config
                    .report
                    .temperature
                    .unwrap_or(generation_defaults.temperature),
                top_p: config.report.top_p.unwrap_or(generation_defaults.top_p),
                timeout: config
                    .report
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(generation_defaults.timeout),
            },
        };

        Ok(ResolvedConfig {
            taxonomy_path,
            acronyms_path: data_dir.join(files.acronyms.as_deref().unwrap_or("acronyms.csv")),
            clinical_path: data_dir.join(
                files
                    .clinical
                    .as_deref()
                    .unwrap_or("data_for_biojarvis.csv"),
            ),
            style_references_path: data_dir.join(
                files
                    .style_references
                    .as_deref()
                    .unwrap_or("old_reports.csv"),
            ),
            entrez,
            resolver,
            report,
        })
    }
}

pub fn default_taxonomy_path() -> Result<Utf8PathBuf, JarvisError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("bio-jarvis")
                    .join("taxonomy"),
            )
            .ok()
        })
        .ok_or_else(|| {
            JarvisError::Filesystem("unable to resolve taxonomy cache directory".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_are_joined_to_data_dir() {
        let config = Config {
            taxonomy_path: Some("/srv/taxdump".to_string()),
            data_dir: Some("/srv/data".to_string()),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.taxonomy_path, Utf8PathBuf::from("/srv/taxdump"));
        assert_eq!(
            resolved.clinical_path,
            Utf8PathBuf::from("/srv/data/data_for_biojarvis.csv")
        );
    }
}
