use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::domain::{Language, OrganismInfo};
use crate::error::JarvisError;

pub const REFERENCE_SAMPLE_SIZE: usize = 2;

const CONTENT_COLUMN: &str = "content";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Default)]
pub struct StyleReferences {
    excerpts: Vec<String>,
}

impl StyleReferences {
    pub fn from_excerpts(excerpts: Vec<String>) -> Self {
        Self {
            excerpts: excerpts
                .into_iter()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, JarvisError> {
        let file = File::open(path).map_err(|err| JarvisError::AttributeTable {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let references = Self::from_reader(file, &path.display().to_string())?;
        info!(excerpts = references.len(), "style references loaded from {}", path.display());
        Ok(references)
    }

    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self, JarvisError> {
        let table_error = |message: String| JarvisError::AttributeTable {
            path: source.to_string(),
            message,
        };
        let mut reader = csv::Reader::from_reader(reader);
        let content_idx = reader
            .headers()
            .map_err(|err| table_error(err.to_string()))?
            .iter()
            .position(|header| header.trim() == CONTENT_COLUMN)
            .ok_or_else(|| table_error(format!("missing {CONTENT_COLUMN} column")))?;
        let mut excerpts = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| table_error(err.to_string()))?;
            if let Some(text) = row.get(content_idx) {
                excerpts.push(text.to_string());
            }
        }
        Ok(Self::from_excerpts(excerpts))
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<String> {
        self.excerpts.choose_multiple(rng, count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.excerpts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excerpts.is_empty()
    }
}

pub fn build_prompt(
    organism: &OrganismInfo,
    references: &[String],
    language: Language,
) -> Result<String, JarvisError> {
    if !organism.is_usable() {
        return Err(JarvisError::UnusableRecord);
    }
    let data = serde_json::to_string_pretty(organism)
        .map_err(|err| JarvisError::ReportResponse(err.to_string()))?;
    let mut style = String::new();
    for (idx, excerpt) in references.iter().enumerate() {
        style.push_str(&format!("--- reference {} ---\n{excerpt}\n", idx + 1));
    }
    if style.is_empty() {
        style.push_str("(no reference excerpts available)\n");
    }

    Ok(format!(
        "You write clinical and microbiological reports about pathogens detected by clinical metagenomics.\n\
         Write the report in {language}, in the formal and objective register of the medical literature.\n\
         \n\
         Organism data (the only primary source):\n\
         {data}\n\
         \n\
         Rules:\n\
         1. Use only the data above plus well-established general knowledge such as the taxonomic hierarchy.\n\
         2. Never mention, imply or discuss information that is missing. Omit any topic without explicit data.\n\
         3. Do not express uncertainty, do not comment on data availability or on the research process, and do not add a title.\n\
         4. Do not infer properties or pathogenicity from related taxa, families or genera.\n\
         5. When an acronym is present, write it as 'Organism Name (Acronym)'.\n\
         6. Write one or two continuous paragraphs, without bullet points or lists.\n\
         \n\
         Stylistic references:\n\
         {style}",
        language = language.prompt_name(),
    ))
}

pub trait ReportGenerator: Send + Sync {
    fn generate(
        &self,
        organism: &OrganismInfo,
        references: &[String],
        language: Language,
    ) -> Result<String, JarvisError>;
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_tokens: 500,
            temperature: 0.1,
            top_p: 0.1,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone)]
pub struct GeminiHttpClient {
    client: Client,
    base_url: String,
    api_key: String,
    settings: GenerationSettings,
}

impl GeminiHttpClient {
    pub fn new(api_key: String, settings: GenerationSettings) -> Result<Self, JarvisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("bio-jarvis/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| JarvisError::ReportHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| JarvisError::ReportHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: GEMINI_BASE.to_string(),
            api_key,
            settings,
        })
    }

    pub fn from_env(var: &str, settings: GenerationSettings) -> Result<Self, JarvisError> {
        let api_key = std::env::var(var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| JarvisError::MissingCredential(var.to_string()))?;
        Self::new(api_key, settings)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]}
            ],
            "generationConfig": {
                "maxOutputTokens": self.settings.max_tokens,
                "temperature": self.settings.temperature,
                "topP": self.settings.top_p,
            }
        })
    }
}

impl ReportGenerator for GeminiHttpClient {
    fn generate(
        &self,
        organism: &OrganismInfo,
        references: &[String],
        language: Language,
    ) -> Result<String, JarvisError> {
        let prompt = build_prompt(organism, references, language)?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.settings.model
        );
        debug!(model = %self.settings.model, prompt_chars = prompt.len(), "requesting report");
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(&prompt))
            .send()
            .map_err(|err| JarvisError::ReportHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "report request failed".to_string());
            return Err(JarvisError::ReportStatus { status, message });
        }
        let payload: Value = response
            .json()
            .map_err(|err| JarvisError::ReportHttp(err.to_string()))?;
        extract_generated_text(&payload)
    }
}

pub fn extract_generated_text(payload: &Value) -> Result<String, JarvisError> {
    let parts = payload
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get("parts"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            let keys = payload
                .as_object()
                .map(|obj| obj.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            JarvisError::ReportResponse(format!("no candidate text (keys: {keys})"))
        })?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect();
    let text = text.trim();
    if text.is_empty() {
        return Err(JarvisError::ReportResponse("empty candidate text".to_string()));
    }
    Ok(text.to_string())
}
