use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::JarvisError;

pub const NUCLEOTIDE_DB: &str = "nucleotide";

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const TOOL_NAME: &str = "bio-jarvis";

pub trait SequenceRecordProvider: Send + Sync {
    fn search(
        &self,
        database: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<String>, JarvisError>;

    fn fetch(&self, record_id: &str) -> Result<String, JarvisError>;
}

#[derive(Debug, Clone)]
pub struct EntrezSettings {
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for EntrezSettings {
    fn default() -> Self {
        Self {
            email: None,
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct EntrezHttpClient {
    client: Client,
    base_url: String,
    email: Option<String>,
    api_key: Option<String>,
}

impl EntrezHttpClient {
    pub fn new(settings: &EntrezSettings) -> Result<Self, JarvisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("{TOOL_NAME}/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| JarvisError::EntrezHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| JarvisError::EntrezHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: EUTILS_BASE.to_string(),
            email: settings.email.clone().filter(|v| !v.trim().is_empty()),
            api_key: settings.api_key.clone().filter(|v| !v.trim().is_empty()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(&self, endpoint: &str, params: &[(&str, String)]) -> RequestBuilder {
        let mut request = self
            .client
            .get(format!("{}/{endpoint}", self.base_url))
            .query(&[("tool", TOOL_NAME)])
            .query(params);
        if let Some(email) = &self.email {
            request = request.query(&[("email", email.as_str())]);
        }
        if let Some(api_key) = &self.api_key {
            request = request.query(&[("api_key", api_key.as_str())]);
        }
        request
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, JarvisError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 350;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, delay_ms = delay, "retrying E-utilities request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Self::handle_status(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, attempt, delay_ms = delay, "retrying E-utilities request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(JarvisError::EntrezHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(response: Response) -> Result<Response, JarvisError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "E-utilities request failed".to_string());
        Err(JarvisError::EntrezStatus { status, message })
    }
}

impl SequenceRecordProvider for EntrezHttpClient {
    fn search(
        &self,
        database: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<String>, JarvisError> {
        let params = [
            ("db", database.to_string()),
            ("term", query.to_string()),
            ("retmax", max_results.to_string()),
            ("retmode", "json".to_string()),
        ];
        let response = self.send_with_retries(|| self.request("esearch.fcgi", &params))?;
        let payload: Value = response
            .json()
            .map_err(|err| JarvisError::EntrezHttp(err.to_string()))?;
        parse_esearch_ids(&payload)
    }

    fn fetch(&self, record_id: &str) -> Result<String, JarvisError> {
        let params = [
            ("db", NUCLEOTIDE_DB.to_string()),
            ("id", record_id.to_string()),
            ("rettype", "gb".to_string()),
            ("retmode", "text".to_string()),
        ];
        let response = self.send_with_retries(|| self.request("efetch.fcgi", &params))?;
        response
            .text()
            .map_err(|err| JarvisError::EntrezHttp(err.to_string()))
    }
}

pub fn parse_esearch_ids(payload: &Value) -> Result<Vec<String>, JarvisError> {
    let result = &payload["esearchresult"];
    if let Some(message) = result.get("ERROR").and_then(|v| v.as_str()) {
        return Err(JarvisError::MalformedRecord {
            record_id: "esearch".to_string(),
            reason: message.to_string(),
        });
    }
    let ids = result["idlist"]
        .as_array()
        .ok_or_else(|| JarvisError::MalformedRecord {
            record_id: "esearch".to_string(),
            reason: "missing idlist".to_string(),
        })?;
    Ok(ids
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect())
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn esearch_ids_keep_order() {
        let payload = json!({"esearchresult": {"count": "2", "idlist": ["2", "1"]}});
        assert_eq!(parse_esearch_ids(&payload).unwrap(), vec!["2", "1"]);
    }

    #[test]
    fn esearch_error_is_malformed() {
        let payload = json!({"esearchresult": {"ERROR": "Invalid query"}});
        assert_matches!(
            parse_esearch_ids(&payload),
            Err(JarvisError::MalformedRecord { .. })
        );
    }

    fn query_pairs(request: &reqwest::blocking::Request) -> Vec<(String, String)> {
        request
            .url()
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    #[test]
    fn requests_carry_tool_email_and_api_key() {
        let settings = EntrezSettings {
            email: Some("lab@example.org".to_string()),
            api_key: Some("k-123".to_string()),
            ..EntrezSettings::default()
        };
        let client = EntrezHttpClient::new(&settings)
            .unwrap()
            .with_base_url("http://127.0.0.1:9/eutils");
        let request = client
            .request("efetch.fcgi", &[("id", "NC_045512".to_string())])
            .build()
            .unwrap();
        assert_eq!(request.url().path(), "/eutils/efetch.fcgi");
        let pairs = query_pairs(&request);
        for (key, value) in [
            ("tool", "bio-jarvis"),
            ("id", "NC_045512"),
            ("email", "lab@example.org"),
            ("api_key", "k-123"),
        ] {
            assert!(pairs.contains(&(key.to_string(), value.to_string())), "{key}");
        }
    }

    #[test]
    fn blank_credentials_are_not_sent() {
        let settings = EntrezSettings {
            email: Some("  ".to_string()),
            ..EntrezSettings::default()
        };
        let client = EntrezHttpClient::new(&settings)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let request = client.request("esearch.fcgi", &[]).build().unwrap();
        let keys: Vec<String> = query_pairs(&request).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["tool"]);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
