use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::errors::{ConfigError, WriteError};
use crate::writer::{SectionKey, SectionWriter};

/// `PATCH {base_url}/api/reports/{record_id}/{section}` with the expanded patch as JSON body.
///
/// Record id and section are single path segments: `/`, `?`, `#` and `%`
/// inside them are percent-encoded.
#[derive(Debug, Clone)]
pub struct HttpSectionWriter {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpSectionWriter {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self, ConfigError> {
        endpoint.validate()?;

        let base_url = Url::parse(&endpoint.base_url).map_err(|e| ConfigError::Invalid {
            field: "endpoint.base_url",
            reason: format!("{}", e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                field: "endpoint.base_url",
                reason: "URL cannot carry a path".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout())
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "endpoint",
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            auth_token: endpoint.auth_token.clone(),
        })
    }

    pub fn section_url(&self, key: &SectionKey) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so segments are always available
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "api",
                "reports",
                key.record_id.as_str(),
                key.section.as_str(),
            ]);
        }
        url
    }
}

#[async_trait]
impl SectionWriter for HttpSectionWriter {
    async fn write(&self, key: &SectionKey, patch: Value) -> Result<(), WriteError> {
        let url = self.section_url(key);
        debug!(target: "autosave::http", %url, "sending section patch");

        let mut request = self.client.patch(url).json(&patch);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message_from_body(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

        Err(WriteError::Http {
            code: status.as_u16(),
            message,
        })
    }
}

/// `{"error": "..."}` or `{"message": "..."}` bodies, else the raw text.
fn error_message_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        for field in ["error", "message"] {
            if let Some(Value::String(msg)) = map.get(field) {
                return Some(msg.clone());
            }
        }
    }

    Some(trimmed.to_string())
}
