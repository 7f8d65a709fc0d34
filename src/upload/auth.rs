//! Upload credentials

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{GymError, GymResult};

/// API key sent with every upload request
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiKeyAuth {
    /// Header name (e.g., "Authorization", "X-API-Key")
    header_name: String,
    api_key: String,
    /// Optional prefix (e.g., "Bearer " for "Authorization: Bearer xxx")
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,
}

impl ApiKeyAuth {
    /// Key for a custom header. Blank keys are rejected up front.
    pub fn new(header_name: impl Into<String>, api_key: impl Into<String>) -> GymResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GymError::Unauthorized(
                "You must provide an API key for the results service".to_string(),
            ));
        }
        Ok(Self {
            header_name: header_name.into(),
            api_key,
            prefix: None,
        })
    }

    /// `Authorization: Bearer <key>`
    pub fn bearer(api_key: impl Into<String>) -> GymResult<Self> {
        Ok(Self::new("Authorization", api_key)?.with_prefix("Bearer "))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        let value = match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, self.api_key),
            None => self.api_key.clone(),
        };
        request.header(&self.header_name, value)
    }
}

// Keep the key out of logs
impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("header_name", &self.header_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
