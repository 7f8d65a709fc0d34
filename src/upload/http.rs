//! HTTP Results Uploader
//!
//! POSTs every manifest found in a training directory, with the stats it
//! points at, as one JSON document.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::auth::ApiKeyAuth;
use super::{ResultsUploader, UploadJob};
use crate::error::{GymError, GymResult};
use crate::monitor::recorder::{load_manifest, manifests};
use crate::monitor::EpisodeStats;

/// Default upload timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Stats of one recorder, tagged with where they came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub env_id: String,
    pub manifest: String,
    #[serde(flatten)]
    pub stats: EpisodeStats,
}

/// Document sent to the results service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writeup: Option<String>,
    pub evaluations: Vec<Evaluation>,
}

impl UploadPayload {
    /// Collect every manifest in `training_dir`
    pub fn collect(training_dir: &Path, algorithm_id: Option<String>, writeup: Option<String>) -> GymResult<Self> {
        if !training_dir.is_dir() {
            return Err(GymError::InvalidArgument(format!(
                "Training directory {} does not exist",
                training_dir.display()
            )));
        }

        let mut evaluations = Vec::new();
        for path in manifests(training_dir)? {
            let (manifest, stats) = load_manifest(&path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            evaluations.push(Evaluation {
                env_id: manifest.env_info.env_id,
                manifest: name,
                stats,
            });
        }

        if evaluations.is_empty() {
            return Err(GymError::InvalidArgument(format!(
                "No monitor manifests found in {}; close the monitor before uploading",
                training_dir.display()
            )));
        }

        Ok(Self {
            algorithm_id,
            writeup,
            evaluations,
        })
    }
}

/// Uploads to a results service over HTTP
pub struct HttpUploader {
    client: Client,
    endpoint: Url,
    timeout_secs: u64,
}

impl HttpUploader {
    pub fn new(endpoint: &str, timeout_secs: u64) -> GymResult<Self> {
        let endpoint = Url::parse(endpoint)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GymError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            timeout_secs,
        })
    }
}

#[async_trait]
impl ResultsUploader for HttpUploader {
    async fn upload(&self, job: &UploadJob) -> GymResult<()> {
        let auth = ApiKeyAuth::bearer(job.api_key.clone())?;

        let training_dir = job.training_dir.clone();
        let algorithm_id = job.algorithm_id.clone();
        let writeup = job.writeup.clone();
        let payload = tokio::task::spawn_blocking(move || {
            UploadPayload::collect(&training_dir, algorithm_id, writeup)
        })
        .await
        .map_err(|e| GymError::Internal(format!("Manifest scan failed: {}", e)))??;

        debug!(
            "Uploading {} evaluations from {} to {}",
            payload.evaluations.len(),
            job.training_dir.display(),
            self.endpoint
        );

        let request = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json");
        let response = auth.apply(request).json(&payload).send().await?;

        match response.status() {
            status if status.is_success() => {
                info!(
                    "Uploaded {} to {}",
                    job.training_dir.display(),
                    self.endpoint
                );
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Results service rejected the API key");
                Err(GymError::Unauthorized(
                    "The results service rejected the API key".to_string(),
                ))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(GymError::Internal(format!(
                    "Results service returned HTTP {}: {}",
                    status, error_text
                )))
            }
        }
    }

    fn target(&self) -> String {
        self.endpoint.to_string()
    }
}

impl std::fmt::Debug for HttpUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUploader")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
