//! Results Upload Module
//!
//! Ships monitor output (episode stats plus manifests) to a remote results
//! service. The server only depends on the [`ResultsUploader`] trait; the
//! HTTP implementation lives in [`http`].

pub mod auth;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::GymResult;

pub use auth::ApiKeyAuth;
pub use http::HttpUploader;

/// One upload of a finished training directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJob {
    pub training_dir: PathBuf,
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writeup: Option<String>,
}

/// Fire-and-forget delivery of recorded results.
///
/// Implementations report rejected credentials as
/// [`GymError::Unauthorized`](crate::error::GymError::Unauthorized).
#[async_trait]
pub trait ResultsUploader: Send + Sync {
    async fn upload(&self, job: &UploadJob) -> GymResult<()>;

    /// Name used in logs
    fn target(&self) -> String;
}
