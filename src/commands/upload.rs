//! Upload Commands
//!
//! Hands a finished training directory to the configured results uploader.

use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::instances::GymApi;
use crate::error::{GymError, GymResult};
use crate::monitor::MonitorState;
use crate::upload::UploadJob;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub training_dir: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub algorithm_id: Option<String>,
    #[serde(default)]
    pub writeup: Option<String>,
    #[serde(default)]
    pub ignore_open_monitors: Option<bool>,
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

impl GymApi {
    /// Ids of sessions currently recording into `directory`.
    ///
    /// Takes each session guard in turn, so it may wait behind in-flight steps.
    pub fn open_monitors(&self, directory: &Path) -> Vec<String> {
        self.registry
            .sessions()
            .iter()
            .filter(|session| match session.lock().monitor.state() {
                MonitorState::Recording { directory: current } => same_dir(current, directory),
                MonitorState::Inactive => false,
            })
            .map(|session| session.id().to_string())
            .collect()
    }

    /// Upload the recordings in `training_dir`
    pub async fn upload(&self, request: UploadRequest) -> GymResult<()> {
        let training_dir = request
            .training_dir
            .map(PathBuf::from)
            .ok_or_else(|| GymError::missing_field("training_dir"))?;
        let api_key = request
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GymError::Unauthorized("You must provide an API key for the results service".to_string())
            })?;
        let uploader = self.uploader.clone().ok_or_else(|| {
            GymError::InvalidArgument("No results upload endpoint is configured".to_string())
        })?;

        if !request.ignore_open_monitors.unwrap_or(false) {
            let api = self.clone();
            let dir = training_dir.clone();
            let open = tokio::task::spawn_blocking(move || api.open_monitors(&dir))
                .await
                .map_err(|e| GymError::Internal(format!("Monitor scan failed: {}", e)))?;
            if !open.is_empty() {
                warn!(
                    "Refusing upload of {}: monitors still open on {}",
                    training_dir.display(),
                    open.join(", ")
                );
                return Err(GymError::Conflict(format!(
                    "Still have open monitors on {}; close them before uploading or pass ignore_open_monitors",
                    open.join(", ")
                )));
            }
        }

        let job = UploadJob {
            training_dir,
            api_key,
            algorithm_id: request.algorithm_id,
            writeup: request.writeup,
        };
        info!(
            "Uploading {} to {}",
            job.training_dir.display(),
            uploader.target()
        );
        uploader.upload(&job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::instances::{CreateRequest, MonitorStartRequest};
    use crate::session::InstanceRegistry;
    use crate::upload::ResultsUploader;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingUploader {
        jobs: Mutex<Vec<UploadJob>>,
    }

    #[async_trait]
    impl ResultsUploader for RecordingUploader {
        async fn upload(&self, job: &UploadJob) -> GymResult<()> {
            self.jobs.lock().push(job.clone());
            Ok(())
        }

        fn target(&self) -> String {
            "memory".to_string()
        }
    }

    fn api_with(uploader: Arc<RecordingUploader>) -> GymApi {
        GymApi::new(Arc::new(InstanceRegistry::new())).with_uploader(uploader)
    }

    fn request(dir: &Path) -> UploadRequest {
        UploadRequest {
            training_dir: Some(dir.to_string_lossy().into_owned()),
            api_key: Some("key".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upload_forwards_job() {
        let uploader = Arc::new(RecordingUploader::default());
        let api = api_with(uploader.clone());
        let dir = tempfile::tempdir().unwrap();

        api.upload(request(dir.path())).await.unwrap();
        let jobs = uploader.jobs.lock();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].training_dir, dir.path());
    }

    #[tokio::test]
    async fn test_upload_requires_key() {
        let api = api_with(Arc::new(RecordingUploader::default()));
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.api_key = None;
        assert!(matches!(api.upload(req).await, Err(GymError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_upload_without_endpoint() {
        let api = GymApi::new(Arc::new(InstanceRegistry::new()));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            api.upload(request(dir.path())).await,
            Err(GymError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_refuses_open_monitor() {
        let uploader = Arc::new(RecordingUploader::default());
        let api = api_with(uploader.clone());
        let dir = tempfile::tempdir().unwrap();

        let id = api
            .create(CreateRequest {
                env_spec_name: Some("CartPole-v0".to_string()),
            })
            .unwrap()
            .instance_id;
        api.monitor_start(
            &id,
            MonitorStartRequest {
                directory: Some(dir.path().to_string_lossy().into_owned()),
                ..Default::default()
            },
        )
        .unwrap();

        let err = api.upload(request(dir.path())).await.unwrap_err();
        assert!(matches!(err, GymError::Conflict(_)));
        assert!(err.to_string().contains(&id));

        let mut forced = request(dir.path());
        forced.ignore_open_monitors = Some(true);
        api.upload(forced).await.unwrap();

        api.monitor_close(&id).unwrap();
        api.upload(request(dir.path())).await.unwrap();
        assert_eq!(uploader.jobs.lock().len(), 2);
    }
}
