//! Instance Commands
//!
//! The operation facade the transport layer calls. Every session operation
//! follows the same order: resolve the id through the registry, take the
//! session guard, run the operation, encode the result, release the guard.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{GymError, GymResult};
use crate::monitor::MonitorOptions;
use crate::session::{InstanceRegistry, SessionInfo};
use crate::spaces::{decode, describe, encode, json_number};
use crate::upload::ResultsUploader;

/// Body of a create call. `env_id` is accepted for older clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRequest {
    #[serde(default, alias = "env_id")]
    pub env_spec_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepRequest {
    #[serde(default)]
    pub action: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorStartRequest {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub force: Option<bool>,
    #[serde(default)]
    pub resume: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub all_envs: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub observation: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponse {
    pub observation: Value,
    pub reward: Value,
    pub done: bool,
    pub info: Map<String, Value>,
}

/// Space descriptor wrapped the way clients expect it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceInfoResponse {
    pub info: Value,
}

/// Gym API state shared by every request handler
#[derive(Clone)]
pub struct GymApi {
    pub(crate) registry: Arc<InstanceRegistry>,
    pub(crate) uploader: Option<Arc<dyn ResultsUploader>>,
}

impl GymApi {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self {
            registry,
            uploader: None,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn ResultsUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Create a new session
    pub fn create(&self, request: CreateRequest) -> GymResult<CreateResponse> {
        let env_spec_name = request
            .env_spec_name
            .ok_or_else(|| GymError::missing_field("env_spec_name"))?;
        let instance_id = self.registry.create(&env_spec_name)?;
        Ok(CreateResponse { instance_id })
    }

    /// List all sessions
    pub fn list_all(&self) -> ListResponse {
        ListResponse {
            all_envs: self.registry.list_all(),
        }
    }

    pub fn exists(&self, instance_id: &str) -> ExistsResponse {
        ExistsResponse {
            exists: self.registry.exists(instance_id),
        }
    }

    /// Start a new episode
    pub fn reset(&self, instance_id: &str) -> GymResult<ResetResponse> {
        let session = self.registry.lookup(instance_id)?;
        let mut inner = session.lock();
        let observation = inner.env.reset();
        let observation = encode(inner.env.observation_space(), &observation)?;
        Ok(ResetResponse { observation })
    }

    /// Advance one step. The action is validated before the environment
    /// is touched, so a rejected action leaves the session unchanged.
    pub fn step(&self, instance_id: &str, request: StepRequest) -> GymResult<StepResponse> {
        let raw_action = request.action.ok_or_else(|| GymError::missing_field("action"))?;
        let session = self.registry.lookup(instance_id)?;
        let mut inner = session.lock();

        let action = decode(inner.env.action_space(), &raw_action)?;
        let outcome = inner.env.step(&action)?;
        let observation = encode(inner.env.observation_space(), &outcome.observation)?;

        Ok(StepResponse {
            observation,
            reward: json_number(outcome.reward),
            done: outcome.done,
            info: outcome.info,
        })
    }

    pub fn action_space_info(&self, instance_id: &str) -> GymResult<SpaceInfoResponse> {
        let session = self.registry.lookup(instance_id)?;
        let inner = session.lock();
        Ok(SpaceInfoResponse {
            info: describe(inner.env.action_space()),
        })
    }

    pub fn observation_space_info(&self, instance_id: &str) -> GymResult<SpaceInfoResponse> {
        let session = self.registry.lookup(instance_id)?;
        let inner = session.lock();
        Ok(SpaceInfoResponse {
            info: describe(inner.env.observation_space()),
        })
    }

    /// Begin recording into a directory
    pub fn monitor_start(&self, instance_id: &str, request: MonitorStartRequest) -> GymResult<()> {
        let directory = request
            .directory
            .ok_or_else(|| GymError::missing_field("directory"))?;
        let options = MonitorOptions {
            force: request.force.unwrap_or(false),
            resume: request.resume.unwrap_or(false),
        };

        let session = self.registry.lookup(instance_id)?;
        let mut guard = session.lock();
        let inner = &mut *guard;
        inner.monitor.start(&mut inner.env, &directory, options)
    }

    /// Stop recording and flush to disk
    pub fn monitor_close(&self, instance_id: &str) -> GymResult<()> {
        let session = self.registry.lookup(instance_id)?;
        let mut guard = session.lock();
        let inner = &mut *guard;
        inner.monitor.close(&mut inner.env)?;
        Ok(())
    }

    pub fn session_info(&self, instance_id: &str) -> GymResult<SessionInfo> {
        Ok(self.registry.lookup(instance_id)?.info())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorState;
    use crate::spaces::{parse_descriptor, Space};
    use serde_json::json;

    fn api() -> GymApi {
        GymApi::new(Arc::new(InstanceRegistry::new()))
    }

    fn create(api: &GymApi, env: &str) -> String {
        api.create(CreateRequest {
            env_spec_name: Some(env.to_string()),
        })
        .unwrap()
        .instance_id
    }

    fn step(api: &GymApi, id: &str, action: Value) -> GymResult<StepResponse> {
        api.step(id, StepRequest { action: Some(action) })
    }

    #[test]
    fn test_cartpole_scenario() {
        let api = api();
        let id = create(&api, "CartPole-v0");
        assert!(api.exists(&id).exists);

        let reset = api.reset(&id).unwrap();
        assert_eq!(reset.observation.as_array().unwrap().len(), 4);

        let result = step(&api, &id, json!(1)).unwrap();
        assert_eq!(result.observation.as_array().unwrap().len(), 4);
        assert_eq!(result.reward, json!(1.0));
        assert!(!result.done);
    }

    #[test]
    fn test_create_requires_name() {
        let err = api().create(CreateRequest::default()).unwrap_err();
        assert!(matches!(err, GymError::InvalidArgument(_)));
        assert!(err.to_string().contains("env_spec_name"));
    }

    #[test]
    fn test_create_accepts_legacy_field() {
        let request: CreateRequest = serde_json::from_value(json!({"env_id": "CartPole-v0"})).unwrap();
        assert_eq!(request.env_spec_name.as_deref(), Some("CartPole-v0"));
    }

    #[test]
    fn test_unknown_instance() {
        let api = api();
        assert!(!api.exists("missing").exists);
        assert!(matches!(api.reset("missing"), Err(GymError::NotFound(_))));
        assert!(matches!(step(&api, "missing", json!(0)), Err(GymError::NotFound(_))));
        assert!(matches!(api.action_space_info("missing"), Err(GymError::NotFound(_))));
        assert!(matches!(api.monitor_close("missing"), Err(GymError::NotFound(_))));
    }

    #[test]
    fn test_observation_matches_descriptor() {
        let api = api();
        let id = create(&api, "CartPole-v0");
        let descriptor = api.observation_space_info(&id).unwrap().info;
        let space = parse_descriptor(&descriptor).unwrap();
        let observation = api.reset(&id).unwrap().observation;
        assert!(decode(&space, &observation).is_ok());
        assert!(matches!(space, Space::Box { ref shape, .. } if shape == &vec![4]));
    }

    #[test]
    fn test_rejected_step_leaves_state() {
        let api = api();
        let id = create(&api, "CartPole-v0");
        api.reset(&id).unwrap();

        let err = step(&api, &id, json!(2)).unwrap_err();
        assert!(matches!(err, GymError::InvalidArgument(_)));
        let err = step(&api, &id, json!([0, 1])).unwrap_err();
        assert!(matches!(err, GymError::InvalidArgument(_)));

        let info = api.session_info(&id).unwrap();
        assert_eq!(info.total_steps, 0);
        assert_eq!(info.episode_steps, 0);
    }

    #[test]
    fn test_step_requires_action() {
        let api = api();
        let id = create(&api, "CartPole-v0");
        api.reset(&id).unwrap();
        let err = api.step(&id, StepRequest::default()).unwrap_err();
        assert!(err.to_string().contains("action"));
    }

    #[test]
    fn test_box_action() {
        let api = api();
        let id = create(&api, "Pendulum-v0");
        api.reset(&id).unwrap();
        let result = step(&api, &id, json!([0.5])).unwrap();
        assert_eq!(result.observation.as_array().unwrap().len(), 3);
        assert!(step(&api, &id, json!([5.0])).is_err());
    }

    #[test]
    fn test_monitor_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let api = api();
        let id = create(&api, "CartPole-v0");

        let start = MonitorStartRequest {
            directory: Some(dir.path().to_string_lossy().into_owned()),
            ..Default::default()
        };
        api.monitor_start(&id, start.clone()).unwrap();
        assert!(matches!(
            api.session_info(&id).unwrap().monitor,
            MonitorState::Recording { .. }
        ));
        assert!(matches!(api.monitor_start(&id, start), Err(GymError::Conflict(_))));

        api.reset(&id).unwrap();
        step(&api, &id, json!(0)).unwrap();

        api.monitor_close(&id).unwrap();
        assert_eq!(api.session_info(&id).unwrap().monitor, MonitorState::Inactive);
        assert!(matches!(api.monitor_close(&id), Err(GymError::Conflict(_))));
    }

    #[test]
    fn test_monitor_start_validation() {
        let api = api();
        let id = create(&api, "CartPole-v0");
        let err = api.monitor_start(&id, MonitorStartRequest::default()).unwrap_err();
        assert!(err.to_string().contains("directory"));

        let dir = tempfile::tempdir().unwrap();
        let both = MonitorStartRequest {
            directory: Some(dir.path().to_string_lossy().into_owned()),
            force: Some(true),
            resume: Some(true),
        };
        assert!(matches!(api.monitor_start(&id, both), Err(GymError::InvalidArgument(_))));
        assert_eq!(api.session_info(&id).unwrap().monitor, MonitorState::Inactive);
    }
}
