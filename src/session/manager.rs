//! Instance Registry
//!
//! Owns the identifier -> session mapping. The mapping lock is held only
//! for the insert or read itself, never across a session operation; the
//! per-session guard is what serializes work on one environment.

use log::{debug, error, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::state::Session;
use crate::envs::EnvCatalog;
use crate::error::{GymError, GymResult};

/// Default identifier length in hex characters
pub const DEFAULT_ID_LEN: usize = 8;

/// Registry of live sessions
pub struct InstanceRegistry {
    /// Environment kinds sessions can be created from
    catalog: Arc<EnvCatalog>,
    /// Live sessions (instance_id -> Session)
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    /// Length of generated identifiers
    id_len: usize,
}

impl InstanceRegistry {
    /// Create a registry over the built-in catalog
    pub fn new() -> Self {
        Self::with_catalog(Arc::new(EnvCatalog::with_builtin()))
    }

    pub fn with_catalog(catalog: Arc<EnvCatalog>) -> Self {
        Self::with_id_len(catalog, DEFAULT_ID_LEN)
    }

    /// Create with a custom identifier length (clamped to 1..=32)
    pub fn with_id_len(catalog: Arc<EnvCatalog>, id_len: usize) -> Self {
        Self {
            catalog,
            sessions: RwLock::new(HashMap::new()),
            id_len: id_len.clamp(1, 32),
        }
    }

    /// Construct a new environment for `env_spec_name` and register it.
    ///
    /// The environment is built before the mapping lock is taken; the
    /// identifier is drawn, checked and inserted under one write lock.
    pub fn create(&self, env_spec_name: &str) -> GymResult<String> {
        let env = self.catalog.make(env_spec_name)?;

        let mut sessions = self.sessions.write();
        if self.id_len < 8 && sessions.len() >= 16usize.pow(self.id_len as u32) {
            return Err(GymError::Internal(format!(
                "All {}-character instance ids are in use",
                self.id_len
            )));
        }
        let instance_id = loop {
            let candidate = self.generate_id();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
            error!(
                "Generated instance id {} collides with a live session; regenerating",
                candidate
            );
        };

        let session = Arc::new(Session::new(instance_id.clone(), env));
        sessions.insert(instance_id.clone(), session);
        drop(sessions);

        info!("Created instance {} ({})", instance_id, env_spec_name);
        Ok(instance_id)
    }

    fn generate_id(&self) -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        hex[..self.id_len].to_string()
    }

    /// Resolve an identifier. Does not take the session guard.
    pub fn lookup(&self, instance_id: &str) -> GymResult<Arc<Session>> {
        let session = self.sessions.read().get(instance_id).cloned();
        session.ok_or_else(|| {
            debug!("Lookup of unknown instance {}", instance_id);
            GymError::NotFound(instance_id.to_string())
        })
    }

    /// Check if a session exists
    pub fn exists(&self, instance_id: &str) -> bool {
        self.sessions.read().contains_key(instance_id)
    }

    /// Snapshot of every live session (instance_id -> env spec name)
    pub fn list_all(&self) -> HashMap<String, String> {
        self.sessions
            .read()
            .iter()
            .map(|(id, session)| (id.clone(), session.env_spec_name().to_string()))
            .collect()
    }

    /// Live sessions, for scans that need more than the spec name
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Get total session count
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
