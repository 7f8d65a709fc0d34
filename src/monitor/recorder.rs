//! Episode statistics recorder.
//!
//! Writes the gym monitor layout into a training directory:
//!
//! | File | Contents |
//! |------|----------|
//! | `openaigym.episode_batch.<id>.<pid>.stats.json` | episode lengths, rewards, timestamps |
//! | `openaigym.manifest.<id>.<pid>.manifest.json` | pointer to the stats file plus env info |
//!
//! `<id>` is unique per recorder within the process, so several sessions can
//! record into the same directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::state::MonitorOptions;
use crate::error::{GymError, GymResult};

/// Prefix shared by every file the recorder owns.
pub const FILE_PREFIX: &str = "openaigym";

static NEXT_RECORDER_ID: AtomicU64 = AtomicU64::new(0);

/// Contents of a stats file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub initial_reset_timestamp: Option<f64>,
    pub timestamps: Vec<f64>,
    pub episode_lengths: Vec<u64>,
    pub episode_rewards: Vec<f64>,
    pub episode_types: Vec<String>,
}

/// Contents of a manifest file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub stats: String,
    pub videos: Vec<String>,
    pub env_info: EnvInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvInfo {
    pub env_id: String,
    pub gym_version: String,
}

/// Accumulates episode statistics for one environment handle
#[derive(Debug)]
pub struct StatsRecorder {
    directory: PathBuf,
    env_id: String,
    recorder_id: u64,
    stats: EpisodeStats,
    episode_steps: u64,
    episode_reward: f64,
    in_episode: bool,
}

impl StatsRecorder {
    /// Prepare `directory` for recording.
    ///
    /// Pre-existing `openaigym.*` files are deleted with `force`, kept with
    /// `resume`, and rejected otherwise.
    pub fn open(directory: impl Into<PathBuf>, env_id: impl Into<String>, options: MonitorOptions) -> GymResult<Self> {
        options.validate()?;
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| unusable_dir(&directory, e))?;
        if !directory.is_dir() {
            return Err(unusable_dir(&directory, "not a directory"));
        }

        let existing = existing_outputs(&directory)?;
        if !existing.is_empty() {
            if options.force {
                info!(
                    "Clearing {} prior monitor files from {}",
                    existing.len(),
                    directory.display()
                );
                for path in existing {
                    fs::remove_file(&path)?;
                }
            } else if !options.resume {
                return Err(GymError::InvalidArgument(format!(
                    "Trying to write to monitor directory {} with existing output files. \
                     Pass force=true to clear them or resume=true to merge with them.",
                    directory.display()
                )));
            }
        }

        Ok(Self {
            directory,
            env_id: env_id.into(),
            recorder_id: NEXT_RECORDER_ID.fetch_add(1, Ordering::SeqCst),
            stats: EpisodeStats::default(),
            episode_steps: 0,
            episode_reward: 0.0,
            in_episode: false,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Episode stats gathered so far
    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    pub fn on_reset(&mut self) {
        if self.in_episode && self.episode_steps > 0 {
            debug!("Episode reset after {} steps without finishing", self.episode_steps);
            self.finish_episode();
        }
        if self.stats.initial_reset_timestamp.is_none() {
            self.stats.initial_reset_timestamp = Some(now());
        }
        self.in_episode = true;
        self.episode_steps = 0;
        self.episode_reward = 0.0;
    }

    pub fn on_step(&mut self, reward: f64, done: bool) {
        if !self.in_episode {
            return;
        }
        self.episode_steps += 1;
        self.episode_reward += reward;
        if done {
            self.finish_episode();
        }
    }

    fn finish_episode(&mut self) {
        self.stats.timestamps.push(now());
        self.stats.episode_lengths.push(self.episode_steps);
        self.stats.episode_rewards.push(self.episode_reward);
        self.stats.episode_types.push("t".to_string());
        self.in_episode = false;
        self.episode_steps = 0;
        self.episode_reward = 0.0;
    }

    /// Flush stats and manifest to disk. Returns the manifest path.
    pub fn close(self) -> GymResult<PathBuf> {
        if self.in_episode && self.episode_steps > 0 {
            warn!(
                "Monitor closed mid-episode; the unfinished episode ({} steps) is not recorded",
                self.episode_steps
            );
        }

        let pid = std::process::id();
        let stats_name = format!("{}.episode_batch.{}.{}.stats.json", FILE_PREFIX, self.recorder_id, pid);
        let manifest_name = format!("{}.manifest.{}.{}.manifest.json", FILE_PREFIX, self.recorder_id, pid);

        let stats_json = serde_json::to_vec(&self.stats).map_err(serialize_failed)?;
        fs::write(self.directory.join(&stats_name), stats_json)?;

        let manifest = Manifest {
            stats: stats_name,
            videos: Vec::new(),
            env_info: EnvInfo {
                env_id: self.env_id.clone(),
                gym_version: format!("gymhost-{}", env!("CARGO_PKG_VERSION")),
            },
        };
        let manifest_path = self.directory.join(manifest_name);
        let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(serialize_failed)?;
        fs::write(&manifest_path, manifest_json)?;

        info!(
            "Wrote {} episodes of {} to {}",
            self.stats.episode_lengths.len(),
            self.env_id,
            manifest_path.display()
        );
        Ok(manifest_path)
    }
}

/// The caller named a directory we cannot record into.
fn unusable_dir(directory: &Path, reason: impl std::fmt::Display) -> GymError {
    GymError::InvalidArgument(format!("Cannot record to {}: {}", directory.display(), reason))
}

/// Our own output failed to serialize; not the caller's fault.
fn serialize_failed(err: serde_json::Error) -> GymError {
    GymError::Internal(format!("Failed to serialize monitor output: {}", err))
}

/// Every recorder-owned file in `directory`.
pub fn existing_outputs(directory: &Path) -> GymResult<Vec<PathBuf>> {
    matching(directory, &format!("{}.*", FILE_PREFIX))
}

/// Manifest files in `directory`.
pub fn manifests(directory: &Path) -> GymResult<Vec<PathBuf>> {
    matching(directory, &format!("{}.manifest.*.manifest.json", FILE_PREFIX))
}

/// Load a manifest together with the stats file it points at.
pub fn load_manifest(path: &Path) -> GymResult<(Manifest, EpisodeStats)> {
    let manifest: Manifest = serde_json::from_slice(&fs::read(path)?)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let stats: EpisodeStats = serde_json::from_slice(&fs::read(dir.join(&manifest.stats))?)?;
    Ok((manifest, stats))
}

fn matching(directory: &Path, file_pattern: &str) -> GymResult<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&directory.to_string_lossy());
    let pattern = format!("{}/{}", escaped, file_pattern);
    let paths = glob::glob(&pattern)
        .map_err(|e| GymError::Internal(format!("Bad monitor glob {}: {}", pattern, e)))?
        .filter_map(Result::ok)
        .collect();
    Ok(paths)
}

fn now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
