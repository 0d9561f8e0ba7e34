//! Trajectory recorder implementation

use crate::error::{Result, TrajectoryError};
use crate::trajectory::{EntryType, TrajectoryEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// Records every step of a run for later audit
pub struct TrajectoryRecorder {
    id: String,
    entries: RwLock<Vec<TrajectoryEntry>>,
    file_path: Option<PathBuf>,
    auto_save: bool,
}

/// Complete trajectory data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Metadata about the trajectory
    pub metadata: TrajectoryMetadata,

    /// All trajectory entries
    pub entries: Vec<TrajectoryEntry>,
}

/// Metadata for a trajectory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryMetadata {
    /// Unique identifier for this trajectory
    pub id: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Timestamp of the last entry
    pub completed_at: Option<DateTime<Utc>>,

    /// Version of the trajectory format
    pub version: String,

    /// Mission text the run was given
    pub task: Option<String>,

    /// Terminal status, once the run has finished
    pub status: Option<String>,

    /// Number of entries
    pub total_entries: usize,

    /// Total duration in milliseconds
    pub duration_ms: Option<u64>,
}

impl TrajectoryRecorder {
    /// Create an in-memory recorder
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entries: RwLock::new(Vec::new()),
            file_path: None,
            auto_save: false,
        }
    }

    /// Create a recorder that rewrites `path` after every entry
    pub fn with_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_path: Some(path.as_ref().to_path_buf()),
            auto_save: true,
            ..Self::new()
        }
    }

    /// Create a recorder writing to `dir/trajectory_<timestamp>.json`
    pub fn with_auto_filename<P: AsRef<Path>>(dir: P) -> Self {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = dir
            .as_ref()
            .join(format!("trajectory_{}.json", timestamp));
        Self::with_file(path)
    }

    /// Record a trajectory entry
    pub async fn record(&self, entry: TrajectoryEntry) -> Result<()> {
        {
            let mut entries = self.entries.write().await;
            entries.push(entry);
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Get all recorded entries
    pub async fn get_entries(&self) -> Vec<TrajectoryEntry> {
        self.entries.read().await.clone()
    }

    /// Get the number of recorded entries
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Save the trajectory to file
    pub async fn save(&self) -> Result<()> {
        if let Some(path) = &self.file_path {
            let trajectory = self.build_trajectory().await;
            let json = serde_json::to_string_pretty(&trajectory).map_err(|e| {
                TrajectoryError::RecordingFailed {
                    message: format!("Failed to serialize trajectory: {}", e),
                }
            })?;

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }

            fs::write(path, json).await?;
        }

        Ok(())
    }

    /// Load a trajectory from file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Trajectory> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TrajectoryError::LoadFailed {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = fs::read_to_string(path).await?;
        let trajectory: Trajectory =
            serde_json::from_str(&content).map_err(|_| TrajectoryError::InvalidFormat)?;

        Ok(trajectory)
    }

    /// Build a complete trajectory from recorded entries
    pub async fn build_trajectory(&self) -> Trajectory {
        let entries = self.entries.read().await.clone();

        let started_at = entries
            .first()
            .map(|e| e.timestamp)
            .unwrap_or_else(Utc::now);
        let completed_at = entries.last().map(|e| e.timestamp);
        let duration_ms =
            completed_at.map(|end| (end - started_at).num_milliseconds().max(0) as u64);

        let mut task = None;
        let mut status = None;
        for entry in &entries {
            match &entry.entry_type {
                EntryType::TaskStart { task: t, .. } => task = Some(t.clone()),
                EntryType::RunComplete { status: s, .. } => status = Some(s.clone()),
                _ => {}
            }
        }

        let metadata = TrajectoryMetadata {
            id: self.id.clone(),
            started_at,
            completed_at,
            version: "1.0".to_string(),
            task,
            status,
            total_entries: entries.len(),
            duration_ms,
        };

        Trajectory { metadata, entries }
    }

    /// Get the file path if set
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

impl Default for TrajectoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs").join("trajectory.json");
        let recorder = TrajectoryRecorder::with_file(&path);

        recorder
            .record(TrajectoryEntry::task_start(
                "Find jeans".to_string(),
                serde_json::json!({"max_iterations": 3}),
            ))
            .await
            .unwrap();
        recorder
            .record(TrajectoryEntry::run_complete(
                "completed".to_string(),
                1,
                0,
                42,
                None,
            ))
            .await
            .unwrap();

        assert!(path.exists());
        let loaded = TrajectoryRecorder::load(&path).await.unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.metadata.task.as_deref(), Some("Find jeans"));
        assert_eq!(loaded.metadata.status.as_deref(), Some("completed"));
        assert_eq!(loaded.metadata.total_entries, 2);
    }

    #[tokio::test]
    async fn test_in_memory_recorder_writes_nothing() {
        let recorder = TrajectoryRecorder::new();
        recorder
            .record(TrajectoryEntry::error("boom".to_string(), None, 0))
            .await
            .unwrap();
        assert_eq!(recorder.entry_count().await, 1);
        assert!(recorder.file_path().is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = TrajectoryRecorder::load(dir.path().join("nope.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }

    #[tokio::test]
    async fn test_auto_filename_lands_in_directory() {
        let dir = TempDir::new().unwrap();
        let recorder = TrajectoryRecorder::with_auto_filename(dir.path());
        let path = recorder.file_path().unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("trajectory_"));
    }
}
