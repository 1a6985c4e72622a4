//! JSON persistence for roster, attendance and the authenticated-user
//! marker.
//!
//! Layout under the data directory (default `~/.avs-attendance/`):
//! - `records.json` - versioned snapshot of students + attendance
//! - `current_user.json` - authenticated-user marker
//! - `config.json` - optional runtime configuration (read by `config`)

use crate::attendance::AttendanceRecord;
use crate::auth::CurrentUser;
use crate::roster::Student;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current snapshot format version.
/// Increment this when making breaking changes to the snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

const DATA_DIR: &str = ".avs-attendance";

/// Returns the default data directory, `~/.avs-attendance/`. The directory
/// itself is created by [`DataStore::open`].
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_data_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().context("Could not determine home directory for attendance storage")?;
    Ok(home.join(DATA_DIR))
}

/// A persistable snapshot of all attendance records.
#[derive(Debug, Serialize, Deserialize)]
struct RecordsSnapshot {
    /// Snapshot format version for migration compatibility
    version: u32,
    /// Timestamp when this snapshot was saved (RFC3339 format)
    saved_at: String,
    students: Vec<Student>,
    attendance: Vec<AttendanceRecord>,
}

/// File-backed store for everything the tool persists.
pub struct DataStore {
    dir: PathBuf,
}

impl DataStore {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    fn records_path(&self) -> PathBuf {
        self.dir.join("records.json")
    }

    fn current_user_path(&self) -> PathBuf {
        self.dir.join("current_user.json")
    }

    /// Loads the persisted students and attendance records. A missing
    /// snapshot is an empty dataset, not an error.
    pub fn load_records(&self) -> Result<(Vec<Student>, Vec<AttendanceRecord>)> {
        let path = self.records_path();
        if !path.exists() {
            return Ok((Vec::new(), Vec::new()));
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read records file: {}", path.display()))?;
        let snapshot: RecordsSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse records file: {}", path.display()))?;
        if snapshot.version > SNAPSHOT_VERSION {
            bail!(
                "Records file {} has version {} but this build understands up to {}",
                path.display(),
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }
        tracing::debug!(
            students = snapshot.students.len(),
            attendance = snapshot.attendance.len(),
            "loaded records snapshot"
        );
        Ok((snapshot.students, snapshot.attendance))
    }

    /// Persists the full dataset as one snapshot.
    pub fn save_records(
        &self,
        students: &[Student],
        attendance: &[AttendanceRecord],
    ) -> Result<()> {
        let snapshot = RecordsSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            students: students.to_vec(),
            attendance: attendance.to_vec(),
        };
        let path = self.records_path();
        let json = serde_json::to_string_pretty(&snapshot)
            .context("Failed to serialize records snapshot")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write records file: {}", path.display()))?;
        Ok(())
    }

    /// Reads the authenticated-user marker, if a staff member is logged in.
    pub fn current_user(&self) -> Result<Option<CurrentUser>> {
        let path = self.current_user_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read current user file: {}", path.display()))?;
        let user = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse current user file: {}", path.display()))?;
        Ok(Some(user))
    }

    /// Writes the authenticated-user marker on login.
    pub fn set_current_user(&self, user: &CurrentUser) -> Result<()> {
        let path = self.current_user_path();
        let json = serde_json::to_string_pretty(user)
            .context("Failed to serialize current user marker")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write current user file: {}", path.display()))?;
        Ok(())
    }

    /// Removes the authenticated-user marker on logout or expiry. Removing
    /// an already-absent marker is a no-op.
    pub fn clear_current_user(&self) -> Result<()> {
        let path = self.current_user_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove current user file: {}", path.display())),
        }
    }
}
