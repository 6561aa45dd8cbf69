use tracing::warn;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::data::{IntakeError, IntakeSubmission};

const STAGING_FILE: &str = "pendingProjectData.json";

/// The one record handed from signup to project creation, kept on the
/// client's own disk until the project exists.
#[derive(Debug, Clone)]
pub struct PendingProjectStore {
    path: PathBuf,
}

impl PendingProjectStore {
    pub fn new(dir: &Path) -> PendingProjectStore {
        PendingProjectStore {
            path: dir.join(STAGING_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, submission: &IntakeSubmission) -> Result<(), IntakeError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| IntakeError::Staging(e.to_string()))?;
        }
        let data =
            serde_json::to_string(submission).map_err(|e| IntakeError::Staging(e.to_string()))?;

        fs::write(&self.path, data).map_err(|e| IntakeError::Staging(e.to_string()))
    }

    /// Reads the staged record without removing it.
    pub fn load(&self) -> Result<Option<IntakeSubmission>, IntakeError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IntakeError::Staging(e.to_string())),
        };

        match serde_json::from_str(&data) {
            Ok(submission) => Ok(Some(submission)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable staging record");
                Err(IntakeError::Staging(
                    "could not load pre-filled project data".to_string(),
                ))
            }
        }
    }

    pub fn clear(&self) -> Result<(), IntakeError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IntakeError::Staging(e.to_string())),
        }
    }
}
