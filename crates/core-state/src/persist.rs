//! Persisted keys, the schema gate, and export/import.

use core_model::UserResponse;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Bump whenever the persisted response shape changes incompatibly. A
/// mismatch clears stored responses rather than trying to migrate them.
pub const SCHEMA_VERSION: &str = "3";

pub const KEY_RESPONSES: &str = "mapper:responses";
pub const KEY_SCHEMA: &str = "mapper:schema";
pub const KEY_WATCHED: &str = "mapper:watchedVideos";

/// Outcome of the startup schema gate, surfaced so the UI can tell the
/// user when progress could not be restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressRestored {
    /// No prior state existed.
    Fresh,
    /// Responses restored; the count is what came back.
    Restored(usize),
    /// Persisted schema differed: responses were cleared.
    Incompatible,
}

/// Self-contained export of a user's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBlob {
    /// Epoch seconds at export time.
    pub exported_at: u64,
    pub schema_version: String,
    pub responses: Vec<UserResponse>,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed export blob: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("export schema {found} is incompatible with {expected}")]
    Incompatible { found: String, expected: String },
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Serialize the response history as a portable JSON blob.
pub fn export_blob(responses: &[UserResponse]) -> String {
    let blob = ExportBlob {
        exported_at: epoch_millis() / 1000,
        schema_version: SCHEMA_VERSION.to_string(),
        responses: responses.to_vec(),
    };
    serde_json::to_string_pretty(&blob).expect("export blob serialization is infallible")
}

/// Parse and validate a previously exported blob.
pub fn parse_export(json: &str) -> Result<Vec<UserResponse>, ImportError> {
    let blob: ExportBlob = serde_json::from_str(json)?;
    if blob.schema_version != SCHEMA_VERSION {
        return Err(ImportError::Incompatible {
            found: blob.schema_version,
            expected: SCHEMA_VERSION.to_string(),
        });
    }
    Ok(blob.responses)
}
