use crate::git::GitInfo;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Where a transcript snapshot came from, gathered by the pre-compaction
/// hook before the hand-off.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub captured_at: DateTime<Local>,
    pub session_id: String,
    pub message_count: usize,
    pub cwd: String,
    pub git: GitInfo,
}

/// Sidecar record written next to each queued transcript.
/// Stored as `learning-queue/<base>.meta.json` and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetadata {
    pub timestamp: String,
    pub session_id: String,
    pub message_count: usize,
    pub cwd: String,
    pub git: GitInfo,
    /// File name (not path) of the sibling `.jsonl` snapshot.
    pub transcript_file: String,
}

impl QueueMetadata {
    pub fn new(provenance: Provenance, transcript_file: String) -> Self {
        Self {
            timestamp: provenance.captured_at.to_rfc3339(),
            session_id: provenance.session_id,
            message_count: provenance.message_count,
            cwd: provenance.cwd,
            git: provenance.git,
            transcript_file,
        }
    }
}
