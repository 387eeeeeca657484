use crate::metadata::{Provenance, QueueMetadata};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Queue directory name, relative to the sessions directory.
pub const QUEUE_DIR: &str = "learning-queue";

const SNAPSHOT_EXT: &str = "jsonl";
const SHORT_ID_LEN: usize = 8;
const UNKNOWN_SESSION: &str = "unknown";

/// Timestamp layout shared by queue file names and the compaction log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The last eight characters of a session id, or `unknown` when empty.
pub fn short_session_id(session_id: &str) -> String {
    if session_id.is_empty() {
        return UNKNOWN_SESSION.to_string();
    }
    let len = session_id.chars().count();
    session_id
        .chars()
        .skip(len.saturating_sub(SHORT_ID_LEN))
        .collect()
}

/// Shared base name of a queue entry's `.jsonl` and `.meta.json` files.
pub fn entry_base(captured_at: &DateTime<Local>, session_id: &str) -> String {
    let stamp = captured_at
        .format(TIMESTAMP_FORMAT)
        .to_string()
        .replace([':', ' '], "-");
    format!("{stamp}-{}", short_session_id(session_id))
}

/// Paths and record of a successfully queued transcript.
#[derive(Debug)]
pub struct QueuedEntry {
    pub transcript_path: PathBuf,
    pub metadata_path: PathBuf,
    pub metadata: QueueMetadata,
}

impl QueuedEntry {
    /// File name of the transcript snapshot.
    pub fn file_name(&self) -> &str {
        &self.metadata.transcript_file
    }
}

/// `<sessions>/learning-queue/`: transcript snapshots waiting for the
/// downstream learner, each paired with a `.meta.json` sidecar.
///
/// Entries are only ever added here; whoever consumes the queue owns
/// removing them.
pub struct LearningQueue {
    dir: PathBuf,
}

impl LearningQueue {
    pub fn new(sessions_dir: &Path) -> Self {
        Self {
            dir: sessions_dir.join(QUEUE_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `transcript` into the queue and write its metadata sidecar.
    ///
    /// The snapshot is copied first; metadata is only written once the copy
    /// it names exists. If the metadata can't be written the snapshot is
    /// removed again. An existing entry with the same base name is
    /// overwritten.
    pub fn enqueue(&self, transcript: &Path, provenance: Provenance) -> Result<QueuedEntry> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let base = entry_base(&provenance.captured_at, &provenance.session_id);
        let transcript_file = format!("{base}.{SNAPSHOT_EXT}");
        let transcript_path = self.dir.join(&transcript_file);
        let metadata_path = self.dir.join(format!("{base}.meta.json"));

        fs::copy(transcript, &transcript_path).with_context(|| {
            format!(
                "copying {} to {}",
                transcript.display(),
                transcript_path.display()
            )
        })?;

        let metadata = QueueMetadata::new(provenance, transcript_file);
        let written = serde_json::to_string_pretty(&metadata)
            .context("serializing queue metadata")
            .and_then(|json| {
                fs::write(&metadata_path, json)
                    .with_context(|| format!("writing {}", metadata_path.display()))
            });
        if let Err(err) = written {
            // Consumers expect pairs: drop the snapshot that has no sidecar.
            if let Err(e) = fs::remove_file(&transcript_path) {
                warn!("removing {}: {e}", transcript_path.display());
            }
            return Err(err);
        }

        Ok(QueuedEntry {
            transcript_path,
            metadata_path,
            metadata,
        })
    }

    /// Number of `.jsonl` snapshots waiting in the queue. Unreadable or
    /// missing queue directories count as empty.
    pub fn pending_count(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == SNAPSHOT_EXT))
            .count()
    }
}
