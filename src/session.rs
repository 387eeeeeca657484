use anyhow::{Context, Result};
use crate::git::RepositoryInfoProvider;
use crate::metadata::Provenance;
use crate::queue::{LearningQueue, TIMESTAMP_FORMAT};
use crate::settings::Settings;
use crate::transcript;
use crate::types::HookOutput;
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const COMPACTION_LOG: &str = "compaction-log.txt";
const SCRATCH_EXT: &str = "tmp";
const LEARN_COMMAND: &str = "/auto-learn";
const UNKNOWN_SESSION: &str = "unknown";

/// Append text to a file, creating it if needed.
fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("appending to {}", path.display()))
}

fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))
}

/// Log a failed optional step and carry on.
fn soft<T>(result: Result<T>, what: &str) -> Option<T> {
    result
        .map_err(|err| warn!("{what}: {err:#}"))
        .ok()
}

/// The most recently modified `*.tmp` file directly inside `dir`.
fn newest_scratch_file(dir: &Path) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == SCRATCH_EXT))
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            meta.is_file().then(|| (meta.modified().ok(), e.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

fn hint(message: String) -> Option<HookOutput> {
    Some(HookOutput {
        system_message: Some(message),
    })
}

/// One hook invocation: resolved settings plus the repository lookup used
/// to annotate queue entries.
pub struct Session<'a> {
    settings: Settings,
    queue: LearningQueue,
    repo_info: &'a dyn RepositoryInfoProvider,
}

impl<'a> Session<'a> {
    pub fn open(settings: Settings, repo_info: &'a dyn RepositoryInfoProvider) -> Self {
        let queue = LearningQueue::new(&settings.sessions_dir);
        Self {
            settings,
            queue,
            repo_info,
        }
    }

    fn compaction_log_path(&self) -> PathBuf {
        self.settings.sessions_dir.join(COMPACTION_LOG)
    }

    /// Count user turns, treating an unreadable transcript as empty.
    fn user_turns(&self, path: &Path) -> usize {
        transcript::count_user_turns(path).unwrap_or_else(|err| {
            debug!("{err:#}");
            0
        })
    }

    /// Where the session ran: the transcript's own `cwd` if it records one,
    /// otherwise the fallback from settings.
    fn working_dir(&self, transcript: &Path) -> String {
        transcript::first_cwd(transcript)
            .unwrap_or_else(|| self.settings.fallback_cwd.to_string_lossy().into_owned())
    }

    // ---------------------------------------------------------------
    // Hook handlers
    // ---------------------------------------------------------------

    /// Session end: recommend a learning pass for long sessions and report
    /// the queue backlog. Never writes to the queue.
    pub fn handle_stop(&self) -> Result<Option<HookOutput>> {
        soft(
            ensure_dir(&self.settings.learned_skills_dir),
            "preparing learned skills directory",
        );

        let Some(path) = self.settings.transcript() else {
            return Ok(None);
        };

        let count = self.user_turns(path);
        let min = self.settings.session_end_threshold();
        if count < min {
            info!("Session too short ({count} messages), skipping");
            return Ok(None);
        }

        info!("Session has {count} messages - evaluate for extractable patterns");
        info!("Run {LEARN_COMMAND} to extract patterns from this session");

        let pending = self.queue.pending_count();
        debug!("{pending} pending in {}", self.queue.dir().display());
        let mut message = format!(
            "[learnhook] session has {count} messages; run {LEARN_COMMAND} to extract patterns"
        );
        if pending > 0 {
            info!("📚 {pending} transcript(s) pending in learning-queue");
            info!("Run {LEARN_COMMAND} to process them");
            message.push_str(&format!(", {pending} transcript(s) pending in learning-queue"));
        }
        Ok(hint(message))
    }

    pub fn handle_pre_compact(&self) -> Result<Option<HookOutput>> {
        self.handle_pre_compact_at(Local::now())
    }

    /// Before compaction: log the event, mark the active scratch file, and
    /// hand a long enough transcript off to the learning queue.
    pub fn handle_pre_compact_at(&self, now: DateTime<Local>) -> Result<Option<HookOutput>> {
        ensure_dir(&self.settings.sessions_dir)?;
        soft(
            ensure_dir(&self.settings.learned_skills_dir),
            "preparing learned skills directory",
        );

        let log_path = self.compaction_log_path();
        let timestamp = now.format(TIMESTAMP_FORMAT);
        soft(
            append(&log_path, &format!("[{timestamp}] Context compaction triggered\n")),
            "writing compaction log",
        );

        if let Some(scratch) = newest_scratch_file(&self.settings.sessions_dir) {
            let marker = format!(
                "\n---\n**[Compaction occurred at {}]** - Context was summarized\n",
                now.format("%H:%M")
            );
            soft(append(&scratch, &marker), "annotating active session file");
        }

        if let Some(path) = self.settings.transcript() {
            let count = self.user_turns(path);
            let min = self.settings.compaction_threshold();
            if count >= min {
                self.dump_transcript(path, count, now);
            } else {
                debug!("{count} messages is below {min}, not queueing transcript");
            }
        }

        info!("State saved before compaction");
        Ok(None)
    }

    /// Copy the transcript into the learning queue. A failure is logged and
    /// leaves the rest of the hook untouched.
    fn dump_transcript(&self, path: &Path, message_count: usize, now: DateTime<Local>) {
        let cwd = self.working_dir(path);
        let git = self
            .repo_info
            .repository_info(Path::new(&cwd))
            .unwrap_or_default();
        let provenance = Provenance {
            captured_at: now,
            session_id: self
                .settings
                .session_id
                .clone()
                .unwrap_or_else(|| UNKNOWN_SESSION.to_string()),
            message_count,
            cwd,
            git,
        };

        match self.queue.enqueue(path, provenance) {
            Ok(entry) => {
                info!(
                    "📚 Transcript dumped for learning: {}",
                    entry.transcript_path.display()
                );
                info!("Messages saved: {message_count}");
                debug!("metadata written to {}", entry.metadata_path.display());
                soft(
                    append(
                        &self.compaction_log_path(),
                        &format!("  -> Dumped {message_count} messages to {}\n", entry.file_name()),
                    ),
                    "writing compaction log",
                );
            }
            Err(err) => warn!("Failed to dump transcript: {err:#}"),
        }
    }
}
