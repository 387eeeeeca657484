use crate::types::CommonInput;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_TRANSCRIPT_PATH: &str = "CLAUDE_TRANSCRIPT_PATH";
pub const ENV_SESSION_ID: &str = "CLAUDE_SESSION_ID";
pub const ENV_MIN_MESSAGES: &str = "LEARN_MIN_MESSAGES";

/// User turns needed before a compaction dumps the transcript.
pub const DEFAULT_COMPACTION_MIN_MESSAGES: usize = 8;
/// User turns needed before session end recommends a learning pass.
pub const DEFAULT_SESSION_MIN_MESSAGES: usize = 10;

const CLAUDE_DIR: &str = ".claude";
const SESSIONS_DIR: &str = "sessions";
const LEARNED_SKILLS_DIR: &str = "skills/learned";
const CONFIG_FILE: &str = "skills/continuous-learning/config.json";

/// The continuous-learning config file. Only the two fields the hooks
/// consume are read, each on its own, so a bad value in one never costs
/// the other. Anything else in the file is ignored.
///
/// ```json
/// { "min_session_length": 10, "learned_skills_path": "~/.claude/skills/learned" }
/// ```
#[derive(Debug, Default, PartialEq)]
pub struct LearningConfig {
    pub min_session_length: Option<usize>,
    pub learned_skills_path: Option<String>,
}

impl LearningConfig {
    /// Load the config file. A missing, unreadable, or malformed file
    /// yields the defaults.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!("no learning config at {}: {e}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                debug!("ignoring malformed {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Pick the known fields out of parsed JSON. A field of the wrong type
    /// is treated as absent.
    pub fn from_value(value: &Value) -> Self {
        let min_session_length = value.get("min_session_length").and_then(|v| {
            let n = v.as_u64().map(|n| n as usize).or_else(|| {
                v.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.ceil() as usize)
            });
            if n.is_none() {
                debug!("ignoring min_session_length {v}");
            }
            n
        });
        let learned_skills_path = value
            .get("learned_skills_path")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self {
            min_session_length,
            learned_skills_path,
        }
    }
}

/// Directory overrides supplied on the command line.
#[derive(Debug, Default, Clone)]
pub struct Locations {
    /// Root of the assistant's state, normally `~/.claude`.
    pub claude_dir: Option<PathBuf>,
    /// Continuous-learning config file.
    pub config_file: Option<PathBuf>,
}

/// Everything a hook needs to know, resolved once at startup.
///
/// Precedence for each value: environment, then the hook payload on stdin,
/// then the config file, then the built-in default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub transcript_path: Option<PathBuf>,
    pub session_id: Option<String>,
    /// `LEARN_MIN_MESSAGES`, applies to compaction only.
    pub min_messages_override: Option<usize>,
    /// From the config file, applies to session end only.
    pub min_session_length: Option<usize>,
    pub sessions_dir: PathBuf,
    pub learned_skills_dir: PathBuf,
    /// Used when the transcript doesn't say where the session ran.
    pub fallback_cwd: PathBuf,
}

impl Settings {
    /// Resolve settings from an environment lookup, the optional hook
    /// payload, and command-line locations.
    pub fn resolve<F>(
        env: F,
        payload: Option<&CommonInput>,
        locations: &Locations,
        home: Option<&Path>,
        process_cwd: Option<PathBuf>,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        let claude_dir = match &locations.claude_dir {
            Some(dir) => dir.clone(),
            None => home
                .map(|h| h.join(CLAUDE_DIR))
                .context("could not determine home directory")?,
        };
        let config_file = locations
            .config_file
            .clone()
            .unwrap_or_else(|| claude_dir.join(CONFIG_FILE));
        let config = LearningConfig::load(&config_file);

        let transcript_path = env(ENV_TRANSCRIPT_PATH)
            .or_else(|| payload.and_then(|p| p.transcript_path.clone()))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let session_id = env(ENV_SESSION_ID)
            .or_else(|| payload.and_then(|p| p.session_id.clone()))
            .filter(|s| !s.is_empty());

        let min_messages_override = env(ENV_MIN_MESSAGES).and_then(|raw| {
            match raw.trim().parse::<usize>() {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("ignoring {ENV_MIN_MESSAGES}={raw:?}: {e}");
                    None
                }
            }
        });

        let learned_skills_dir = config
            .learned_skills_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| expand_home(p, home))
            .unwrap_or_else(|| claude_dir.join(LEARNED_SKILLS_DIR));

        let fallback_cwd = payload
            .and_then(|p| p.cwd.as_deref())
            .filter(|c| !c.is_empty())
            .map(PathBuf::from)
            .or(process_cwd)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            transcript_path,
            session_id,
            min_messages_override,
            min_session_length: config.min_session_length.filter(|&n| n > 0),
            sessions_dir: claude_dir.join(SESSIONS_DIR),
            learned_skills_dir,
            fallback_cwd,
        })
    }

    /// Resolve from the real process environment and home directory.
    pub fn from_process(payload: Option<&CommonInput>, locations: &Locations) -> Result<Self> {
        let process_cwd = std::env::current_dir()
            .map_err(|e| debug!("reading current directory: {e}"))
            .ok();
        Self::resolve(
            |key| std::env::var(key).ok(),
            payload,
            locations,
            dirs::home_dir().as_deref(),
            process_cwd,
        )
    }

    /// The transcript to inspect, if one was named and exists.
    pub fn transcript(&self) -> Option<&Path> {
        self.transcript_path.as_deref().filter(|p| p.exists())
    }

    pub fn compaction_threshold(&self) -> usize {
        self.min_messages_override
            .unwrap_or(DEFAULT_COMPACTION_MIN_MESSAGES)
    }

    pub fn session_end_threshold(&self) -> usize {
        self.min_session_length
            .unwrap_or(DEFAULT_SESSION_MIN_MESSAGES)
    }
}

/// Expand a leading `~` (alone or followed by `/`) to the home directory.
fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}
