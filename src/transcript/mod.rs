use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Marker the host writes on every user turn in a `.jsonl` transcript.
pub const USER_TURN_MARKER: &str = r#""type":"user""#;

// ===================================================================
// Turn counting
// ===================================================================

/// Count occurrences of the user-turn marker in raw transcript text.
///
/// This is a substring count, not a JSON parse, so a half-written trailing
/// line or any other malformed record never changes the result for the
/// lines around it.
pub fn count_marker(contents: &str) -> usize {
    contents.matches(USER_TURN_MARKER).count()
}

/// Read a transcript and count its user turns.
pub fn count_user_turns(path: &Path) -> Result<usize> {
    let bytes = fs::read(path)
        .with_context(|| format!("reading transcript {}", path.display()))?;
    Ok(count_marker(&String::from_utf8_lossy(&bytes)))
}

// ===================================================================
// Working directory probe
// ===================================================================

/// The only field we care about on a transcript line.
#[derive(Debug, Deserialize)]
struct CwdProbe {
    #[serde(default)]
    cwd: Option<String>,
}

/// The `cwd` carried by the first transcript line that has one.
///
/// Lines that fail to parse are skipped. Returns `None` when the file can't
/// be read or no line carries a non-empty `cwd`.
pub fn first_cwd(path: &Path) -> Option<String> {
    let contents = fs::read(path).ok()?;
    first_cwd_in(&String::from_utf8_lossy(&contents))
}

fn first_cwd_in(contents: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<CwdProbe>(line).ok())
        .find_map(|probe| probe.cwd.filter(|c| !c.is_empty()))
}
