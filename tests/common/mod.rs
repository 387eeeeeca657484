#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const BIN: &str = env!("CARGO_BIN_EXE_learnhook");

/// A scratch `HOME` with its own `.claude` directory.
pub struct Sandbox {
    pub home: tempfile::TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            home: tempfile::tempdir().unwrap(),
        }
    }

    pub fn claude_dir(&self) -> PathBuf {
        self.home.path().join(".claude")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.claude_dir().join("sessions")
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.sessions_dir().join("learning-queue")
    }

    pub fn compaction_log(&self) -> String {
        fs::read_to_string(self.sessions_dir().join("compaction-log.txt")).unwrap_or_default()
    }

    /// Sorted file names in the learning queue (empty if it doesn't exist).
    pub fn queue_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.queue_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// The binary with `HOME` pointed at the sandbox and every hook
    /// variable cleared before `env` is applied.
    pub fn command(&self, args: &[&str], env: &[(&str, &str)]) -> Command {
        let mut cmd = Command::new(BIN);
        cmd.args(args)
            .env("HOME", self.home.path())
            .env_remove("CLAUDE_TRANSCRIPT_PATH")
            .env_remove("CLAUDE_SESSION_ID")
            .env_remove("LEARN_MIN_MESSAGES")
            .env_remove("LEARNHOOK_LOG")
            .current_dir(self.home.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd
    }

    pub fn run(&self, args: &[&str], env: &[(&str, &str)], stdin: &str) -> (i32, String, String) {
        let mut child = self
            .command(args, env)
            .spawn()
            .expect("failed to spawn binary");
        child
            .stdin
            .as_mut()
            .unwrap()
            .write_all(stdin.as_bytes())
            .unwrap();
        let output = child.wait_with_output().unwrap();
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }
}

/// Write a transcript with `turns` user/assistant exchanges recorded in `cwd`.
pub fn write_transcript(path: &Path, turns: usize, cwd: &str) {
    let mut out = String::new();
    for i in 0..turns {
        out.push_str(&format!(
            r#"{{"type":"user","uuid":"u{i}","isSidechain":false,"userType":"external","cwd":"{cwd}","sessionId":"s","timestamp":"t","version":"v","message":{{"role":"user","content":"step {i}"}}}}"#
        ));
        out.push('\n');
        out.push_str(&format!(
            r#"{{"type":"assistant","uuid":"a{i}","parentUuid":"u{i}","isSidechain":false,"userType":"external","cwd":"{cwd}","sessionId":"s","timestamp":"t","version":"v","message":{{"role":"assistant","content":[{{"type":"text","text":"done {i}"}}]}}}}"#
        ));
        out.push('\n');
    }
    fs::write(path, out).unwrap();
}

/// A git repo with an initial commit on `main` and the given `origin`.
/// The `TempDir` must be kept alive for the duration of the test.
pub fn temp_git_repo(origin: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = git2::Repository::init_opts(dir.path(), &opts).unwrap();
    repo.remote("origin", origin).unwrap();

    let sig = git2::Signature::now("Test", "test@test.com").unwrap();
    let tree_oid = repo.index().unwrap().write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    dir
}

pub fn session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
