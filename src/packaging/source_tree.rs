//! Version-control work tree detection.

use crate::platform::process::run_with_timeout;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

pub const GIT_MARKER: &str = ".git";
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Nearest ancestor of `path` (itself included when it is a directory) that
/// holds a `.git` entry. Worktrees and submodules use a `.git` file, so any
/// entry type counts.
pub fn find_work_tree_root(path: &Path) -> Option<PathBuf> {
    let start = if path.is_dir() { path } else { path.parent()? };

    for ancestor in start.ancestors() {
        let marker = ancestor.join(GIT_MARKER);
        match fs::symlink_metadata(&marker) {
            Ok(_) => {
                log::debug!("Found {} in {}", GIT_MARKER, ancestor.display());
                return Some(ancestor.to_path_buf());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                log::debug!("Stopping work tree search at {}: {e}", ancestor.display());
                return None;
            }
            Err(e) => {
                log::warn!("Unexpected error checking {}: {e}", marker.display());
            }
        }
    }
    None
}

pub fn is_in_work_tree(path: &Path) -> bool {
    find_work_tree_root(path).is_some()
}

/// Ask git itself whether `dir` is inside a work tree.
///
/// `None` when git could not give an answer (not installed, not allowed to
/// run, timed out).
pub fn is_in_git_repo(dir: &Path, timeout: Duration) -> Option<bool> {
    let mut cmd = Command::new("git");
    cmd.args(["rev-parse", "--is-inside-work-tree"]).current_dir(dir);

    match run_with_timeout(cmd, timeout) {
        Ok(outcome) => Some(outcome.status.success() && outcome.stdout.trim() == "true"),
        Err(e) => {
            log::debug!("git work tree query failed: {e}");
            None
        }
    }
}

/// Git's own answer when it confirms a work tree, else the `.git` marker
/// walk. The walk also covers hosts without git and marker directories git
/// refuses to read.
pub fn in_source_tree(path: &Path, timeout: Duration) -> bool {
    let dir = if path.is_dir() { Some(path) } else { path.parent() };
    if let Some(dir) = dir
        && is_in_git_repo(dir, timeout) == Some(true)
    {
        log::debug!("git reports {} inside a work tree", dir.display());
        return true;
    }
    is_in_work_tree(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finds_marker_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("src/pkg")).unwrap();
        let file = root.join("src/pkg/main.py");
        fs::write(&file, b"print(1)\n").unwrap();

        assert_eq!(find_work_tree_root(&file).as_deref(), Some(root));
        assert_eq!(find_work_tree_root(&root.join("src")).as_deref(), Some(root));
    }

    #[test]
    fn test_marker_file_counts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".git"), b"gitdir: ../.git/worktrees/x\n").unwrap();
        let file = root.join("tool.py");
        fs::write(&file, b"").unwrap();

        assert!(is_in_work_tree(&file));
    }

    #[test]
    fn test_source_tree_from_git_or_marker() {
        let temp_dir = TempDir::new().unwrap();
        let plain = temp_dir.path().join("plain");
        fs::create_dir(&plain).unwrap();
        let file = plain.join("tool.py");
        fs::write(&file, b"").unwrap();
        assert!(!in_source_tree(&file, DEFAULT_GIT_TIMEOUT));

        // An empty marker directory is not a repository to git; the walk
        // still counts it.
        let marked = temp_dir.path().join("marked");
        fs::create_dir_all(marked.join(".git")).unwrap();
        let file = marked.join("tool.py");
        fs::write(&file, b"").unwrap();
        assert!(in_source_tree(&file, DEFAULT_GIT_TIMEOUT));
    }

    #[test]
    fn test_initialized_repository_is_source_tree() {
        let temp_dir = TempDir::new().unwrap();
        let repo = temp_dir.path().join("repo");
        fs::create_dir(&repo).unwrap();
        let init = Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(&repo)
            .status();
        // Nothing to check on hosts without git.
        if !init.is_ok_and(|status| status.success()) {
            return;
        }
        let file = repo.join("main.py");
        fs::write(&file, b"print(1)\n").unwrap();

        assert_eq!(is_in_git_repo(&repo, DEFAULT_GIT_TIMEOUT), Some(true));
        assert!(in_source_tree(&file, DEFAULT_GIT_TIMEOUT));
    }

    #[test]
    fn test_git_answer_agrees_with_marker_walk() {
        let temp_dir = TempDir::new().unwrap();
        // git may be absent on the host; only a real answer is checked.
        if let Some(inside) = is_in_git_repo(temp_dir.path(), Duration::from_secs(5)) {
            assert_eq!(inside, is_in_work_tree(temp_dir.path()));
        }
    }
}
