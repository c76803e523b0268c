use crate::ignores::{IgnoreRules, walk_worktree};
use crate::index::{Index, IndexEntry, MODE_EXECUTABLE, MODE_REGULAR};
use crate::object_read::ObjectKind;
use crate::object_write::hash_object;
use crate::refs;
use crate::repo::Repository;
use crate::tree::head_flat;
use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    fn label(self) -> &'static str {
        match self {
            ChangeKind::Added => "new file:   ",
            ChangeKind::Modified => "modified:   ",
            ChangeKind::Deleted => "deleted:    ",
        }
    }
}

/// The three-way comparison of worktree, index and HEAD, each group sorted
/// by path.
pub struct Status {
    pub branch: Option<String>,
    pub unborn: bool,
    pub staged: Vec<(String, ChangeKind)>,
    pub unstaged: Vec<(String, ChangeKind)>,
    pub untracked: Vec<String>,
}

impl Status {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.untracked.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorktreeState {
    Missing,
    Clean,
    Modified,
}

pub fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.permissions().mode() & 0o111 != 0 {
        MODE_EXECUTABLE
    } else {
        MODE_REGULAR
    }
}

/// Compare one index entry against the file it tracks. Matching cached stat
/// data short-circuits the comparison; otherwise the file is rehashed.
pub fn worktree_state(repo: &Repository, entry: &IndexEntry) -> Result<WorktreeState> {
    let path = repo.work_path(&entry.path);
    let meta = match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Ok(WorktreeState::Missing),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WorktreeState::Missing),
        Err(e) => return Err(e).with_context(|| format!("stat {}", path.display())),
    };
    if file_mode(&meta) != entry.mode {
        return Ok(WorktreeState::Modified);
    }
    if entry.stat.matches(&meta) {
        return Ok(WorktreeState::Clean);
    }
    let content = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    if hash_object(ObjectKind::Blob, &content) == entry.id {
        Ok(WorktreeState::Clean)
    } else {
        Ok(WorktreeState::Modified)
    }
}

pub fn compute(repo: &Repository) -> Result<Status> {
    let index = Index::load(repo)?;
    let head = head_flat(repo)?;
    let branch = refs::current_branch(repo)?;
    let unborn = refs::head_commit(repo)?.is_none();

    // Index vs HEAD.
    let mut staged = Vec::new();
    for entry in index.entries() {
        match head.get(&entry.path) {
            None => staged.push((entry.path.clone(), ChangeKind::Added)),
            Some(&(mode, id)) => {
                if mode != entry.mode || id != entry.id {
                    staged.push((entry.path.clone(), ChangeKind::Modified));
                }
            }
        }
    }
    for path in head.keys() {
        if !index.contains(path) {
            staged.push((path.clone(), ChangeKind::Deleted));
        }
    }

    // Worktree vs index.
    let mut unstaged = Vec::new();
    for entry in index.entries() {
        match worktree_state(repo, entry)? {
            WorktreeState::Clean => {}
            WorktreeState::Modified => unstaged.push((entry.path.clone(), ChangeKind::Modified)),
            WorktreeState::Missing => unstaged.push((entry.path.clone(), ChangeKind::Deleted)),
        }
    }

    // Worktree paths nobody tracks.
    let rules = IgnoreRules::load(repo)?;
    let untracked = walk_worktree(repo, "", &rules)?
        .into_iter()
        .filter(|path| !index.contains(path))
        .collect();

    staged.sort_by(|a, b| a.0.cmp(&b.0));
    unstaged.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Status {
        branch,
        unborn,
        staged,
        unstaged,
        untracked,
    })
}

pub fn git_status(repo: &Repository) -> Result<()> {
    let status = compute(repo)?;
    match &status.branch {
        Some(branch) => println!("On branch {branch}"),
        None => {
            let id = refs::head_commit(repo)?.unwrap_or_default();
            println!("HEAD detached at {}", &id[..id.len().min(7)]);
        }
    }
    if status.unborn {
        println!("\nNo commits yet");
    }
    if !status.staged.is_empty() {
        println!("\nChanges to be committed:");
        for (path, kind) in &status.staged {
            println!("\t{}{}", kind.label(), path);
        }
    }
    if !status.unstaged.is_empty() {
        println!("\nChanges not staged for commit:");
        for (path, kind) in &status.unstaged {
            println!("\t{}{}", kind.label(), path);
        }
    }
    if !status.untracked.is_empty() {
        println!("\nUntracked files:");
        for path in &status.untracked {
            println!("\t{path}");
        }
    }
    if status.is_clean() {
        println!("nothing to commit, working tree clean");
    }
    Ok(())
}
