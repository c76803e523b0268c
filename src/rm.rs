use crate::error::GitError;
use crate::index::Index;
use crate::repo::Repository;
use crate::status::{WorktreeState, worktree_state};
use crate::tree::head_flat;
use anyhow::{Result, bail};
use std::fs;

/// Remove paths from the index and the working tree. A path with staged or
/// unstaged changes relative to HEAD is refused so no edit is lost.
pub fn git_rm(repo: &Repository, paths: &[String]) -> Result<()> {
    let mut index = Index::load(repo)?;
    let head = head_flat(repo)?;

    // Validate everything first so a late failure does not leave a partial
    // removal behind.
    for rel in paths {
        let Some(entry) = index.get(rel) else {
            bail!("pathspec '{rel}' did not match any tracked files");
        };
        if worktree_state(repo, entry)? == WorktreeState::Modified {
            return Err(GitError::DirtyWorktree(rel.clone()).into());
        }
        match head.get(rel) {
            Some(&(mode, id)) if mode == entry.mode && id == entry.id => {}
            _ => return Err(GitError::DirtyWorktree(rel.clone()).into()),
        }
    }

    for rel in paths {
        index.remove(rel);
        let path = repo.work_path(rel);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        println!("rm '{rel}'");
    }
    index.save(repo)
}
