use crate::error::GitError;
use crate::index::{Index, IndexEntry, StatData};
use crate::object_read::{ObjectKind, read_bytes};
use crate::object_write::hash_object;
use crate::refs;
use crate::repo::Repository;
use crate::revs;
use crate::status::{WorktreeState, file_mode, worktree_state};
use crate::tree::{commit_tree, flatten_tree, head_flat};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::os::unix::fs::PermissionsExt;

type Flat = BTreeMap<String, (u32, [u8; 20])>;

/// Switch the working tree, index and HEAD to `target`. A branch name
/// attaches HEAD to it; anything else resolves to a commit and detaches.
///
/// Refused while any path's staged or worktree content differs from both
/// HEAD and the target, since materializing the target would discard it.
pub fn git_checkout(repo: &Repository, target: &str) -> Result<()> {
    let (commit_id, branch) = match refs::read_branch(repo, target)? {
        Some(id) => (id, Some(target)),
        None => (revs::resolve(repo, target)?, None),
    };
    let target_flat = flatten_tree(repo, &commit_tree(repo, &commit_id)?)?;
    let head = head_flat(repo)?;
    let index = Index::load(repo)?;

    check_no_loss(repo, &head, &target_flat, &index)?;

    // Working tree first: drop files only HEAD had, then write the target's.
    for path in head.keys() {
        if !target_flat.contains_key(path) {
            remove_worktree_file(repo, path)?;
        }
    }
    let mut new_index = Index::default();
    for (path, &(mode, id)) in &target_flat {
        let file = repo.work_path(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let (kind, payload) = read_bytes(repo, &hex::encode(id))?;
        if kind != ObjectKind::Blob {
            return Err(GitError::CorruptObject(hex::encode(id)).into());
        }
        fs::write(&file, &payload).with_context(|| format!("writing {}", file.display()))?;
        let perms = fs::Permissions::from_mode(if mode == crate::index::MODE_EXECUTABLE {
            0o755
        } else {
            0o644
        });
        fs::set_permissions(&file, perms)?;
        let meta = fs::metadata(&file)?;
        new_index.upsert(IndexEntry {
            path: path.clone(),
            id,
            mode,
            stat: StatData::from_metadata(&meta),
        });
    }
    new_index.save(repo)?;

    match branch {
        Some(branch) => {
            refs::attach_head(repo, branch)?;
            println!("Switched to branch '{branch}'");
        }
        None => {
            refs::detach_head(repo, &commit_id)?;
            println!("HEAD is now at {}", &commit_id[..7]);
        }
    }
    Ok(())
}

/// A path is unsafe to touch when its local content (index or worktree)
/// matches neither HEAD nor the target.
fn check_no_loss(repo: &Repository, head: &Flat, target: &Flat, index: &Index) -> Result<()> {
    let mut paths: BTreeSet<&str> = BTreeSet::new();
    paths.extend(head.keys().map(String::as_str));
    paths.extend(target.keys().map(String::as_str));
    paths.extend(index.entries().iter().map(|e| e.path.as_str()));

    for path in paths {
        let h = head.get(path).copied();
        let t = target.get(path).copied();
        let i = index.get(path).map(|e| (e.mode, e.id));
        if i != h && i != t {
            return Err(GitError::DirtyWorktree(path.to_string()).into());
        }
        let w = match index.get(path) {
            Some(entry) if worktree_state(repo, entry)? == WorktreeState::Clean => i,
            _ => worktree_snapshot(repo, path)?,
        };
        if w != h && w != t {
            return Err(GitError::DirtyWorktree(path.to_string()).into());
        }
    }
    Ok(())
}

/// Hash a worktree file into the same (mode, id) shape tree entries use.
fn worktree_snapshot(repo: &Repository, path: &str) -> Result<Option<(u32, [u8; 20])>> {
    let file = repo.work_path(path);
    let meta = match fs::metadata(&file) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("stat {}", file.display())),
    };
    let content = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    Ok(Some((
        file_mode(&meta),
        hash_object(ObjectKind::Blob, &content),
    )))
}

fn remove_worktree_file(repo: &Repository, path: &str) -> Result<()> {
    let file = repo.work_path(path);
    match fs::remove_file(&file) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("removing {}", file.display())),
    }
    // Sweep now-empty parent directories up to the worktree root.
    let mut dir = file.parent().map(|p| p.to_path_buf());
    while let Some(d) = dir {
        if d == repo.root() || fs::remove_dir(&d).is_err() {
            break;
        }
        dir = d.parent().map(|p| p.to_path_buf());
    }
    Ok(())
}
