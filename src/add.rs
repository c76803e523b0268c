use crate::ignores::{IgnoreRules, walk_worktree};
use crate::index::{Index, IndexEntry, StatData, validate_path};
use crate::object_read::Object;
use crate::repo::Repository;
use crate::status::file_mode;
use anyhow::{Context, Result, bail};
use std::fs;

/// Stage the given repo-relative paths. Directories expand recursively
/// through the ignore rules; the empty string means the whole worktree.
///
/// A tracked path whose file is gone gets its deletion staged. An untracked
/// path that the ignore rules match is refused when named explicitly.
pub fn git_add(repo: &Repository, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        bail!("nothing specified, nothing added");
    }
    let rules = IgnoreRules::load(repo)?;
    let mut index = Index::load(repo)?;

    for rel in paths {
        let target = repo.work_path(rel);
        if target.is_dir() {
            for file in walk_worktree(repo, rel, &rules)? {
                stage_file(repo, &mut index, &file)?;
            }
            // Tracked files under this directory that vanished from disk.
            let prefix = if rel.is_empty() {
                String::new()
            } else {
                format!("{rel}/")
            };
            let gone: Vec<String> = index
                .entries()
                .iter()
                .filter(|e| e.path.starts_with(&prefix))
                .filter(|e| !repo.work_path(&e.path).is_file())
                .map(|e| e.path.clone())
                .collect();
            for path in gone {
                index.remove(&path);
            }
        } else if target.is_file() {
            if !index.contains(rel) && rules.is_ignored(rel, false) {
                bail!("pathspec '{rel}' is matched by your .gitignore rules");
            }
            stage_file(repo, &mut index, rel)?;
        } else if index.remove(rel) {
            // Explicitly named, tracked, deleted on disk: stage the removal.
        } else {
            bail!("pathspec '{rel}' did not match any files");
        }
    }

    index.save(repo)
}

fn stage_file(repo: &Repository, index: &mut Index, rel: &str) -> Result<()> {
    validate_path(rel)?;
    let path = repo.work_path(rel);
    let id = Object::from_file(&path)?
        .store(repo)
        .with_context(|| format!("storing blob for {rel}"))?;
    let meta = fs::metadata(&path).with_context(|| format!("stat {}", path.display()))?;
    index.upsert(IndexEntry {
        path: rel.to_string(),
        id,
        mode: file_mode(&meta),
        stat: StatData::from_metadata(&meta),
    });
    Ok(())
}
