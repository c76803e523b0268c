use crate::index::{Index, IndexEntry, StatData};
use crate::repo::Repository;
use crate::tree::head_flat;
use anyhow::{Result, bail};

/// Reset index entries to their HEAD versions, leaving the working tree
/// alone. Paths absent from HEAD are dropped from the index. The restored
/// entries carry empty stat data, so the next status rehashes them.
pub fn git_restore_staged(repo: &Repository, paths: &[String]) -> Result<()> {
    let mut index = Index::load(repo)?;
    let head = head_flat(repo)?;

    for rel in paths {
        match head.get(rel) {
            Some(&(mode, id)) => index.upsert(IndexEntry {
                path: rel.clone(),
                id,
                mode,
                stat: StatData::default(),
            }),
            None => {
                if !index.remove(rel) {
                    bail!("pathspec '{rel}' did not match any files known to the index or HEAD");
                }
            }
        }
    }
    index.save(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::add::git_add;
    use crate::commit::{Identity, create_commit};
    use crate::status::{ChangeKind, compute};
    use std::fs;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn ident() -> Identity {
        Identity {
            name: "t".into(),
            email: "t@t".into(),
        }
    }

    #[test]
    fn unstages_a_modification() {
        let (_dir, repo) = test_repo();
        fs::write(repo.work_path("a.txt"), "v1\n").unwrap();
        git_add(&repo, &["a.txt".to_string()]).unwrap();
        create_commit(&repo, Some("c"), false, &ident(), &ident()).unwrap();

        fs::write(repo.work_path("a.txt"), "v2\n").unwrap();
        git_add(&repo, &["a.txt".to_string()]).unwrap();
        assert_eq!(
            compute(&repo).unwrap().staged,
            [("a.txt".to_string(), ChangeKind::Modified)]
        );

        git_restore_staged(&repo, &["a.txt".to_string()]).unwrap();
        let status = compute(&repo).unwrap();
        assert!(status.staged.is_empty());
        // The worktree still holds v2, so the edit is now unstaged.
        assert_eq!(status.unstaged, [("a.txt".to_string(), ChangeKind::Modified)]);
        assert_eq!(fs::read(repo.work_path("a.txt")).unwrap(), b"v2\n");
    }

    #[test]
    fn unstages_a_new_file_by_dropping_it() {
        let (_dir, repo) = test_repo();
        fs::write(repo.work_path("new.txt"), "n\n").unwrap();
        git_add(&repo, &["new.txt".to_string()]).unwrap();
        git_restore_staged(&repo, &["new.txt".to_string()]).unwrap();
        let status = compute(&repo).unwrap();
        assert!(status.staged.is_empty());
        assert_eq!(status.untracked, ["new.txt"]);
    }

    #[test]
    fn unknown_path_errors() {
        let (_dir, repo) = test_repo();
        assert!(git_restore_staged(&repo, &["ghost".to_string()]).is_err());
    }
}
