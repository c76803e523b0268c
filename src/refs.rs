use crate::error::GitError;
use crate::repo::{Repository, atomic_write};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Where HEAD points: at a branch (which may not exist yet on an unborn
/// repository) or directly at a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Head {
    Attached { branch: String },
    Detached { id: String },
}

pub fn read_head(repo: &Repository) -> Result<Head> {
    let content = fs::read_to_string(repo.head_path()).context("reading HEAD")?;
    let content = content.trim_end();
    if let Some(refname) = content.strip_prefix("ref: ") {
        let branch = refname
            .strip_prefix("refs/heads/")
            .ok_or_else(|| GitError::CorruptRef(format!("HEAD points at {refname}")))?;
        Ok(Head::Attached {
            branch: branch.to_string(),
        })
    } else if is_hex_id(content) {
        Ok(Head::Detached {
            id: content.to_string(),
        })
    } else {
        Err(GitError::CorruptRef("HEAD".into()).into())
    }
}

/// The commit HEAD resolves to, or None on an unborn branch.
pub fn head_commit(repo: &Repository) -> Result<Option<String>> {
    match read_head(repo)? {
        Head::Attached { branch } => read_branch(repo, &branch),
        Head::Detached { id } => Ok(Some(id)),
    }
}

pub fn current_branch(repo: &Repository) -> Result<Option<String>> {
    match read_head(repo)? {
        Head::Attached { branch } => Ok(Some(branch)),
        Head::Detached { .. } => Ok(None),
    }
}

/// Move the current position to `id`: the attached branch if there is one,
/// otherwise HEAD itself.
pub fn update_head(repo: &Repository, id: &str) -> Result<()> {
    match read_head(repo)? {
        Head::Attached { branch } => write_branch(repo, &branch, id),
        Head::Detached { .. } => detach_head(repo, id),
    }
}

pub fn attach_head(repo: &Repository, branch: &str) -> Result<()> {
    atomic_write(
        &repo.head_path(),
        format!("ref: refs/heads/{branch}\n").as_bytes(),
    )
    .context("writing HEAD")
}

pub fn detach_head(repo: &Repository, id: &str) -> Result<()> {
    atomic_write(&repo.head_path(), format!("{id}\n").as_bytes()).context("writing HEAD")
}

pub fn read_branch(repo: &Repository, name: &str) -> Result<Option<String>> {
    let path = repo.heads_dir().join(name);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let id = content.trim_end();
    if !is_hex_id(id) {
        return Err(GitError::CorruptRef(format!("refs/heads/{name}")).into());
    }
    Ok(Some(id.to_string()))
}

pub fn write_branch(repo: &Repository, name: &str, id: &str) -> Result<()> {
    validate_branch_name(name)?;
    atomic_write(
        &repo.heads_dir().join(name),
        format!("{id}\n").as_bytes(),
    )
    .with_context(|| format!("writing refs/heads/{name}"))
}

/// Create a new branch; refuses to clobber an existing one.
pub fn create_branch(repo: &Repository, name: &str, id: &str) -> Result<()> {
    validate_branch_name(name)?;
    if read_branch(repo, name)?.is_some() {
        return Err(GitError::InvalidRefName(format!("branch '{name}' already exists")).into());
    }
    write_branch(repo, name, id)
}

pub fn list_branches(repo: &Repository) -> Result<Vec<String>> {
    let heads = repo.heads_dir();
    let mut out = Vec::new();
    if heads.is_dir() {
        collect(&heads, &heads, &mut out)?;
    }
    out.sort();
    Ok(out)
}

fn collect(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect(base, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            if let Some(name) = rel.to_str() {
                out.push(name.to_string());
            }
        }
    }
    Ok(())
}

fn is_hex_id(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn validate_branch_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('-')
        || name.contains("..")
        || name.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
        || name
            .split('/')
            .any(|seg| seg.is_empty() || seg.starts_with('.') || seg.ends_with(".lock"));
    if bad {
        Err(GitError::InvalidRefName(name.to_string()).into())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    const ID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const ID2: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn fresh_repo_is_attached_and_unborn() {
        let (_dir, repo) = test_repo();
        assert_eq!(
            read_head(&repo).unwrap(),
            Head::Attached {
                branch: "master".into()
            }
        );
        assert_eq!(head_commit(&repo).unwrap(), None);
    }

    #[test]
    fn update_head_writes_through_to_branch() {
        let (_dir, repo) = test_repo();
        update_head(&repo, ID).unwrap();
        assert_eq!(read_branch(&repo, "master").unwrap().as_deref(), Some(ID));
        assert_eq!(head_commit(&repo).unwrap().as_deref(), Some(ID));
    }

    #[test]
    fn detached_head_round_trip() {
        let (_dir, repo) = test_repo();
        detach_head(&repo, ID).unwrap();
        assert_eq!(read_head(&repo).unwrap(), Head::Detached { id: ID.into() });
        update_head(&repo, ID2).unwrap();
        assert_eq!(read_head(&repo).unwrap(), Head::Detached { id: ID2.into() });
        assert_eq!(read_branch(&repo, "master").unwrap(), None);
    }

    #[test]
    fn create_branch_refuses_duplicates() {
        let (_dir, repo) = test_repo();
        create_branch(&repo, "dev", ID).unwrap();
        assert!(create_branch(&repo, "dev", ID2).is_err());
        assert_eq!(list_branches(&repo).unwrap(), ["dev"]);
    }

    #[test]
    fn branches_may_nest() {
        let (_dir, repo) = test_repo();
        create_branch(&repo, "feature/login", ID).unwrap();
        assert_eq!(
            read_branch(&repo, "feature/login").unwrap().as_deref(),
            Some(ID)
        );
        assert_eq!(list_branches(&repo).unwrap(), ["feature/login"]);
    }

    #[test]
    fn branch_name_validation() {
        for bad in ["", "-x", "a b", "a..b", "a/.hidden", "a.lock", "a//b", "a/"] {
            assert!(validate_branch_name(bad).is_err(), "{bad:?} should be invalid");
        }
        for good in ["master", "feature/login", "v1.2.3", "fix_2"] {
            assert!(validate_branch_name(good).is_ok(), "{good:?} should be valid");
        }
    }
}
