use crate::error::GitError;
use crate::object_read::resolve_prefix;
use crate::refs;
use crate::repo::Repository;
use anyhow::Result;

/// Map a user-supplied revision string to a full object id. Accepts `HEAD`,
/// a branch name, a full 40-hex id, or a unique hex prefix of at least four
/// characters. Branch names shadow hex prefixes.
pub fn resolve(repo: &Repository, rev: &str) -> Result<String> {
    if rev == "HEAD" {
        return refs::head_commit(repo)?
            .ok_or_else(|| GitError::RefNotFound("HEAD".to_string()).into());
    }
    if let Some(id) = refs::read_branch(repo, rev)? {
        return Ok(id);
    }
    if rev.len() >= 4 && rev.len() <= 40 && rev.bytes().all(|b| b.is_ascii_hexdigit()) {
        return resolve_prefix(repo, rev);
    }
    Err(GitError::RefNotFound(rev.to_string()).into())
}

pub fn git_rev_parse(repo: &Repository, rev: &str) -> Result<()> {
    println!("{}", resolve(repo, rev)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_read::ObjectKind;
    use crate::object_write::store_bytes;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn unborn_head_is_ref_not_found() {
        let (_dir, repo) = test_repo();
        let err = resolve(&repo, "HEAD").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::RefNotFound(_))
        ));
    }

    #[test]
    fn resolves_head_branch_and_prefix() {
        let (_dir, repo) = test_repo();
        let id = hex::encode(store_bytes(&repo, ObjectKind::Blob, b"c\n").unwrap());
        refs::update_head(&repo, &id).unwrap();
        assert_eq!(resolve(&repo, "HEAD").unwrap(), id);
        assert_eq!(resolve(&repo, "master").unwrap(), id);
        assert_eq!(resolve(&repo, &id).unwrap(), id);
        assert_eq!(resolve(&repo, &id[..8]).unwrap(), id);
    }

    #[test]
    fn branch_shadows_hex() {
        let (_dir, repo) = test_repo();
        const OTHER: &str = "cccccccccccccccccccccccccccccccccccccccc";
        refs::create_branch(&repo, "abcd1234", OTHER).unwrap();
        assert_eq!(resolve(&repo, "abcd1234").unwrap(), OTHER);
    }

    #[test]
    fn garbage_is_ref_not_found() {
        let (_dir, repo) = test_repo();
        assert!(resolve(&repo, "no-such-thing").is_err());
        assert!(resolve(&repo, "ab").is_err());
    }
}
