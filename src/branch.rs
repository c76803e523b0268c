use crate::error::GitError;
use crate::refs;
use crate::repo::Repository;
use anyhow::Result;

/// Without a name, list branches with the current one starred. With a name,
/// create it at the current HEAD commit.
pub fn git_branch(repo: &Repository, name: Option<&str>) -> Result<()> {
    match name {
        None => {
            let current = refs::current_branch(repo)?;
            for branch in refs::list_branches(repo)? {
                let marker = if Some(&branch) == current.as_ref() { "* " } else { "  " };
                println!("{marker}{branch}");
            }
            Ok(())
        }
        Some(name) => {
            let id = refs::head_commit(repo)?
                .ok_or_else(|| GitError::RefNotFound("HEAD".to_string()))?;
            refs::create_branch(repo, name, &id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::add::git_add;
    use crate::commit::{Identity, create_commit};
    use tempfile::tempdir;

    #[test]
    fn branch_points_at_head_commit() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(repo.work_path("a"), "x\n").unwrap();
        git_add(&repo, &["a".to_string()]).unwrap();
        let ident = Identity {
            name: "t".into(),
            email: "t@t".into(),
        };
        let id = create_commit(&repo, Some("c"), false, &ident, &ident).unwrap();

        git_branch(&repo, Some("dev")).unwrap();
        assert_eq!(refs::read_branch(&repo, "dev").unwrap().as_deref(), Some(id.as_str()));
        // Creating it again must fail.
        assert!(git_branch(&repo, Some("dev")).is_err());
    }

    #[test]
    fn unborn_head_cannot_branch() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(git_branch(&repo, Some("dev")).is_err());
    }
}
