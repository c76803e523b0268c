use crate::error::GitError;
use crate::object_read::{ObjectKind, read_bytes};
use crate::object_write::store_bytes;
use crate::refs;
use crate::repo::Repository;
use crate::tree::commit_tree;
use crate::write_tree::git_write_tree;
use anyhow::{Context, Result, bail, ensure};
use chrono::Local;
use std::env;
use std::fmt::Write;

/// Who is committing. Taken from the environment, with fixed fallbacks so a
/// bare environment still produces valid objects.
#[derive(Clone, Debug)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn author_from_env() -> Identity {
        Identity {
            name: env::var("GIT_AUTHOR_NAME").unwrap_or_else(|_| "pygit".to_string()),
            email: env::var("GIT_AUTHOR_EMAIL").unwrap_or_else(|_| "pygit@localhost".to_string()),
        }
    }

    pub fn committer_from_env() -> Identity {
        Identity {
            name: env::var("GIT_COMMITTER_NAME").unwrap_or_else(|_| "pygit".to_string()),
            email: env::var("GIT_COMMITTER_EMAIL")
                .unwrap_or_else(|_| "pygit@localhost".to_string()),
        }
    }

    /// `Name <email> <epoch> <±HHMM>` stamped with the current local time.
    pub fn signature(&self) -> String {
        let (time, tz) = time_and_timezone();
        format!("{} <{}> {} {}", self.name, self.email, time, tz)
    }
}

fn time_and_timezone() -> (i64, String) {
    let now = Local::now();
    let time = now.timestamp();
    let offset_seconds = now.offset().local_minus_utc();
    let hours = offset_seconds / 3600;
    let minutes = offset_seconds.abs() % 3600 / 60;
    let tz = format!("{:+03}{:02}", hours, minutes);
    (time, tz)
}

/// A commit payload split back into its parts. Signatures are kept verbatim
/// so an amend can reuse the original author line, date included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    pub tree: String,
    pub parents: Vec<String>,
    pub author: String,
    pub committer: String,
    pub message: String,
}

pub fn parse_commit(payload: &[u8]) -> Result<CommitInfo> {
    let corrupt = |msg: &str| GitError::CorruptObject(format!("commit: {msg}"));
    let text = std::str::from_utf8(payload).map_err(|_| corrupt("not UTF-8"))?;
    let (header, message) = text
        .split_once("\n\n")
        .ok_or_else(|| corrupt("missing blank line"))?;
    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = None;
    let mut committer = None;
    for line in header.lines() {
        if let Some(rest) = line.strip_prefix("tree ") {
            tree = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("parent ") {
            parents.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("author ") {
            author = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("committer ") {
            committer = Some(rest.to_string());
        }
        // Unknown headers (gpgsig, encoding) pass through unmodeled.
    }
    Ok(CommitInfo {
        tree: tree.ok_or_else(|| corrupt("no tree header"))?,
        parents,
        author: author.ok_or_else(|| corrupt("no author header"))?,
        committer: committer.ok_or_else(|| corrupt("no committer header"))?,
        message: message.to_string(),
    })
}

pub fn read_commit(repo: &Repository, id: &str) -> Result<CommitInfo> {
    let (kind, payload) = read_bytes(repo, id)?;
    ensure!(
        kind == ObjectKind::Commit,
        "object {} is a {}, not a commit",
        id,
        kind.as_str()
    );
    parse_commit(&payload)
}

/// Split a signature into (identity, epoch seconds, timezone suffix).
pub fn split_signature(sig: &str) -> Option<(&str, i64, &str)> {
    let (rest, tz) = sig.rsplit_once(' ')?;
    let (who, epoch) = rest.rsplit_once(' ')?;
    Some((who, epoch.parse().ok()?, tz))
}

fn assemble(
    tree: &str,
    parents: &[String],
    author: &str,
    committer: &str,
    message: &str,
) -> Vec<u8> {
    let mut out = String::new();
    writeln!(out, "tree {}", tree).unwrap();
    for parent in parents {
        writeln!(out, "parent {}", parent).unwrap();
    }
    writeln!(out, "author {}", author).unwrap();
    writeln!(out, "committer {}", committer).unwrap();
    writeln!(out).unwrap();
    out.push_str(message);
    if !message.ends_with('\n') {
        out.push('\n');
    }
    out.into_bytes()
}

/// Build a commit from the current index and advance the current branch (or
/// a detached HEAD) to it. Returns the new commit id.
pub fn create_commit(
    repo: &Repository,
    message: Option<&str>,
    amend: bool,
    author: &Identity,
    committer: &Identity,
) -> Result<String> {
    let tree_id = hex::encode(git_write_tree(repo)?);
    let head_id = refs::head_commit(repo)?;

    let (parents, author_sig, message) = if amend {
        let Some(head_id) = head_id else {
            bail!("no commit to amend");
        };
        let old = read_commit(repo, &head_id).context("reading commit to amend")?;
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| old.message.clone());
        (old.parents, old.author, message)
    } else {
        let Some(message) = message else {
            bail!("commit message required (-m)");
        };
        if let Some(head_id) = &head_id {
            if commit_tree(repo, head_id)? == tree_id {
                bail!("nothing to commit, working tree clean");
            }
        }
        let parents = head_id.into_iter().collect();
        (parents, author.signature(), message.to_string())
    };

    let payload = assemble(
        &tree_id,
        &parents,
        &author_sig,
        &committer.signature(),
        &message,
    );
    let id = hex::encode(store_bytes(repo, ObjectKind::Commit, &payload)?);
    refs::update_head(repo, &id)?;
    Ok(id)
}

pub fn git_commit(repo: &Repository, message: Option<&str>, amend: bool) -> Result<()> {
    let id = create_commit(
        repo,
        message,
        amend,
        &Identity::author_from_env(),
        &Identity::committer_from_env(),
    )?;
    println!("{id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Index, IndexEntry, MODE_REGULAR, StatData};
    use crate::object_read::object_exists;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn ident() -> Identity {
        Identity {
            name: "A U Thor".into(),
            email: "author@example.com".into(),
        }
    }

    fn stage(repo: &Repository, path: &str, content: &[u8]) {
        let id = store_bytes(repo, ObjectKind::Blob, content).unwrap();
        let mut index = Index::load(repo).unwrap();
        index.upsert(IndexEntry {
            path: path.to_string(),
            id,
            mode: MODE_REGULAR,
            stat: StatData::default(),
        });
        index.save(repo).unwrap();
    }

    #[test]
    fn first_commit_has_no_parent() {
        let (_dir, repo) = test_repo();
        stage(&repo, "a", b"A\n");
        let id = create_commit(&repo, Some("m"), false, &ident(), &ident()).unwrap();
        let info = read_commit(&repo, &id).unwrap();
        assert!(info.parents.is_empty());
        assert!(info.author.starts_with("A U Thor <author@example.com> "));
        assert_eq!(info.message, "m\n");
        assert_eq!(refs::head_commit(&repo).unwrap().as_deref(), Some(id.as_str()));
    }

    #[test]
    fn second_commit_links_to_first() {
        let (_dir, repo) = test_repo();
        stage(&repo, "a", b"A\n");
        let first = create_commit(&repo, Some("one"), false, &ident(), &ident()).unwrap();
        stage(&repo, "a", b"B\n");
        let second = create_commit(&repo, Some("two"), false, &ident(), &ident()).unwrap();
        let info = read_commit(&repo, &second).unwrap();
        assert_eq!(info.parents, [first]);
    }

    #[test]
    fn amend_replaces_tip_but_keeps_grandparent() {
        let (_dir, repo) = test_repo();
        stage(&repo, "a", b"A\n");
        let c1 = create_commit(&repo, Some("one"), false, &ident(), &ident()).unwrap();
        stage(&repo, "a", b"B\n");
        let c2 = create_commit(&repo, Some("two"), false, &ident(), &ident()).unwrap();
        let c2_tree = read_commit(&repo, &c2).unwrap().tree;

        let amended = create_commit(&repo, Some("x"), true, &ident(), &ident()).unwrap();
        let info = read_commit(&repo, &amended).unwrap();
        assert_eq!(info.parents, [c1]);
        assert_eq!(info.tree, c2_tree);
        assert_eq!(info.message, "x\n");
        assert_eq!(
            refs::head_commit(&repo).unwrap().as_deref(),
            Some(amended.as_str())
        );
        // The replaced tip is unreferenced but still stored.
        assert!(object_exists(&repo, &c2));
    }

    #[test]
    fn amend_without_message_reuses_old_one() {
        let (_dir, repo) = test_repo();
        stage(&repo, "a", b"A\n");
        create_commit(&repo, Some("keep me"), false, &ident(), &ident()).unwrap();
        stage(&repo, "a", b"B\n");
        let amended = create_commit(&repo, None, true, &ident(), &ident()).unwrap();
        assert_eq!(read_commit(&repo, &amended).unwrap().message, "keep me\n");
    }

    #[test]
    fn refuses_empty_change() {
        let (_dir, repo) = test_repo();
        stage(&repo, "a", b"A\n");
        create_commit(&repo, Some("one"), false, &ident(), &ident()).unwrap();
        let err = create_commit(&repo, Some("two"), false, &ident(), &ident()).unwrap_err();
        assert!(err.to_string().contains("nothing to commit"));
    }

    #[test]
    fn message_gets_trailing_newline() {
        let payload = assemble("t", &[], "a <a> 0 +0000", "c <c> 0 +0000", "subject");
        assert!(payload.ends_with(b"\n\nsubject\n"));
        let payload = assemble("t", &[], "a <a> 0 +0000", "c <c> 0 +0000", "subject\n");
        assert!(payload.ends_with(b"\n\nsubject\n"));
    }

    #[test]
    fn signature_splits() {
        let (who, epoch, tz) = split_signature("A U Thor <a@b> 1700000000 +0200").unwrap();
        assert_eq!(who, "A U Thor <a@b>");
        assert_eq!(epoch, 1700000000);
        assert_eq!(tz, "+0200");
    }
}
