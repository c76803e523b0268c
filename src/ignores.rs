use crate::repo::Repository;
use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs;

/// The repository's ignore rules, compiled once per command from the
/// `.gitignore` at the worktree root.
pub struct IgnoreRules {
    matcher: Gitignore,
}

impl IgnoreRules {
    pub fn load(repo: &Repository) -> Result<IgnoreRules> {
        let mut builder = GitignoreBuilder::new(repo.root());
        let file = repo.root().join(".gitignore");
        if file.is_file() {
            // Returns a parse error only for globs that cannot compile at
            // all; such lines are treated the same way git treats them.
            let _ = builder.add(&file);
        }
        let matcher = builder.build().context("compiling .gitignore")?;
        Ok(IgnoreRules { matcher })
    }

    /// Last matching rule wins; a path inside an ignored directory is
    /// ignored no matter what later negations say about the file itself.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }
}

/// Collect the repo-relative paths of all non-ignored files under `rel`
/// (empty string for the whole worktree). Ignored directories are pruned,
/// `.git` is always skipped. Output is sorted.
pub fn walk_worktree(repo: &Repository, rel: &str, rules: &IgnoreRules) -> Result<Vec<String>> {
    let mut out = Vec::new();
    walk_dir(repo, rel, rules, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk_dir(repo: &Repository, rel: &str, rules: &IgnoreRules, out: &mut Vec<String>) -> Result<()> {
    let dir = repo.work_path(rel);
    for entry in fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if name == ".git" {
            continue;
        }
        let child = if rel.is_empty() {
            name
        } else {
            format!("{rel}/{name}")
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if !rules.is_ignored(&child, true) {
                walk_dir(repo, &child, rules, out)?;
            }
        } else if !rules.is_ignored(&child, false) {
            out.push(child);
        }
    }
    Ok(())
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

    fn write(repo: &Repository, rel: &str, content: &str) {
        let path = repo.work_path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn negation_overrides_earlier_match() {
        let (_dir, repo) = test_repo();
        write(&repo, ".gitignore", "*.log\n!keep.log\n");
        write(&repo, "a.log", "");
        write(&repo, "keep.log", "");
        write(&repo, "sub/a.log", "");
        let rules = IgnoreRules::load(&repo).unwrap();
        assert!(rules.is_ignored("a.log", false));
        assert!(!rules.is_ignored("keep.log", false));
        assert!(rules.is_ignored("sub/a.log", false));
        let files = walk_worktree(&repo, "", &rules).unwrap();
        assert_eq!(files, [".gitignore", "keep.log"]);
    }

    #[test]
    fn ignored_directory_swallows_negated_children() {
        let (_dir, repo) = test_repo();
        write(&repo, ".gitignore", "build/\n!build/keep.txt\n");
        write(&repo, "build/keep.txt", "");
        write(&repo, "build/out.bin", "");
        let rules = IgnoreRules::load(&repo).unwrap();
        assert!(rules.is_ignored("build/keep.txt", false));
        let files = walk_worktree(&repo, "", &rules).unwrap();
        assert_eq!(files, [".gitignore"]);
    }

    #[test]
    fn anchored_and_unanchored_patterns() {
        let (_dir, repo) = test_repo();
        write(&repo, ".gitignore", "/top.txt\nanywhere.txt\n");
        let rules = IgnoreRules::load(&repo).unwrap();
        assert!(rules.is_ignored("top.txt", false));
        assert!(!rules.is_ignored("sub/top.txt", false));
        assert!(rules.is_ignored("anywhere.txt", false));
        assert!(rules.is_ignored("sub/anywhere.txt", false));
    }

    #[test]
    fn wildmatch_classes_and_double_star() {
        let (_dir, repo) = test_repo();
        write(&repo, ".gitignore", "doc/**/*.pdf\nfile?.[ab]\n");
        let rules = IgnoreRules::load(&repo).unwrap();
        assert!(rules.is_ignored("doc/x/y/z.pdf", false));
        assert!(!rules.is_ignored("other/x/top.pdf", false));
        assert!(rules.is_ignored("file1.a", false));
        assert!(!rules.is_ignored("file1.c", false));
        assert!(!rules.is_ignored("file12.a", false));
    }

    #[test]
    fn directory_only_pattern() {
        let (_dir, repo) = test_repo();
        write(&repo, ".gitignore", "cache/\n");
        let rules = IgnoreRules::load(&repo).unwrap();
        assert!(rules.is_ignored("cache", true));
        assert!(rules.is_ignored("cache/data", false));
        assert!(!rules.is_ignored("cache", false));
    }

    #[test]
    fn missing_gitignore_means_nothing_ignored() {
        let (_dir, repo) = test_repo();
        write(&repo, "a.txt", "");
        let rules = IgnoreRules::load(&repo).unwrap();
        assert!(!rules.is_ignored("a.txt", false));
    }
}
