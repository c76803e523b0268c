use crate::index::Index;
use crate::object_read::read_bytes;
use crate::repo::Repository;
use crate::status::{WorktreeState, worktree_state};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;

const CONTEXT: usize = 3;

/// Unstaged changes only: each tracked path whose worktree content differs
/// from the index gets a unified diff against the staged blob.
pub fn git_diff(repo: &Repository, out: &mut impl Write) -> Result<()> {
    let index = Index::load(repo)?;
    for entry in index.entries() {
        let state = worktree_state(repo, entry)?;
        if state == WorktreeState::Clean {
            continue;
        }
        let (_, old) = read_bytes(repo, &hex::encode(entry.id))?;
        let (new, new_label) = match state {
            WorktreeState::Missing => (Vec::new(), "/dev/null".to_string()),
            _ => {
                let path = repo.work_path(&entry.path);
                let bytes =
                    fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                (bytes, format!("b/{}", entry.path))
            }
        };
        if old == new {
            // Mode-only change, nothing to print line-wise.
            continue;
        }
        writeln!(out, "diff --git a/{0} b/{0}", entry.path)?;
        if is_binary(&old) || is_binary(&new) {
            writeln!(out, "Binary files a/{0} and b/{0} differ", entry.path)?;
            continue;
        }
        unified_diff(&old, &new, &format!("a/{}", entry.path), &new_label, out)?;
    }
    Ok(())
}

fn is_binary(data: &[u8]) -> bool {
    data.iter().take(8000).any(|&b| b == 0)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op<'a> {
    Equal(&'a [u8]),
    Del(&'a [u8]),
    Ins(&'a [u8]),
}

impl<'a> Op<'a> {
    fn consumes_old(&self) -> bool {
        matches!(self, Op::Equal(_) | Op::Del(_))
    }

    fn consumes_new(&self) -> bool {
        matches!(self, Op::Equal(_) | Op::Ins(_))
    }
}

/// Write `---`/`+++` headers and `@@` hunks for one file pair.
pub fn unified_diff(
    old: &[u8],
    new: &[u8],
    old_label: &str,
    new_label: &str,
    out: &mut impl Write,
) -> Result<()> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let ops = diff_ops(&old_lines, &new_lines);
    if ops.iter().all(|op| matches!(op, Op::Equal(_))) {
        return Ok(());
    }
    writeln!(out, "--- {old_label}")?;
    writeln!(out, "+++ {new_label}")?;

    // Line number of each side before op i (1-based).
    let n = ops.len();
    let mut old_no = vec![1usize; n + 1];
    let mut new_no = vec![1usize; n + 1];
    for i in 0..n {
        old_no[i + 1] = old_no[i] + ops[i].consumes_old() as usize;
        new_no[i + 1] = new_no[i] + ops[i].consumes_new() as usize;
    }

    // Change runs separated by more than two context widths start new hunks.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        if matches!(op, Op::Equal(_)) {
            continue;
        }
        match groups.last_mut() {
            Some(last) if i - last.1 <= 2 * CONTEXT + 1 => last.1 = i,
            _ => groups.push((i, i)),
        }
    }

    for (first, last) in groups {
        let start = first.saturating_sub(CONTEXT);
        let end = (last + CONTEXT + 1).min(n);
        let old_count = old_no[end] - old_no[start];
        let new_count = new_no[end] - new_no[start];
        let old_start = if old_count == 0 { old_no[start] - 1 } else { old_no[start] };
        let new_start = if new_count == 0 { new_no[start] - 1 } else { new_no[start] };
        write!(out, "@@ -{old_start}")?;
        if old_count != 1 {
            write!(out, ",{old_count}")?;
        }
        write!(out, " +{new_start}")?;
        if new_count != 1 {
            write!(out, ",{new_count}")?;
        }
        writeln!(out, " @@")?;
        for i in start..end {
            let (prefix, line) = match ops[i] {
                Op::Equal(line) => (b' ', line),
                Op::Del(line) => (b'-', line),
                Op::Ins(line) => (b'+', line),
            };
            out.write_all(&[prefix])?;
            out.write_all(line)?;
            if !line.ends_with(b"\n") {
                writeln!(out)?;
                writeln!(out, "\\ No newline at end of file")?;
            }
        }
    }
    Ok(())
}

/// Split into lines that keep their trailing newline, so a final line with
/// no newline never compares equal to its terminated counterpart.
fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    data.split_inclusive(|&b| b == b'\n').collect()
}

/// Longest-common-subsequence edit script. Ties prefer deletions, which
/// keeps the output stable across runs and platforms.
fn diff_ops<'a>(old: &[&'a [u8]], new: &[&'a [u8]]) -> Vec<Op<'a>> {
    let n = old.len();
    let m = new.len();
    // lcs[i][j] = length of the LCS of old[i..] and new[j..].
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }
    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(Op::Equal(old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(Op::Del(old[i]));
            i += 1;
        } else {
            ops.push(Op::Ins(new[j]));
            j += 1;
        }
    }
    ops.extend(old[i..].iter().map(|&l| Op::Del(l)));
    ops.extend(new[j..].iter().map(|&l| Op::Ins(l)));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::add::git_add;
    use tempfile::tempdir;

    fn unified(old: &str, new: &str) -> String {
        let mut out = Vec::new();
        unified_diff(old.as_bytes(), new.as_bytes(), "a/f", "b/f", &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn identical_files_print_nothing() {
        assert_eq!(unified("a\nb\n", "a\nb\n"), "");
    }

    #[test]
    fn single_line_replacement() {
        let out = unified("a\nb\nc\n", "a\nx\nc\n");
        assert_eq!(
            out,
            "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+x\n c\n"
        );
    }

    #[test]
    fn context_is_limited_to_three_lines() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n";
        let new = "1\n2\n3\n4\nX\n6\n7\n8\n9\n";
        let out = unified(old, new);
        assert_eq!(
            out,
            "--- a/f\n+++ b/f\n@@ -2,7 +2,7 @@\n 2\n 3\n 4\n-5\n+X\n 6\n 7\n 8\n"
        );
    }

    #[test]
    fn nearby_changes_share_a_hunk_distant_ones_do_not() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\n14\n15\n";
        let new = "1\nA\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\nB\n15\n";
        let out = unified(old, new);
        let hunks = out.matches("@@ -").count();
        assert_eq!(hunks, 2, "changes 12 lines apart should split: {out}");

        let new_close = "1\nA\n3\n4\nB\n6\n7\n8\n9\n10\n11\n12\n13\n14\n15\n";
        let out = unified(old, new_close);
        assert_eq!(out.matches("@@ -").count(), 1, "close changes merge: {out}");
    }

    #[test]
    fn append_to_empty_file() {
        let out = unified("", "new\n");
        assert_eq!(out, "--- a/f\n+++ b/f\n@@ -0,0 +1 @@\n+new\n");
    }

    #[test]
    fn delete_everything() {
        let out = unified("gone\n", "");
        assert_eq!(out, "--- a/f\n+++ b/f\n@@ -1 +0,0 @@\n-gone\n");
    }

    #[test]
    fn missing_trailing_newline_is_marked() {
        let out = unified("a\nend", "a\nend\n");
        assert_eq!(
            out,
            "--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-end\n\\ No newline at end of file\n+end\n"
        );
    }

    #[test]
    fn diff_command_reports_worktree_edits() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(repo.work_path("f.txt"), "one\ntwo\n").unwrap();
        git_add(&repo, &["f.txt".to_string()]).unwrap();
        std::fs::write(repo.work_path("f.txt"), "one\nTWO\n").unwrap();

        let mut out = Vec::new();
        git_diff(&repo, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("diff --git a/f.txt b/f.txt\n"));
        assert!(text.contains("-two\n+TWO\n"), "{text}");
    }

    #[test]
    fn deleted_worktree_file_diffs_against_dev_null() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(repo.work_path("f.txt"), "one\n").unwrap();
        git_add(&repo, &["f.txt".to_string()]).unwrap();
        std::fs::remove_file(repo.work_path("f.txt")).unwrap();

        let mut out = Vec::new();
        git_diff(&repo, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("+++ /dev/null\n"), "{text}");
        assert!(text.contains("-one\n"), "{text}");
    }
}
