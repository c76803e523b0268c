use crate::index::{Index, IndexEntry, MODE_TREE};
use crate::object_read::ObjectKind;
use crate::object_write::store_bytes;
use crate::repo::Repository;
use anyhow::Result;
use std::cmp::Ordering;

/// Fold the flat, path-sorted index into nested tree objects and return the
/// root tree id.
///
/// Entries within a tree are emitted in tree-entry order: names compare
/// bytewise, but a directory's name is compared as if it ended with `/`.
/// That is why `foo.c` precedes a subtree `foo` (`"foo.c" < "foo/"`) even
/// though plain byte order would put `foo` first.
///
/// An empty index produces the well-known empty tree. Identical subtrees
/// coalesce on their own because the store is content-addressed.
pub fn build_tree(repo: &Repository, index: &Index) -> Result<[u8; 20]> {
    let entries: Vec<&IndexEntry> = index.entries().iter().collect();
    build_level(repo, &entries, "")
}

struct PendingEntry {
    name: String,
    mode: u32,
    id: [u8; 20],
}

fn build_level(repo: &Repository, entries: &[&IndexEntry], prefix: &str) -> Result<[u8; 20]> {
    let mut pending: Vec<PendingEntry> = Vec::new();
    let mut i = 0;
    while i < entries.len() {
        let rest = &entries[i].path[prefix.len()..];
        match rest.find('/') {
            None => {
                pending.push(PendingEntry {
                    name: rest.to_string(),
                    mode: entries[i].mode,
                    id: entries[i].id,
                });
                i += 1;
            }
            Some(slash) => {
                // A subtree: every following entry sharing `<prefix><dir>/`
                // is contiguous because the index is sorted by path bytes.
                let dir = &rest[..slash];
                let child_prefix = format!("{prefix}{dir}/");
                let end = i + entries[i..]
                    .iter()
                    .position(|e| !e.path.starts_with(&child_prefix))
                    .unwrap_or(entries.len() - i);
                let id = build_level(repo, &entries[i..end], &child_prefix)?;
                pending.push(PendingEntry {
                    name: dir.to_string(),
                    mode: MODE_TREE,
                    id,
                });
                i = end;
            }
        }
    }

    pending.sort_unstable_by(tree_order);

    let mut payload = Vec::new();
    for entry in &pending {
        payload.extend_from_slice(format!("{:o} ", entry.mode).as_bytes());
        payload.extend_from_slice(entry.name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&entry.id);
    }
    store_bytes(repo, ObjectKind::Tree, &payload)
}

fn tree_order(a: &PendingEntry, b: &PendingEntry) -> Ordering {
    let af = a.name.as_bytes();
    let bf = b.name.as_bytes();
    let min_len = af.len().min(bf.len());
    match af[..min_len].cmp(&bf[..min_len]) {
        Ordering::Equal => {}
        other => return other,
    }
    let a1 = af
        .get(min_len)
        .copied()
        .or((a.mode == MODE_TREE).then_some(b'/'));
    let b1 = bf
        .get(min_len)
        .copied()
        .or((b.mode == MODE_TREE).then_some(b'/'));
    a1.cmp(&b1)
}

pub fn git_write_tree(repo: &Repository) -> Result<[u8; 20]> {
    let index = Index::load(repo)?;
    build_tree(repo, &index)
}
