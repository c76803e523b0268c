use crate::error::GitError;
use crate::object_read::{ObjectKind, read_bytes};
use crate::repo::Repository;
use anyhow::{Result, ensure};
use std::collections::BTreeMap;

/// One line of a tree object: `"<mode> <name>\0"` followed by the raw id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    pub name: String,
    pub id: [u8; 20],
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.mode == crate::index::MODE_TREE
    }
}

pub fn parse_tree(payload: &[u8]) -> Result<Vec<TreeEntry>> {
    let corrupt = || GitError::CorruptObject("tree".into());
    let mut entries = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let space = rest.iter().position(|&b| b == b' ').ok_or_else(corrupt)?;
        let mode = std::str::from_utf8(&rest[..space]).map_err(|_| corrupt())?;
        let mode = u32::from_str_radix(mode, 8).map_err(|_| corrupt())?;
        rest = &rest[space + 1..];
        let nul = rest.iter().position(|&b| b == 0).ok_or_else(corrupt)?;
        let name = std::str::from_utf8(&rest[..nul])
            .map_err(|_| corrupt())?
            .to_string();
        rest = &rest[nul + 1..];
        ensure!(rest.len() >= 20, corrupt());
        let mut id = [0u8; 20];
        id.copy_from_slice(&rest[..20]);
        rest = &rest[20..];
        entries.push(TreeEntry { mode, name, id });
    }
    Ok(entries)
}

pub fn read_tree(repo: &Repository, id: &str) -> Result<Vec<TreeEntry>> {
    let (kind, payload) = read_bytes(repo, id)?;
    ensure!(kind == ObjectKind::Tree, "object {} is a {}, not a tree", id, kind.as_str());
    parse_tree(&payload)
}

/// Recursively flatten a tree into `path -> (mode, id)` for its files.
pub fn flatten_tree(repo: &Repository, id: &str) -> Result<BTreeMap<String, (u32, [u8; 20])>> {
    let mut out = BTreeMap::new();
    flatten_into(repo, id, "", &mut out)?;
    Ok(out)
}

fn flatten_into(
    repo: &Repository,
    id: &str,
    prefix: &str,
    out: &mut BTreeMap<String, (u32, [u8; 20])>,
) -> Result<()> {
    for entry in read_tree(repo, id)? {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        if entry.is_tree() {
            flatten_into(repo, &hex::encode(entry.id), &path, out)?;
        } else {
            out.insert(path, (entry.mode, entry.id));
        }
    }
    Ok(())
}

/// The root tree id of a commit.
pub fn commit_tree(repo: &Repository, commit_id: &str) -> Result<String> {
    let (kind, payload) = read_bytes(repo, commit_id)?;
    ensure!(
        kind == ObjectKind::Commit,
        "object {} is a {}, not a commit",
        commit_id,
        kind.as_str()
    );
    let first = payload
        .split(|&b| b == b'\n')
        .next()
        .ok_or_else(|| GitError::CorruptObject(commit_id.to_string()))?;
    let first = std::str::from_utf8(first)
        .map_err(|_| GitError::CorruptObject(commit_id.to_string()))?;
    first
        .strip_prefix("tree ")
        .map(str::to_string)
        .ok_or_else(|| GitError::CorruptObject(commit_id.to_string()).into())
}

/// Flattened view of the tree HEAD points at; empty on an unborn branch.
pub fn head_flat(repo: &Repository) -> Result<BTreeMap<String, (u32, [u8; 20])>> {
    match crate::refs::head_commit(repo)? {
        Some(commit_id) => {
            let tree_id = commit_tree(repo, &commit_id)?;
            flatten_tree(repo, &tree_id)
        }
        None => Ok(BTreeMap::new()),
    }
}
