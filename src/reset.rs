use crate::index::{Index, IndexEntry, StatData};
use crate::refs;
use crate::repo::Repository;
use crate::revs;
use crate::tree::{commit_tree, flatten_tree};
use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetMode {
    /// Move HEAD only.
    Soft,
    /// Move HEAD and rebuild the index from the target tree.
    Mixed,
}

/// The working tree is never touched; with `Mixed` the differences between
/// it and the target simply become unstaged.
pub fn git_reset(repo: &Repository, mode: ResetMode, rev: &str) -> Result<()> {
    let id = revs::resolve(repo, rev)?;
    let tree_id = commit_tree(repo, &id)?;

    if mode == ResetMode::Mixed {
        let mut index = Index::load(repo)?;
        index.clear();
        for (path, (entry_mode, entry_id)) in flatten_tree(repo, &tree_id)? {
            // Empty stat data forces the next status to rehash the file.
            index.upsert(IndexEntry {
                path,
                id: entry_id,
                mode: entry_mode,
                stat: StatData::default(),
            });
        }
        index.save(repo)?;
    }
    refs::update_head(repo, &id)
}
