use crate::index::Index;
use crate::repo::Repository;
use anyhow::Result;

/// List index paths; with `stage` set, the full `<mode> <id> <stage>\t<path>`
/// form. Entries are already in path order.
pub fn git_ls_files(repo: &Repository, stage: bool) -> Result<()> {
    let index = Index::load(repo)?;
    for entry in index.entries() {
        if stage {
            println!("{:06o} {} 0\t{}", entry.mode, hex::encode(entry.id), entry.path);
        } else {
            println!("{}", entry.path);
        }
    }
    Ok(())
}
