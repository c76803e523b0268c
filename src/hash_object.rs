use crate::object_read::{Object, ObjectKind};
use crate::repo::Repository;
use anyhow::{Context, Result};
use std::fs;
use std::io::sink;
use std::path::Path;

/// Hash a file as an object of the given kind, printing the id. With
/// `write` set the object is also stored. Blobs stream straight from the
/// file; other kinds are read whole since their payload must be validated
/// by whoever crafted it.
pub fn git_hash_object(
    repo: &Repository,
    kind: ObjectKind,
    file: &Path,
    write: bool,
) -> Result<[u8; 20]> {
    let hash = if kind == ObjectKind::Blob {
        let mut object = Object::from_file(file)?;
        if write {
            object.store(repo)?
        } else {
            object.write(sink())?
        }
    } else {
        let payload = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let mut object = Object::from_bytes(kind, payload);
        if write {
            object.store(repo)?
        } else {
            object.write(sink())?
        }
    };
    Ok(hash)
}
