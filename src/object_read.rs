use crate::error::GitError;
use crate::repo::Repository;
use anyhow::{Context, Result, anyhow, bail};
use flate2::read::ZlibDecoder;
use std::ffi::CStr;
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn from_str(kind: &str) -> Result<Self> {
        match kind {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(anyhow!("unknown object kind: {}", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }

    pub fn from_mode(mode: u32) -> ObjectKind {
        match mode {
            0o40000 => ObjectKind::Tree,
            _ => ObjectKind::Blob,
        }
    }
}

/// A loose object mid-decode: its kind, the payload length promised by the
/// header, and a reader positioned at the first payload byte.
pub struct Object<R> {
    pub reader: R,
    pub kind: ObjectKind,
    pub expected_size: u64,
}

impl Object<()> {
    /// Open the loose object with the given full 40-hex id.
    pub fn read(repo: &Repository, id: &str) -> Result<Object<impl BufRead>> {
        let path = repo.objects_dir().join(&id[..2]).join(&id[2..]);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GitError::ObjectNotFound(id.to_string()).into());
            }
            Err(e) => return Err(e).with_context(|| format!("opening {}", path.display())),
        };
        let decoder = ZlibDecoder::new(file);
        let mut reader = BufReader::new(decoder);
        let mut buf = Vec::new();
        reader
            .read_until(0, &mut buf)
            .map_err(|_| GitError::CorruptObject(id.to_string()))?;
        let header = CStr::from_bytes_with_nul(&buf)
            .map_err(|_| GitError::CorruptObject(id.to_string()))?;
        let header = header
            .to_str()
            .map_err(|_| GitError::CorruptObject(id.to_string()))?;
        let Some((kind, size)) = header.split_once(' ') else {
            return Err(GitError::CorruptObject(id.to_string()).into());
        };
        let expected_size = size
            .parse::<u64>()
            .map_err(|_| GitError::CorruptObject(id.to_string()))?;
        let kind = ObjectKind::from_str(kind)?;
        Ok(Object {
            reader,
            kind,
            expected_size,
        })
    }
}

/// Read a loose object fully into memory, validating that the payload length
/// matches the header.
pub fn read_bytes(repo: &Repository, id: &str) -> Result<(ObjectKind, Vec<u8>)> {
    let mut object = Object::read(repo, id)?;
    let mut payload = Vec::with_capacity(object.expected_size as usize);
    object
        .reader
        .read_to_end(&mut payload)
        .map_err(|_| GitError::CorruptObject(id.to_string()))?;
    if payload.len() as u64 != object.expected_size {
        return Err(GitError::CorruptObject(id.to_string()).into());
    }
    Ok((object.kind, payload))
}

pub fn object_exists(repo: &Repository, id: &str) -> bool {
    repo.objects_dir().join(&id[..2]).join(&id[2..]).is_file()
}

/// Expand a hex prefix (minimum 4 chars) to the full object id by scanning
/// the two-char fanout directory.
pub fn resolve_prefix(repo: &Repository, prefix: &str) -> Result<String> {
    if prefix.len() < 4 || prefix.len() > 40 {
        bail!("object id prefix must be between 4 and 40 hex characters");
    }
    if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(GitError::ObjectNotFound(prefix.to_string()).into());
    }
    let fanout = repo.objects_dir().join(&prefix[..2]);
    let entries = match fs::read_dir(&fanout) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GitError::ObjectNotFound(prefix.to_string()).into());
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", fanout.display())),
    };
    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| anyhow!("non-UTF-8 entry in object directory"))?;
        if name.starts_with(&prefix[2..]) && entry.file_type()?.is_file() {
            matches.push(name);
        }
    }
    match matches.len() {
        0 => Err(GitError::ObjectNotFound(prefix.to_string()).into()),
        1 => Ok(format!("{}{}", &prefix[..2], matches[0])),
        _ => Err(GitError::AmbiguousPrefix(prefix.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_write::store_bytes;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn round_trip_blob() {
        let (_dir, repo) = test_repo();
        let id = store_bytes(&repo, ObjectKind::Blob, b"hello pygit\n").unwrap();
        let id = hex::encode(id);
        let (kind, payload) = read_bytes(&repo, &id).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(payload, b"hello pygit\n");
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_dir, repo) = test_repo();
        let err = read_bytes(&repo, "0123456789012345678901234567890123456789").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn prefix_resolution() {
        let (_dir, repo) = test_repo();
        let id = hex::encode(store_bytes(&repo, ObjectKind::Blob, b"a\n").unwrap());
        assert_eq!(resolve_prefix(&repo, &id[..6]).unwrap(), id);
        assert_eq!(resolve_prefix(&repo, &id).unwrap(), id);
        assert!(resolve_prefix(&repo, &id[..3]).is_err());
        let err = resolve_prefix(&repo, "ffff").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn ambiguous_prefix_reported() {
        let (_dir, repo) = test_repo();
        let fanout = repo.objects_dir().join("ab");
        std::fs::create_dir_all(&fanout).unwrap();
        std::fs::write(fanout.join("cd111111111111111111111111111111111111"), b"x").unwrap();
        std::fs::write(fanout.join("cd222222222222222222222222222222222222"), b"x").unwrap();
        let err = resolve_prefix(&repo, "abcd").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::AmbiguousPrefix(_))
        ));
    }
}
