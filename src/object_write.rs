use crate::object_read::{Object, ObjectKind, object_exists};
use crate::repo::Repository;
use anyhow::{Context, Result, anyhow};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use sha1::{Digest, Sha1};
use std::fs::{File, create_dir_all};
use std::io::{Cursor, Read, Write, copy};
use std::path::Path;
use tempfile::NamedTempFile;

/// An object's id is the SHA-1 of `"<kind> <len>\0"` followed by the payload.
/// Writing streams the same bytes through zlib, so the hash and the encoded
/// form are produced in one pass.
impl Object<()> {
    /// Blob object backed by a file on disk, hashed as it is read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Object<File>> {
        let reader = File::open(&path)
            .map_err(|e| anyhow!("error reading provided file path: {e}"))?;
        let metadata = reader.metadata().context("error getting metadata")?;
        Ok(Object {
            expected_size: metadata.len(),
            kind: ObjectKind::Blob,
            reader,
        })
    }

    /// Object backed by an in-memory payload.
    pub fn from_bytes(kind: ObjectKind, payload: Vec<u8>) -> Object<Cursor<Vec<u8>>> {
        Object {
            expected_size: payload.len() as u64,
            kind,
            reader: Cursor::new(payload),
        }
    }
}

impl<R> Object<R>
where
    R: Read,
{
    /// Zlib-encode the framed object into `writer`, returning its id.
    pub fn write(&mut self, writer: impl Write) -> Result<[u8; 20]> {
        let encoder = ZlibEncoder::new(writer, Compression::default());
        let mut hash_writer = HashWriter {
            writer: encoder,
            hasher: Sha1::new(),
        };
        write!(
            hash_writer,
            "{} {}\0",
            self.kind.as_str(),
            self.expected_size
        )?;
        copy(&mut self.reader, &mut hash_writer)?;
        let _compressed = hash_writer.writer.finish()?;
        let hash = hash_writer.hasher.finalize();
        Ok(hash.into())
    }

    /// Store under `objects/aa/bb...` via temp file and rename. Idempotent:
    /// an existing object file is left untouched.
    pub fn store(&mut self, repo: &Repository) -> Result<[u8; 20]> {
        let mut tmp_file = NamedTempFile::new_in(repo.objects_dir())
            .context("creating temp object file")?;
        let hash = self.write(&mut tmp_file)?;
        let hash_enc = hex::encode(hash);
        if object_exists(repo, &hash_enc) {
            return Ok(hash);
        }
        let fanout = repo.objects_dir().join(&hash_enc[..2]);
        create_dir_all(&fanout).context("creating git object directory")?;
        tmp_file
            .persist(fanout.join(&hash_enc[2..]))
            .context("renaming object")?;
        Ok(hash)
    }
}

/// Hash an object without writing it anywhere.
pub fn hash_object(kind: ObjectKind, payload: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", kind.as_str(), payload.len()).as_bytes());
    hasher.update(payload);
    hasher.finalize().into()
}

/// Hash and store an in-memory payload.
pub fn store_bytes(repo: &Repository, kind: ObjectKind, payload: &[u8]) -> Result<[u8; 20]> {
    Object::from_bytes(kind, payload.to_vec()).store(repo)
}

struct HashWriter<W> {
    writer: W,
    hasher: Sha1,
}

impl<W> Write for HashWriter<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
