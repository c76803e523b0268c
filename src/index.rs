use crate::error::GitError;
use crate::repo::{Repository, atomic_write};
use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use std::fs;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

pub const MODE_REGULAR: u32 = 0o100644;
pub const MODE_EXECUTABLE: u32 = 0o100755;
pub const MODE_TREE: u32 = 0o40000;

const SIGNATURE: &[u8; 4] = b"DIRC";
const ENTRY_FIXED_LEN: usize = 62;
const FLAG_ASSUME_VALID: u16 = 0x8000;
const FLAG_EXTENDED: u16 = 0x4000;
const NAME_LEN_MASK: u16 = 0x0FFF;

/// Cached stat fields for one tracked file, all truncated to 32 bits the way
/// the on-disk format stores them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl StatData {
    pub fn from_metadata(meta: &Metadata) -> StatData {
        StatData {
            ctime_secs: meta.ctime() as u32,
            ctime_nsecs: meta.ctime_nsec() as u32,
            mtime_secs: meta.mtime() as u32,
            mtime_nsecs: meta.mtime_nsec() as u32,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid() as u32,
            gid: meta.gid() as u32,
            size: meta.len() as u32,
        }
    }

    /// Fast equality check against a live file. When mtime, size and inode
    /// all match the cached values the content is assumed unchanged and no
    /// rehash happens.
    pub fn matches(&self, meta: &Metadata) -> bool {
        self.mtime_secs == meta.mtime() as u32
            && self.mtime_nsecs == meta.mtime_nsec() as u32
            && self.size == meta.len() as u32
            && self.ino == meta.ino() as u32
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: String,
    pub id: [u8; 20],
    pub mode: u32,
    pub stat: StatData,
}

/// The staging area: a flat list of entries sorted by path bytes, mirrored
/// to `.git/index` in format v2.
#[derive(Default, Debug)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Load `.git/index`; a missing file is an empty index.
    pub fn load(repo: &Repository) -> Result<Index> {
        let bytes = match fs::read(repo.index_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Index::default()),
            Err(e) => return Err(e).context("reading index"),
        };
        parse(&bytes)
    }

    pub fn save(&self, repo: &Repository) -> Result<()> {
        atomic_write(&repo.index_path(), &self.serialize()).context("writing index")
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.position(path).ok().map(|i| &self.entries[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.position(path).is_ok()
    }

    /// Insert or replace, keeping entries sorted and paths unique.
    pub fn upsert(&mut self, entry: IndexEntry) {
        match self.position(&entry.path) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    pub fn remove(&mut self, path: &str) -> bool {
        match self.position(path) {
            Ok(i) => {
                self.entries.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, path: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| e.path.as_bytes().cmp(path.as_bytes()))
    }

    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(SIGNATURE);
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            write_entry(&mut buf, entry);
        }
        let checksum = Sha1::digest(&buf);
        buf.extend_from_slice(&checksum);
        buf
    }
}

fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry) {
    let entry_start = buf.len();
    buf.extend_from_slice(&entry.stat.ctime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ctime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.dev.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ino.to_be_bytes());
    buf.extend_from_slice(&entry.mode.to_be_bytes());
    buf.extend_from_slice(&entry.stat.uid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.gid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.size.to_be_bytes());
    buf.extend_from_slice(&entry.id);
    // Stage is always 0 here, so the flags word is just the capped name length.
    let name_len = entry.path.len().min(NAME_LEN_MASK as usize) as u16;
    buf.extend_from_slice(&name_len.to_be_bytes());
    buf.extend_from_slice(entry.path.as_bytes());
    // Pad with NULs to a multiple of 8 from the entry start, at least one.
    let entry_len = (ENTRY_FIXED_LEN + entry.path.len() + 8) & !7;
    buf.resize(entry_start + entry_len, 0);
}

fn parse(bytes: &[u8]) -> Result<Index> {
    if bytes.len() < 12 + 20 {
        return Err(GitError::CorruptIndex("file too short".into()).into());
    }
    if &bytes[..4] != SIGNATURE {
        return Err(GitError::CorruptIndex("bad signature".into()).into());
    }
    let version = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
    if version != 2 && version != 3 {
        return Err(
            GitError::CorruptIndex(format!("unsupported index version {version}")).into(),
        );
    }
    let count = u32::from_be_bytes(bytes[8..12].try_into().unwrap()) as usize;

    let trailer_start = bytes.len() - 20;
    let expected = Sha1::digest(&bytes[..trailer_start]);
    if expected.as_slice() != &bytes[trailer_start..] {
        return Err(GitError::CorruptIndex("checksum mismatch".into()).into());
    }

    let mut entries = Vec::with_capacity(count);
    let mut pos = 12;
    let mut prev_path: Option<Vec<u8>> = None;
    for _ in 0..count {
        let (entry, len) = parse_entry(&bytes[..trailer_start], pos, version)?;
        if let Some(prev) = &prev_path {
            if prev.as_slice() >= entry.path.as_bytes() {
                return Err(GitError::CorruptIndex("entries not sorted".into()).into());
            }
        }
        prev_path = Some(entry.path.as_bytes().to_vec());
        entries.push(entry);
        pos += len;
    }
    // Extensions between the entries and the checksum are tolerated and dropped.
    Ok(Index { entries })
}

fn parse_entry(bytes: &[u8], start: usize, version: u32) -> Result<(IndexEntry, usize)> {
    let corrupt = |msg: &str| GitError::CorruptIndex(msg.into());
    if start + ENTRY_FIXED_LEN > bytes.len() {
        return Err(corrupt("truncated entry").into());
    }
    let u32_at = |off: usize| u32::from_be_bytes(bytes[start + off..start + off + 4].try_into().unwrap());
    let stat = StatData {
        ctime_secs: u32_at(0),
        ctime_nsecs: u32_at(4),
        mtime_secs: u32_at(8),
        mtime_nsecs: u32_at(12),
        dev: u32_at(16),
        ino: u32_at(20),
        uid: u32_at(28),
        gid: u32_at(32),
        size: u32_at(36),
    };
    let mode = u32_at(24);
    let mut id = [0u8; 20];
    id.copy_from_slice(&bytes[start + 40..start + 60]);
    let flags = u16::from_be_bytes(bytes[start + 60..start + 62].try_into().unwrap());
    // Assume-valid is tolerated on read and dropped; stat checks still run.
    let _assume_valid = flags & FLAG_ASSUME_VALID != 0;
    if flags & FLAG_EXTENDED != 0 && version < 3 {
        return Err(corrupt("extended flag in v2 entry").into());
    }
    let mut fixed_len = ENTRY_FIXED_LEN;
    if flags & FLAG_EXTENDED != 0 {
        let extra = bytes
            .get(start + 62..start + 64)
            .ok_or_else(|| corrupt("truncated entry"))?;
        if extra != [0, 0] {
            return Err(corrupt("unsupported extended flags").into());
        }
        fixed_len += 2;
    }
    if (flags >> 12) & 0x3 != 0 {
        return Err(corrupt("merge stages are not supported").into());
    }
    let name_len = (flags & NAME_LEN_MASK) as usize;
    let path_start = start + fixed_len;
    let path_bytes = if name_len < NAME_LEN_MASK as usize {
        bytes
            .get(path_start..path_start + name_len)
            .ok_or_else(|| corrupt("truncated path"))?
    } else {
        // Overlong path: the length field is saturated, scan to the NUL.
        let rest = bytes
            .get(path_start..)
            .ok_or_else(|| corrupt("truncated path"))?;
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| corrupt("unterminated path"))?;
        &rest[..nul]
    };
    if path_bytes.contains(&0) {
        return Err(corrupt("NUL in path").into());
    }
    let path = std::str::from_utf8(path_bytes)
        .map_err(|_| corrupt("non-UTF-8 path"))?
        .to_string();
    validate_path(&path)?;
    let entry_len = (fixed_len + path_bytes.len() + 8) & !7;
    if start + entry_len > bytes.len() {
        return Err(corrupt("truncated entry padding").into());
    }
    Ok((IndexEntry { path, id, mode, stat }, entry_len))
}

/// Index paths use `/` separators and never contain empty, `.` or `..`
/// segments.
pub fn validate_path(path: &str) -> Result<()> {
    let ok = !path.is_empty()
        && !path.starts_with('/')
        && !path.ends_with('/')
        && path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    if ok {
        Ok(())
    } else {
        Err(GitError::CorruptIndex(format!("malformed path '{path}'")).into())
    }
}
