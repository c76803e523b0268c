use crate::commit::parse_commit;
use crate::object_read::{ObjectKind, object_exists, read_bytes};
use crate::repo::Repository;
use crate::tree::parse_tree;
use anyhow::Result;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::io::Write;

fn pack_type(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Blob => 3,
        ObjectKind::Tag => 4,
    }
}

/// Every object reachable from `start`, ids only.
fn reachable(repo: &Repository, start: &str, out: &mut HashSet<String>) -> Result<()> {
    let mut stack = vec![start.to_string()];
    while let Some(id) = stack.pop() {
        if !out.insert(id.clone()) {
            continue;
        }
        let (kind, payload) = read_bytes(repo, &id)?;
        match kind {
            ObjectKind::Commit => {
                let info = parse_commit(&payload)?;
                stack.push(info.tree);
                stack.extend(info.parents);
            }
            ObjectKind::Tree => {
                for entry in parse_tree(&payload)? {
                    stack.push(hex::encode(entry.id));
                }
            }
            ObjectKind::Blob | ObjectKind::Tag => {}
        }
    }
    Ok(())
}

/// Objects reachable from `new_id` but not from `old_id`, loaded into
/// memory ready for packing. An unknown or absent `old_id` excludes
/// nothing.
pub fn collect_objects(
    repo: &Repository,
    new_id: &str,
    old_id: Option<&str>,
) -> Result<Vec<(ObjectKind, Vec<u8>)>> {
    let mut have = HashSet::new();
    if let Some(old) = old_id {
        if object_exists(repo, old) {
            reachable(repo, old, &mut have)?;
        }
    }
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![new_id.to_string()];
    while let Some(id) = stack.pop() {
        if have.contains(&id) || !seen.insert(id.clone()) {
            continue;
        }
        let (kind, payload) = read_bytes(repo, &id)?;
        match kind {
            ObjectKind::Commit => {
                let info = parse_commit(&payload)?;
                stack.push(info.tree);
                stack.extend(info.parents);
            }
            ObjectKind::Tree => {
                for entry in parse_tree(&payload)? {
                    stack.push(hex::encode(entry.id));
                }
            }
            ObjectKind::Blob | ObjectKind::Tag => {}
        }
        out.push((kind, payload));
    }
    Ok(out)
}

/// Pack v2 with no deltas: `PACK`, version, count, one framed zlib stream
/// per object, then a SHA-1 over everything before it.
pub fn encode_pack(objects: &[(ObjectKind, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(b"PACK");
    out.extend_from_slice(&2u32.to_be_bytes());
    out.extend_from_slice(&(objects.len() as u32).to_be_bytes());
    for (kind, payload) in objects {
        entry_header(pack_type(*kind), payload.len(), &mut out);
        let mut encoder = ZlibEncoder::new(&mut out, Compression::default());
        encoder.write_all(payload)?;
        encoder.finish()?;
    }
    let checksum = Sha1::digest(&out);
    out.extend_from_slice(&checksum);
    Ok(out)
}

/// Object header: low four size bits share the first byte with the type,
/// the rest follows in seven-bit little-endian groups.
fn entry_header(obj_type: u8, size: usize, out: &mut Vec<u8>) {
    let mut size = size;
    let mut byte = (obj_type << 4) | (size & 0x0F) as u8;
    size >>= 4;
    while size > 0 {
        out.push(byte | 0x80);
        byte = (size & 0x7F) as u8;
        size >>= 7;
    }
    out.push(byte);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::add::git_add;
    use crate::commit::{Identity, create_commit};
    use flate2::read::ZlibDecoder;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn entry_header_varint_layout() {
        let mut out = Vec::new();
        entry_header(3, 10, &mut out);
        assert_eq!(out, [0x3A]);

        out.clear();
        entry_header(3, 300, &mut out);
        // 300 = 0b1_0010_1100: low nibble 0xC in byte 0, 0x12 continues.
        assert_eq!(out, [0xBC, 0x12]);

        out.clear();
        entry_header(1, 0, &mut out);
        assert_eq!(out, [0x10]);
    }

    #[test]
    fn single_blob_pack_layout() {
        let payload = b"pack me\n".to_vec();
        let pack = encode_pack(&[(ObjectKind::Blob, payload.clone())]).unwrap();

        assert_eq!(&pack[..4], b"PACK");
        assert_eq!(u32::from_be_bytes(pack[4..8].try_into().unwrap()), 2);
        assert_eq!(u32::from_be_bytes(pack[8..12].try_into().unwrap()), 1);
        assert_eq!(pack[12], 0x30 | payload.len() as u8);

        let mut inflated = Vec::new();
        ZlibDecoder::new(&pack[13..pack.len() - 20])
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, payload);

        let trailer_start = pack.len() - 20;
        let expected = Sha1::digest(&pack[..trailer_start]);
        assert_eq!(&pack[trailer_start..], expected.as_slice());
    }

    fn ident() -> Identity {
        Identity {
            name: "t".into(),
            email: "t@t".into(),
        }
    }

    #[test]
    fn closure_excludes_whats_already_on_the_other_side() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(repo.work_path("a"), "one\n").unwrap();
        git_add(&repo, &["a".to_string()]).unwrap();
        let first = create_commit(&repo, Some("one"), false, &ident(), &ident()).unwrap();

        std::fs::write(repo.work_path("b"), "two\n").unwrap();
        git_add(&repo, &["b".to_string()]).unwrap();
        let second = create_commit(&repo, Some("two"), false, &ident(), &ident()).unwrap();

        // Full closure: 2 commits, 2 trees, 2 blobs.
        let all = collect_objects(&repo, &second, None).unwrap();
        assert_eq!(all.len(), 6);

        // Incremental: second commit, its tree, and the new blob only. The
        // blob for `a` is reachable from `first` and stays out.
        let delta = collect_objects(&repo, &second, Some(&first)).unwrap();
        assert_eq!(delta.len(), 3);
        let kinds: Vec<_> = delta.iter().map(|(k, _)| *k).collect();
        assert!(kinds.contains(&ObjectKind::Commit));
        assert!(kinds.contains(&ObjectKind::Tree));
        assert!(kinds.contains(&ObjectKind::Blob));

        // Unknown old id excludes nothing.
        let zeros = "0000000000000000000000000000000000000000";
        assert_eq!(collect_objects(&repo, &second, Some(zeros)).unwrap().len(), 6);
    }
}
