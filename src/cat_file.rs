use crate::object_read::{Object, ObjectKind, read_bytes};
use crate::repo::Repository;
use crate::revs;
use crate::tree::parse_tree;
use anyhow::{Result, ensure};
use std::io::{Read, Write, copy, stdout};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatMode {
    Pretty,
    Type,
    Size,
}

pub fn git_cat_file(repo: &Repository, mode: CatMode, rev: &str) -> Result<()> {
    let id = revs::resolve(repo, rev)?;
    match mode {
        CatMode::Type => {
            let object = Object::read(repo, &id)?;
            println!("{}", object.kind.as_str());
        }
        CatMode::Size => {
            let object = Object::read(repo, &id)?;
            println!("{}", object.expected_size);
        }
        CatMode::Pretty => {
            let kind = Object::read(repo, &id)?.kind;
            if kind == ObjectKind::Tree {
                print_tree(repo, &id)?;
            } else {
                print_raw(repo, &id)?;
            }
        }
    }
    Ok(())
}

/// Stream the payload to stdout, clamped to the header's size so a corrupt
/// zlib stream cannot balloon the output.
fn print_raw(repo: &Repository, id: &str) -> Result<()> {
    let mut object = Object::read(repo, id)?;
    let mut sout = stdout().lock();
    let copied = copy(&mut object.reader.by_ref().take(object.expected_size), &mut sout)?;
    ensure!(
        copied == object.expected_size,
        "object size mismatch, expected {}, got {}",
        object.expected_size,
        copied
    );
    Ok(())
}

fn print_tree(repo: &Repository, id: &str) -> Result<()> {
    let (_, payload) = read_bytes(repo, id)?;
    let mut sout = stdout().lock();
    for entry in parse_tree(&payload)? {
        let kind = ObjectKind::from_mode(entry.mode);
        writeln!(
            sout,
            "{:06o} {} {}\t{}",
            entry.mode,
            kind.as_str(),
            hex::encode(entry.id),
            entry.name
        )?;
    }
    Ok(())
}
