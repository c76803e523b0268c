use crate::error::GitError;
use anyhow::Result;

/// Smart-HTTP framing: each line is prefixed with its total length as four
/// lower-hex digits; `0000` is the flush packet that ends a section.
pub const FLUSH: &[u8] = b"0000";

const MAX_PAYLOAD: usize = 65516;

pub fn encode(data: &[u8]) -> Vec<u8> {
    assert!(data.len() <= MAX_PAYLOAD, "pkt-line payload too large");
    let mut out = format!("{:04x}", data.len() + 4).into_bytes();
    out.extend_from_slice(data);
    out
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pkt {
    Data(Vec<u8>),
    Flush,
}

/// Split a buffer into pkt-lines. Trailing garbage or a length pointing
/// past the end is a protocol error.
pub fn parse_all(buf: &[u8]) -> Result<Vec<Pkt>> {
    let malformed = |msg: &str| GitError::Protocol(format!("malformed pkt-line: {msg}"));
    let mut out = Vec::new();
    let mut rest = buf;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(malformed("truncated length").into());
        }
        let len_str = std::str::from_utf8(&rest[..4]).map_err(|_| malformed("non-ASCII length"))?;
        let len = usize::from_str_radix(len_str, 16).map_err(|_| malformed("bad length"))?;
        if len == 0 {
            out.push(Pkt::Flush);
            rest = &rest[4..];
            continue;
        }
        if len < 4 || len > rest.len() {
            return Err(malformed("length out of range").into());
        }
        out.push(Pkt::Data(rest[4..len].to_vec()));
        rest = &rest[len..];
    }
    Ok(out)
}
