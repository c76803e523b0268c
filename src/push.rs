use crate::error::GitError;
use crate::pack::{collect_objects, encode_pack};
use crate::pkt::{self, Pkt};
use crate::refs;
use crate::remote::remote_url;
use crate::repo::Repository;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

const ZERO_ID: &str = "0000000000000000000000000000000000000000";

/// Push a branch over the smart-HTTP receive-pack protocol: learn the
/// remote's refs with one GET, then POST the ref update and a pack holding
/// everything the remote is missing. Local refs are never touched.
pub fn git_push(repo: &Repository, remote: Option<&str>, branch: Option<&str>) -> Result<()> {
    let remote = remote.unwrap_or("origin");
    let url = remote_url(repo, remote)?;
    let branch = match branch {
        Some(branch) => branch.to_string(),
        None => refs::current_branch(repo)?
            .context("HEAD is detached; name the branch to push")?,
    };
    let new_id = refs::read_branch(repo, &branch)?
        .ok_or_else(|| GitError::RefNotFound(branch.clone()))?;

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(http_timeout_secs()))
        .build()
        .context("building http client")?;

    let discover_url = format!("{url}/info/refs?service=git-receive-pack");
    let response = client
        .get(&discover_url)
        .send()
        .with_context(|| format!("GET {discover_url}"))?;
    if !response.status().is_success() {
        return Err(GitError::Protocol(format!(
            "ref discovery failed with HTTP {}",
            response.status()
        ))
        .into());
    }
    let advertised = parse_advertisement(&response.bytes().context("reading ref advertisement")?)?;

    let refname = format!("refs/heads/{branch}");
    let old_id = advertised
        .get(&refname)
        .cloned()
        .unwrap_or_else(|| ZERO_ID.to_string());
    if old_id == new_id {
        println!("Everything up-to-date");
        return Ok(());
    }

    let old_for_closure = (old_id != ZERO_ID).then_some(old_id.as_str());
    let objects = collect_objects(repo, &new_id, old_for_closure)?;
    let body = build_update_request(&old_id, &new_id, &refname, &encode_pack(&objects)?);

    let push_url = format!("{url}/git-receive-pack");
    let response = client
        .post(&push_url)
        .header("Content-Type", "application/x-git-receive-pack-request")
        .header("Accept", "application/x-git-receive-pack-result")
        .body(body)
        .send()
        .with_context(|| format!("POST {push_url}"))?;
    if !response.status().is_success() {
        return Err(GitError::Protocol(format!(
            "receive-pack failed with HTTP {}",
            response.status()
        ))
        .into());
    }
    parse_report(&response.bytes().context("reading report-status")?, &refname)?;
    println!("{remote}\t{} -> {}", &new_id[..7], branch);
    Ok(())
}

fn http_timeout_secs() -> u64 {
    env::var("PYGIT_HTTP_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}

/// `<id> <refname>` pairs from a `# service=git-receive-pack`
/// advertisement. The capability list after the first NUL and the
/// `capabilities^{}` placeholder of an empty remote are dropped.
fn parse_advertisement(bytes: &[u8]) -> Result<HashMap<String, String>> {
    let protocol = |msg: &str| GitError::Protocol(msg.to_string());
    let pkts = pkt::parse_all(bytes)?;
    let mut lines = pkts.iter().filter_map(|p| match p {
        Pkt::Data(data) => Some(data),
        Pkt::Flush => None,
    });
    let header = lines.next().ok_or_else(|| protocol("empty advertisement"))?;
    if !header.starts_with(b"# service=git-receive-pack") {
        return Err(protocol("unexpected advertisement service").into());
    }
    let mut out = HashMap::new();
    for line in lines {
        let line = line.split(|&b| b == 0).next().unwrap_or(line);
        let text = std::str::from_utf8(line)
            .map_err(|_| protocol("non-UTF-8 ref line"))?
            .trim_end();
        let Some((id, name)) = text.split_once(' ') else {
            return Err(protocol("malformed ref line").into());
        };
        if id.len() != 40 || name.is_empty() {
            return Err(protocol("malformed ref line").into());
        }
        if name == "capabilities^{}" {
            continue;
        }
        out.insert(name.to_string(), id.to_string());
    }
    Ok(out)
}

fn build_update_request(old_id: &str, new_id: &str, refname: &str, pack: &[u8]) -> Vec<u8> {
    let command = format!("{old_id} {new_id} {refname}\0report-status\n");
    let mut body = pkt::encode(command.as_bytes());
    body.extend_from_slice(pkt::FLUSH);
    body.extend_from_slice(pack);
    body
}

/// Check the remote's `report-status` section: `unpack ok` first, then one
/// `ok`/`ng` line per ref.
fn parse_report(bytes: &[u8], refname: &str) -> Result<()> {
    let protocol = |msg: String| GitError::Protocol(msg);
    let mut unpack_ok = false;
    let mut ref_ok = false;
    for p in pkt::parse_all(bytes)? {
        let Pkt::Data(data) = p else { continue };
        let Ok(text) = std::str::from_utf8(&data) else {
            continue;
        };
        let text = text.trim_end();
        if text == "unpack ok" {
            unpack_ok = true;
        } else if let Some(rest) = text.strip_prefix("unpack ") {
            return Err(protocol(format!("remote failed to unpack: {rest}")).into());
        } else if text == format!("ok {refname}") {
            ref_ok = true;
        } else if let Some(rest) = text.strip_prefix("ng ") {
            return Err(protocol(format!("remote rejected {rest}")).into());
        }
    }
    if !unpack_ok {
        return Err(protocol("remote sent no unpack status".to_string()).into());
    }
    if !ref_ok {
        return Err(protocol(format!("remote sent no status for {refname}")).into());
    }
    Ok(())
}
