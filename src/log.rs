use crate::commit::{read_commit, split_signature};
use crate::refs;
use crate::repo::Repository;
use anyhow::Result;
use chrono::{FixedOffset, TimeZone};

/// Walk the first-parent chain from HEAD. The chain is a list keyed by id,
/// so traversal is a plain loop.
pub fn git_log(repo: &Repository, oneline: bool, count: Option<usize>) -> Result<()> {
    let mut next = refs::head_commit(repo)?;
    let mut remaining = count.unwrap_or(usize::MAX);
    let mut first = true;
    while let Some(id) = next {
        if remaining == 0 {
            break;
        }
        remaining -= 1;
        let info = read_commit(repo, &id)?;
        if oneline {
            let subject = info.message.lines().next().unwrap_or("");
            println!("{} {}", &id[..7], subject);
        } else {
            if !first {
                println!();
            }
            println!("commit {id}");
            if let Some((who, epoch, tz)) = split_signature(&info.author) {
                println!("Author: {who}");
                println!("Date:   {}", format_date(epoch, tz));
            }
            println!();
            for line in info.message.lines() {
                println!("    {line}");
            }
        }
        first = false;
        next = info.parents.first().cloned();
    }
    Ok(())
}

/// `<epoch> <±HHMM>` rendered in the commit's own timezone.
fn format_date(epoch: i64, tz: &str) -> String {
    let offset = parse_tz(tz).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    match offset.timestamp_opt(epoch, 0) {
        chrono::LocalResult::Single(dt) => {
            format!("{} {}", dt.format("%a %b %-d %H:%M:%S %Y"), tz)
        }
        _ => format!("{epoch} {tz}"),
    }
}

fn parse_tz(tz: &str) -> Option<FixedOffset> {
    let (sign, digits) = tz.split_at_checked(1)?;
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    let seconds = hours * 3600 + minutes * 60;
    match sign {
        "+" => FixedOffset::east_opt(seconds),
        "-" => FixedOffset::west_opt(seconds),
        _ => None,
    }
}
