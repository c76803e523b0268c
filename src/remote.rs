use crate::config::{Config, remote_section};
use crate::repo::Repository;
use anyhow::{Result, bail};

pub fn git_remote_list(repo: &Repository, verbose: bool) -> Result<()> {
    let config = Config::load(repo)?;
    for name in config.subsection_names("remote") {
        if verbose {
            let url = config.get(&remote_section(&name), "url").unwrap_or("");
            println!("{name}\t{url} (fetch)");
            println!("{name}\t{url} (push)");
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

pub fn git_remote_add(repo: &Repository, name: &str, url: &str) -> Result<()> {
    let mut config = Config::load(repo)?;
    let section = remote_section(name);
    if config.has_section(&section) {
        bail!("remote {name} already exists");
    }
    config.set(&section, "url", url);
    config.save(repo)
}

pub fn git_remote_get_url(repo: &Repository, name: &str) -> Result<()> {
    println!("{}", remote_url(repo, name)?);
    Ok(())
}

pub fn git_remote_remove(repo: &Repository, name: &str) -> Result<()> {
    let mut config = Config::load(repo)?;
    if !config.remove_section(&remote_section(name)) {
        bail!("no such remote: '{name}'");
    }
    config.save(repo)
}

pub fn remote_url(repo: &Repository, name: &str) -> Result<String> {
    let config = Config::load(repo)?;
    match config.get(&remote_section(name), "url") {
        Some(url) => Ok(url.to_string()),
        None => bail!("no such remote: '{name}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_get_remove_cycle() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        git_remote_add(&repo, "origin", "http://localhost:8000/r.git").unwrap();
        assert_eq!(remote_url(&repo, "origin").unwrap(), "http://localhost:8000/r.git");
        assert!(git_remote_add(&repo, "origin", "elsewhere").is_err());
        git_remote_remove(&repo, "origin").unwrap();
        assert!(remote_url(&repo, "origin").is_err());
        assert!(git_remote_remove(&repo, "origin").is_err());
    }
}
