use crate::repo::{Repository, atomic_write};
use anyhow::{Context, Result, bail};
use std::fmt::Write as _;
use std::fs;

/// Parsed view of `.git/config`: ordered sections of `key = value` pairs.
/// Section headers keep their inner text verbatim (`core`,
/// `remote "origin"`, ...). The file is rewritten whole on save.
#[derive(Default)]
pub struct Config {
    sections: Vec<Section>,
}

struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Config {
    pub fn load(repo: &Repository) -> Result<Config> {
        let text = match fs::read_to_string(repo.config_path()) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e).context("reading config"),
        };
        let mut config = Config::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    bail!("malformed config section header: {line}");
                };
                config.sections.push(Section {
                    name: name.trim().to_string(),
                    entries: Vec::new(),
                });
            } else if let Some((key, value)) = line.split_once('=') {
                let Some(section) = config.sections.last_mut() else {
                    bail!("config entry outside any section: {line}");
                };
                section
                    .entries
                    .push((key.trim().to_string(), value.trim().to_string()));
            } else {
                bail!("malformed config line: {line}");
            }
        }
        Ok(config)
    }

    pub fn save(&self, repo: &Repository) -> Result<()> {
        let mut out = String::new();
        for section in &self.sections {
            writeln!(out, "[{}]", section.name).unwrap();
            for (key, value) in &section.entries {
                writeln!(out, "\t{key} = {value}").unwrap();
            }
        }
        atomic_write(&repo.config_path(), out.as_bytes()).context("writing config")
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let section = match self.sections.iter_mut().find(|s| s.name == section) {
            Some(section) => section,
            None => {
                self.sections.push(Section {
                    name: section.to_string(),
                    entries: Vec::new(),
                });
                self.sections.last_mut().unwrap()
            }
        };
        match section.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => section.entries.push((key.to_string(), value.to_string())),
        }
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.iter().any(|s| s.name == section)
    }

    pub fn remove_section(&mut self, section: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| s.name != section);
        self.sections.len() != before
    }

    /// Names of subsections, e.g. `subsection_names("remote")` lists the
    /// configured remotes.
    pub fn subsection_names(&self, kind: &str) -> Vec<String> {
        let prefix = format!("{kind} \"");
        self.sections
            .iter()
            .filter_map(|s| {
                s.name
                    .strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix('"'))
                    .map(str::to_string)
            })
            .collect()
    }
}

pub fn remote_section(name: &str) -> String {
    format!("remote \"{name}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn reads_init_config() {
        let (_dir, repo) = test_repo();
        let config = Config::load(&repo).unwrap();
        assert_eq!(config.get("core", "bare"), Some("false"));
        assert_eq!(config.get("core", "missing"), None);
    }

    #[test]
    fn remote_sections_round_trip() {
        let (_dir, repo) = test_repo();
        let mut config = Config::load(&repo).unwrap();
        config.set(&remote_section("origin"), "url", "http://localhost:8000/repo.git");
        config.save(&repo).unwrap();

        let config = Config::load(&repo).unwrap();
        assert_eq!(
            config.get(&remote_section("origin"), "url"),
            Some("http://localhost:8000/repo.git")
        );
        assert_eq!(config.subsection_names("remote"), ["origin"]);
    }

    #[test]
    fn set_overwrites_and_remove_drops() {
        let (_dir, repo) = test_repo();
        let mut config = Config::load(&repo).unwrap();
        let section = remote_section("origin");
        config.set(&section, "url", "a");
        config.set(&section, "url", "b");
        assert_eq!(config.get(&section, "url"), Some("b"));
        assert!(config.remove_section(&section));
        assert!(!config.remove_section(&section));
        assert!(config.subsection_names("remote").is_empty());
    }
}
