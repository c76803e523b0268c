use crate::error::GitError;
use anyhow::{Context, Result, bail};
use std::env;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Handle to one repository: the worktree root and its `.git` directory.
/// Every operation takes this explicitly; nothing looks at the process cwd
/// except [`Repository::discover`] and [`Repository::rel_path`].
pub struct Repository {
    root: PathBuf,
    git_dir: PathBuf,
}

impl Repository {
    /// Create `.git` under `path` and return a handle to the new repository.
    pub fn init(path: &Path) -> Result<Repository> {
        let git_dir = path.join(".git");
        if git_dir.exists() {
            bail!("{} already exists", git_dir.display());
        }
        create_dir_all(git_dir.join("objects")).context("creating objects directory")?;
        create_dir_all(git_dir.join("refs/heads")).context("creating refs directory")?;
        std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/master\n")
            .context("writing HEAD")?;
        std::fs::write(
            git_dir.join("config"),
            "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = false\n",
        )
        .context("writing config")?;
        let root = path
            .canonicalize()
            .with_context(|| format!("resolving {}", path.display()))?;
        let git_dir = root.join(".git");
        Ok(Repository { root, git_dir })
    }

    /// Find the repository by ascending from the current directory.
    pub fn discover() -> Result<Repository> {
        let cwd = env::current_dir().context("reading current directory")?;
        let mut dir = cwd.as_path();
        loop {
            let candidate = dir.join(".git");
            if candidate.is_dir() {
                return Ok(Repository {
                    root: dir.to_path_buf(),
                    git_dir: candidate,
                });
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(GitError::NotARepository.into()),
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.git_dir.join("objects")
    }

    pub fn index_path(&self) -> PathBuf {
        self.git_dir.join("index")
    }

    pub fn head_path(&self) -> PathBuf {
        self.git_dir.join("HEAD")
    }

    pub fn config_path(&self) -> PathBuf {
        self.git_dir.join("config")
    }

    pub fn heads_dir(&self) -> PathBuf {
        self.git_dir.join("refs/heads")
    }

    /// Absolute path of a repo-relative slash path.
    pub fn work_path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Normalize a CLI path argument to a repo-relative slash path. The file
    /// itself need not exist (deleted paths are legitimate arguments).
    /// Returns the empty string for the repository root.
    pub fn rel_path(&self, arg: &Path) -> Result<String> {
        let abs = if arg.is_absolute() {
            arg.to_path_buf()
        } else {
            env::current_dir()
                .context("reading current directory")?
                .join(arg)
        };
        let norm = normalize(&abs);
        let rel = norm
            .strip_prefix(&self.root)
            .map_err(|_| GitError::PathOutsideRepo(arg.to_path_buf()))?;
        let rel = rel
            .to_str()
            .with_context(|| format!("path {} is not valid UTF-8", arg.display()))?;
        Ok(rel.to_string())
    }
}

/// Lexical normalization: strips `.` and resolves `..` without touching the
/// filesystem, so arguments naming deleted files still normalize.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Write `bytes` to `path` via a temp file in the same directory, fsync, and
/// rename. Readers racing with this observe either image, never a torn file.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = NamedTempFile::new_in(dir).context("creating temp file")?;
    tmp.write_all(bytes).context("writing temp file")?;
    tmp.as_file().sync_all().context("syncing temp file")?;
    tmp.persist(path)
        .with_context(|| format!("renaming into {}", path.display()))?;
    if let Ok(dir_handle) = File::open(dir) {
        let _ = dir_handle.sync_all();
    }
    Ok(())
}
