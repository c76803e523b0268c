use std::path::PathBuf;

/// Failure classes that commands need to tell apart. Everything else travels
/// as plain context on an [`anyhow::Error`].
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("not a git repository (or any of the parent directories)")]
    NotARepository,

    #[error("corrupt object {0}")]
    CorruptObject(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("corrupt ref: {0}")]
    CorruptRef(String),

    #[error("short object id {0} is ambiguous")]
    AmbiguousPrefix(String),

    #[error("object {0} not found")]
    ObjectNotFound(String),

    #[error("unknown revision or ref: {0}")]
    RefNotFound(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("local changes to '{0}' would be overwritten; commit or discard them first")]
    DirtyWorktree(String),

    #[error("path '{0}' is outside the repository")]
    PathOutsideRepo(PathBuf),

    #[error("protocol error: {0}")]
    Protocol(String),
}
