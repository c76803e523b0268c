use crate::object_read::ObjectKind;
use crate::repo::Repository;
use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod add;
mod branch;
mod cat_file;
mod checkout;
mod commit;
mod config;
mod diff;
mod error;
mod hash_object;
mod ignores;
mod index;
mod log;
mod ls_files;
mod object_read;
mod object_write;
mod pack;
mod pkt;
mod push;
mod refs;
mod remote;
mod repo;
mod reset;
mod restore;
mod revs;
mod rm;
mod status;
mod tree;
mod write_tree;

#[derive(Parser, Debug)]
#[command(name = "pygit", about = "a small git-compatible version control tool")]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty repository
    Init {
        #[clap(default_value = ".")]
        path: PathBuf,
    },
    /// Hash a file as an object, optionally storing it
    HashObject {
        #[clap(short = 'w')]
        write: bool,
        #[clap(short = 't', default_value = "blob")]
        kind: String,
        file: PathBuf,
    },
    /// Show an object's content, type or size
    CatFile {
        #[clap(short = 'p')]
        pretty_print: bool,
        #[clap(short = 't', conflicts_with = "pretty_print")]
        show_type: bool,
        #[clap(short = 's', conflicts_with_all = ["pretty_print", "show_type"])]
        show_size: bool,
        object: String,
    },
    /// Stage files
    Add {
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List staged paths
    LsFiles {
        #[clap(short = 's')]
        stage: bool,
    },
    /// Summarize staged, unstaged and untracked paths
    Status,
    /// Show unstaged changes as unified diffs
    Diff,
    /// Write the index out as tree objects
    WriteTree,
    /// Record the staged tree as a commit
    Commit {
        #[clap(short = 'm')]
        message: Option<String>,
        #[clap(long)]
        amend: bool,
    },
    /// Show the commit chain from HEAD
    Log {
        #[clap(long)]
        oneline: bool,
        #[clap(short = 'n')]
        count: Option<usize>,
    },
    /// Resolve a revision to an object id
    RevParse { rev: String },
    /// List branches or create one at HEAD
    Branch { name: Option<String> },
    /// Switch to a branch or revision
    Checkout { target: String },
    /// Remove tracked files from the index and the working tree
    Rm {
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Unstage paths, resetting their index entries to HEAD
    Restore {
        #[clap(long, required = true)]
        staged: bool,
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Move HEAD, optionally rebuilding the index
    Reset {
        #[clap(long, conflicts_with = "mixed")]
        soft: bool,
        #[clap(long)]
        mixed: bool,
        rev: String,
    },
    /// Manage remote repositories
    Remote {
        #[command(subcommand)]
        action: Option<RemoteAction>,
    },
    /// Send a branch to a remote over smart HTTP
    Push {
        remote: Option<String>,
        branch: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum RemoteAction {
    List {
        #[clap(short = 'v')]
        verbose: bool,
    },
    Add {
        name: String,
        url: String,
    },
    GetUrl {
        name: String,
    },
    Remove {
        name: String,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Init { path } => {
            let repo = Repository::init(&path)?;
            println!(
                "Initialized empty Git repository in {}",
                repo.git_dir().display()
            );
            return Ok(());
        }
        command => {
            let repo = Repository::discover()?;
            dispatch(&repo, command)?;
        }
    }
    Ok(())
}

fn dispatch(repo: &Repository, command: Command) -> Result<()> {
    match command {
        Command::Init { .. } => unreachable!("handled before discovery"),
        Command::HashObject { write, kind, file } => {
            let kind = ObjectKind::from_str(&kind)?;
            let hash = hash_object::git_hash_object(repo, kind, &file, write)?;
            println!("{}", hex::encode(hash));
        }
        Command::CatFile {
            pretty_print,
            show_type,
            show_size,
            object,
        } => {
            let mode = match (pretty_print, show_type, show_size) {
                (true, _, _) => cat_file::CatMode::Pretty,
                (_, true, _) => cat_file::CatMode::Type,
                (_, _, true) => cat_file::CatMode::Size,
                _ => bail!("one of -p, -t or -s is required"),
            };
            cat_file::git_cat_file(repo, mode, &object)?;
        }
        Command::Add { paths } => {
            let paths = rel_paths(repo, &paths)?;
            add::git_add(repo, &paths)?;
        }
        Command::LsFiles { stage } => ls_files::git_ls_files(repo, stage)?,
        Command::Status => status::git_status(repo)?,
        Command::Diff => diff::git_diff(repo, &mut std::io::stdout().lock())?,
        Command::WriteTree => {
            let hash = write_tree::git_write_tree(repo)?;
            println!("{}", hex::encode(hash));
        }
        Command::Commit { message, amend } => {
            commit::git_commit(repo, message.as_deref(), amend)?;
        }
        Command::Log { oneline, count } => log::git_log(repo, oneline, count)?,
        Command::RevParse { rev } => revs::git_rev_parse(repo, &rev)?,
        Command::Branch { name } => branch::git_branch(repo, name.as_deref())?,
        Command::Checkout { target } => checkout::git_checkout(repo, &target)?,
        Command::Rm { paths } => {
            let paths = rel_paths(repo, &paths)?;
            rm::git_rm(repo, &paths)?;
        }
        Command::Restore { staged: _, paths } => {
            let paths = rel_paths(repo, &paths)?;
            restore::git_restore_staged(repo, &paths)?;
        }
        Command::Reset { soft, mixed: _, rev } => {
            let mode = if soft {
                reset::ResetMode::Soft
            } else {
                reset::ResetMode::Mixed
            };
            reset::git_reset(repo, mode, &rev)?;
        }
        Command::Remote { action } => match action.unwrap_or(RemoteAction::List { verbose: false }) {
            RemoteAction::List { verbose } => remote::git_remote_list(repo, verbose)?,
            RemoteAction::Add { name, url } => remote::git_remote_add(repo, &name, &url)?,
            RemoteAction::GetUrl { name } => remote::git_remote_get_url(repo, &name)?,
            RemoteAction::Remove { name } => remote::git_remote_remove(repo, &name)?,
        },
        Command::Push { remote, branch } => {
            push::git_push(repo, remote.as_deref(), branch.as_deref())?;
        }
    }
    Ok(())
}

fn rel_paths(repo: &Repository, paths: &[PathBuf]) -> Result<Vec<String>> {
    paths.iter().map(|p| repo.rel_path(p)).collect()
}
