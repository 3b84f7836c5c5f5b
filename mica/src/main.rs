use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mica_core::{
    CheckoutOutcome, CommitOutcome, Error, Hash, Head, MergeOutcome, ObjectKind, PublishOutcome,
    Repository, build_from_worktree, hash_object,
};
use std::path::PathBuf;

/// Mica - a minimal content-addressed version-control engine
#[derive(Parser)]
#[command(name = "mica")]
#[command(about = "Minimal content-addressed version control", long_about = None)]
#[command(version)]
struct Cli {
    /// Working directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new repository
    Init,

    /// Stage files for the next commit
    Add {
        /// Paths to stage, relative to the repository root
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Record the staged files as a new commit
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Author name (defaults to the current user)
        #[arg(long)]
        author: Option<String>,
    },

    /// List branches, or create one
    Branch {
        /// Name of the branch to create (lists branches if omitted)
        name: Option<String>,
    },

    /// Switch to a branch and restore its latest commit
    Checkout {
        /// Branch to switch to
        branch: String,
    },

    /// Publish the current branch's local commit
    Push,

    /// Clear the staged file list
    Reset,

    /// Show the current branch and staged files
    Status,

    /// Show commit history
    Log {
        /// One line per commit
        #[arg(long)]
        oneline: bool,

        /// Limit the number of commits shown
        #[arg(short = 'n', long = "max-count")]
        max_count: Option<usize>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Ref to start from (defaults to HEAD)
        start: Option<String>,
    },

    /// Report the merge outcome for a target ref
    Merge {
        /// Branch, tag, hash, or prefix to merge
        target: String,
    },

    /// Compute (and optionally store) the blob hash of a file
    HashObject {
        /// Write the blob into the object store
        #[arg(short = 'w')]
        write: bool,

        /// File to hash
        path: PathBuf,
    },

    /// Print a stored object
    CatFile {
        /// Pretty-print the object payload
        #[arg(short = 'p', conflicts_with = "kind")]
        pretty: bool,

        /// Print the object kind
        #[arg(short = 't')]
        kind: bool,

        /// Hash or unique prefix of the object
        hash: String,
    },

    /// Build a tree from the index and print its hash
    WriteTree,

    /// Create a commit object from an existing tree
    CommitTree {
        /// Hash of the tree to commit
        tree: String,

        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Hash of the parent commit
        #[arg(short, long)]
        parent: Option<String>,

        /// Author name (defaults to the current user)
        #[arg(long)]
        author: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dir = cli
        .dir
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Init => cmd_init(&dir),
        Commands::Add { paths } => cmd_add(&dir, paths),
        Commands::Commit { message, author } => cmd_commit(&dir, &message, author),
        Commands::Branch { name } => cmd_branch(&dir, name),
        Commands::Checkout { branch } => cmd_checkout(&dir, &branch),
        Commands::Push => cmd_push(&dir),
        Commands::Reset => cmd_reset(&dir),
        Commands::Status => cmd_status(&dir),
        Commands::Log {
            oneline,
            max_count,
            json,
            start,
        } => cmd_log(&dir, oneline, max_count, json, start),
        Commands::Merge { target } => cmd_merge(&dir, &target),
        Commands::HashObject { write, path } => cmd_hash_object(&dir, write, &path),
        Commands::CatFile { pretty, kind, hash } => cmd_cat_file(&dir, pretty, kind, &hash),
        Commands::WriteTree => cmd_write_tree(&dir),
        Commands::CommitTree {
            tree,
            message,
            parent,
            author,
        } => cmd_commit_tree(&dir, &tree, &message, parent, author),
    }
}

fn open_repo(dir: &PathBuf) -> Result<Repository> {
    Repository::discover(dir)
        .with_context(|| format!("not a mica repository: {}", dir.display()))
}

fn default_author() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn cmd_init(dir: &PathBuf) -> Result<()> {
    let repo = Repository::init(dir)
        .with_context(|| format!("failed to initialize repository at {}", dir.display()))?;

    println!(
        "Initialized mica repository in {}",
        repo.meta().display()
    );
    Ok(())
}

fn cmd_add(dir: &PathBuf, paths: Vec<String>) -> Result<()> {
    let repo = open_repo(dir)?;

    let report = repo.stage(&paths).context("failed to stage paths")?;

    for path in &report.missing {
        eprintln!("warning: '{}' does not exist, not staged", path);
    }
    println!("{} file(s) staged", report.added.len());
    Ok(())
}

fn cmd_commit(dir: &PathBuf, message: &str, author: Option<String>) -> Result<()> {
    let repo = open_repo(dir)?;
    let author = author.unwrap_or_else(default_author);

    match repo
        .commit(message, &author, now())
        .context("failed to commit")?
    {
        CommitOutcome::Created {
            hash,
            branch,
            staged,
            skipped,
        } => {
            for skip in &skipped {
                eprintln!("warning: skipped '{}': {}", skip.path, skip.reason);
            }
            println!(
                "[{} {}] {} ({} file(s))",
                branch,
                hash.short(),
                message.lines().next().unwrap_or(""),
                staged - skipped.len()
            );
        }
        CommitOutcome::NothingStaged => println!("nothing staged, nothing committed"),
    }
    Ok(())
}

fn cmd_branch(dir: &PathBuf, name: Option<String>) -> Result<()> {
    let repo = open_repo(dir)?;

    match name {
        None => {
            let current = match repo.refs().head()? {
                Head::Branch(name) => Some(name),
                Head::Detached(_) => None,
            };

            for branch in repo.refs().list_branches()? {
                if Some(&branch) == current.as_ref() {
                    println!("* {}", branch);
                } else {
                    println!("  {}", branch);
                }
            }
        }
        Some(name) => {
            repo.create_branch(&name, now())
                .with_context(|| format!("failed to create branch '{}'", name))?;
            println!("Created branch '{}'", name);
        }
    }
    Ok(())
}

fn cmd_checkout(dir: &PathBuf, branch: &str) -> Result<()> {
    let repo = open_repo(dir)?;

    match repo
        .checkout(branch, now())
        .with_context(|| format!("failed to check out '{}'", branch))?
    {
        CheckoutOutcome::Restored {
            branch,
            commit,
            report,
        } => {
            for failure in &report.failures {
                eprintln!("warning: '{}': {}", failure.path, failure.reason);
            }
            for displaced in &report.displaced {
                eprintln!("quarantined: {}", displaced);
            }
            println!(
                "Switched to branch '{}' at {} ({} file(s) restored)",
                branch,
                commit.short(),
                report.restored
            );
        }
        CheckoutOutcome::EmptyBranch { branch } => {
            println!(
                "Switched to branch '{}' (no commits, working tree unchanged)",
                branch
            );
        }
    }
    Ok(())
}

fn cmd_push(dir: &PathBuf) -> Result<()> {
    let repo = open_repo(dir)?;

    match repo.publish(now()).context("failed to publish")? {
        PublishOutcome::Published { branch, hash } => {
            println!("Published '{}' at {}", branch, hash.short());
        }
        PublishOutcome::NothingToPublish => println!("no local commits to publish"),
    }
    Ok(())
}

fn cmd_reset(dir: &PathBuf) -> Result<()> {
    let repo = open_repo(dir)?;

    repo.index().clear().context("failed to clear the index")?;
    println!("index cleared");
    Ok(())
}

fn cmd_status(dir: &PathBuf) -> Result<()> {
    let repo = open_repo(dir)?;

    match repo.refs().head()? {
        Head::Branch(branch) => {
            println!("On branch {}", branch);

            let local = repo.refs().local(&branch)?;
            let published = repo.refs().published(&branch)?;
            match (local, published) {
                (None, _) => println!("No commits yet"),
                (Some(l), Some(p)) if l == p => println!("Published: up to date"),
                (Some(l), _) => println!("Published: behind local {}", l.short()),
            }
        }
        Head::Detached(hash) => println!("HEAD detached at {}", hash.short()),
    }

    let staged = repo.index().read()?;
    if staged.is_empty() {
        println!("Nothing staged");
    } else {
        println!("Staged files:");
        for path in staged {
            println!("  {}", path);
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct LogEntry {
    hash: Hash,
    author: String,
    date: i64,
    message: String,
}

fn cmd_log(
    dir: &PathBuf,
    oneline: bool,
    max_count: Option<usize>,
    json: bool,
    start: Option<String>,
) -> Result<()> {
    let repo = open_repo(dir)?;

    let token = start.unwrap_or_else(|| "HEAD".to_string());
    let head = repo
        .resolve(&token)
        .with_context(|| format!("could not resolve '{}'", token))?;

    if json {
        let mut entries = Vec::new();
        for step in repo.history(head, max_count) {
            let (hash, commit) = step?;
            entries.push(LogEntry {
                hash,
                author: commit.author.name,
                date: commit.author.when,
                message: commit.message,
            });
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for step in repo.history(head, max_count) {
        let (hash, commit) = step?;

        if oneline {
            println!("{} {}", hash.short(), commit.summary());
        } else {
            println!("commit {}", hash);
            println!("Author: {}", commit.author.name);
            println!("Date:   {}", format_date(commit.author.when));
            println!();
            for line in commit.message.lines() {
                println!("    {}", line);
            }
            println!();
        }
    }
    Ok(())
}

fn format_date(when: i64) -> String {
    chrono::DateTime::from_timestamp(when, 0)
        .map(|dt| dt.format("%a %b %d %H:%M:%S %Y").to_string())
        .unwrap_or_else(|| when.to_string())
}

fn cmd_merge(dir: &PathBuf, target: &str) -> Result<()> {
    let repo = open_repo(dir)?;

    match repo.merge(target) {
        Ok(MergeOutcome::AlreadyUpToDate { .. }) => {
            println!("Already up to date.");
            Ok(())
        }
        Ok(MergeOutcome::FastForward { target, .. }) => {
            println!("Fast-forward to {}", target.short());
            Ok(())
        }
        Ok(MergeOutcome::Conflict) => {
            anyhow::bail!("merge conflicts are not supported yet")
        }
        Err(Error::TargetNotResolvable { target, available }) => {
            eprintln!("error: '{}' is not a valid merge target", target);
            if available.is_empty() {
                eprintln!("no refs exist in this repository");
            } else {
                eprintln!("available refs:");
                for r in available {
                    eprintln!("  {}", r);
                }
            }
            anyhow::bail!("merge target '{}' not resolvable", target)
        }
        Err(e) => Err(e).context("merge failed"),
    }
}

fn cmd_hash_object(dir: &PathBuf, write: bool, path: &PathBuf) -> Result<()> {
    let content =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    let hash = if write {
        let repo = open_repo(dir)?;
        repo.store()
            .write(ObjectKind::Blob, &content)
            .context("failed to store blob")?
    } else {
        hash_object(ObjectKind::Blob, &content)
    };

    println!("{}", hash);
    Ok(())
}

fn cmd_cat_file(dir: &PathBuf, pretty: bool, kind: bool, token: &str) -> Result<()> {
    if pretty == kind {
        anyhow::bail!("exactly one of -p or -t is required");
    }

    let repo = open_repo(dir)?;
    let hash = repo
        .resolve(token)
        .with_context(|| format!("could not resolve '{}'", token))?;

    let (obj_kind, payload) = repo.store().read(&hash, None)?;

    if kind {
        println!("{}", obj_kind);
        return Ok(());
    }

    use std::io::Write;
    std::io::stdout().write_all(&payload)?;
    Ok(())
}

fn cmd_write_tree(dir: &PathBuf) -> Result<()> {
    let repo = open_repo(dir)?;

    let staged = repo.index().read()?;
    let report = build_from_worktree(&repo.store(), repo.workdir(), &staged)
        .context("failed to build tree")?;

    for skip in &report.skipped {
        eprintln!("warning: skipped '{}': {}", skip.path, skip.reason);
    }
    println!("{}", report.root);
    Ok(())
}

fn cmd_commit_tree(
    dir: &PathBuf,
    tree: &str,
    message: &str,
    parent: Option<String>,
    author: Option<String>,
) -> Result<()> {
    let repo = open_repo(dir)?;

    let tree_hash = repo
        .resolve(tree)
        .with_context(|| format!("could not resolve tree '{}'", tree))?;

    let mut parents = Vec::new();
    if let Some(parent) = parent {
        let parent_hash = repo
            .resolve(&parent)
            .with_context(|| format!("could not resolve parent '{}'", parent))?;
        parents.push(parent_hash);
    }

    let author = author.unwrap_or_else(default_author);
    let hash = mica_core::create_commit(
        &repo.store(),
        &tree_hash,
        &parents,
        mica_core::Signature::new(author, now()),
        message,
    )
    .context("failed to create commit")?;

    println!("{}", hash);
    Ok(())
}
