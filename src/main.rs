use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use changemap::config::Config;
use changemap::git::GitCli;
use changemap::mapper::{MapOutcome, Mapper};
use changemap::models::{CommitSha, RepoName, VcsType};
use changemap::pipeline::MappingPipeline;
use changemap::store::{DbHandle, MappingDb};

#[derive(Parser)]
#[command(name = "changemap")]
#[command(version, about = "Maps mirrored Perforce changelists to git commits")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "changemap.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background mapping pipeline until interrupted
    Serve,
    /// Run one mapping pass for a single repository, then exit
    Sync {
        /// Repository name as registered in the config file
        repo: String,
    },
    /// Show per-repository mapping progress
    Status,
    /// Resolve a changelist to a commit, or a commit to a changelist
    Resolve {
        repo: String,
        #[arg(long, conflicts_with = "commit")]
        changelist: Option<i64>,
        #[arg(long)]
        commit: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)?;

    match &cli.command {
        Commands::Serve => serve(&config).await,
        Commands::Sync { repo } => sync_once(&config, repo).await,
        Commands::Status => status(&config).await,
        Commands::Resolve {
            repo,
            changelist,
            commit,
        } => resolve(&config, repo, *changelist, commit.as_deref()).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "changemap=debug" } else { "changemap=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Open the database and register every configured repository in the
/// directory.
fn open_db(config: &Config) -> Result<DbHandle> {
    let db = MappingDb::new(&config.db_path)?;
    for entry in &config.repos {
        db.upsert_repo(&entry.name, entry.vcs, &config.mirror_dir(entry))
            .with_context(|| format!("registering repository {}", entry.name))?;
    }
    Ok(DbHandle::new(db))
}

fn build_mapper(config: &Config, db: &DbHandle) -> Arc<Mapper> {
    Arc::new(
        Mapper::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(GitCli::new()),
        )
        .with_chunk_size(config.chunk_size),
    )
}

async fn serve(config: &Config) -> Result<()> {
    let db = open_db(config)?;
    let mapper = build_mapper(config, &db);
    let pipeline = MappingPipeline::new(mapper);

    let token = CancellationToken::new();
    pipeline.start(token.clone());

    let perforce: Vec<RepoName> = config
        .repos
        .iter()
        .filter(|entry| entry.vcs == VcsType::Perforce)
        .map(|entry| entry.name.clone())
        .collect();
    info!(
        repos = perforce.len(),
        interval_secs = config.resync_interval_secs,
        "changelist mapping pipeline started"
    );

    // The first tick fires immediately, so every repository is enqueued at
    // startup; later ticks re-derive the job set from the directory.
    let mut tick =
        tokio::time::interval(Duration::from_secs(config.resync_interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                for name in &perforce {
                    pipeline.enqueue(name.clone());
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for shutdown signal")?;
                info!("shutting down");
                token.cancel();
                return Ok(());
            }
        }
    }
}

async fn sync_once(config: &Config, repo: &str) -> Result<()> {
    let db = open_db(config)?;
    let mapper = build_mapper(config, &db);

    let name = RepoName::from(repo);
    let outcome = mapper.map_repo(&name).await?;
    match outcome {
        MapOutcome::Skipped => println!("{}: not a perforce repository, nothing to do", name),
        MapOutcome::UpToDate => println!("{}: already mapped up to HEAD", name),
        MapOutcome::Mapped { commits } => println!("{}: mapped {} new commits", name, commits),
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let db = open_db(config)?;
    let rows = db
        .call(|db| {
            let mut rows = Vec::new();
            for repo in db.list_repos()? {
                let latest = db.latest_mapped_commit(repo.id)?;
                let count = db.mapping_count(repo.id)?;
                rows.push((repo, latest, count));
            }
            Ok(rows)
        })
        .await?;

    if rows.is_empty() {
        println!("No repositories registered");
        return Ok(());
    }

    for (repo, latest, count) in rows {
        let latest = latest
            .map(|sha| sha.to_string())
            .unwrap_or_else(|| "(never imported)".to_string());
        println!(
            "{:<30} {:>10} rows  vcs={:<8} latest={}",
            repo.name.as_str(),
            count,
            repo.vcs.as_str(),
            latest
        );
    }
    Ok(())
}

async fn resolve(
    config: &Config,
    repo: &str,
    changelist: Option<i64>,
    commit: Option<&str>,
) -> Result<()> {
    let db = open_db(config)?;
    let name = RepoName::from(repo);

    let repo_record = db
        .call(move |db| {
            db.get_repo_by_name(&name)?
                .with_context(|| format!("unknown repository: {}", name))
        })
        .await?;

    match (changelist, commit) {
        (Some(changelist), None) => {
            let sha = db
                .call(move |db| db.commit_for_changelist(repo_record.id, changelist))
                .await?;
            match sha {
                Some(sha) => println!("{}", sha),
                None => anyhow::bail!("changelist {} is not mapped", changelist),
            }
        }
        (None, Some(commit)) => {
            let sha = CommitSha::from(commit);
            let found = db
                .call(move |db| db.changelist_for_commit(repo_record.id, &sha))
                .await?;
            match found {
                Some(changelist) => println!("{}", changelist),
                None => anyhow::bail!("commit {} is not mapped", commit),
            }
        }
        _ => anyhow::bail!("pass exactly one of --changelist or --commit"),
    }
    Ok(())
}
