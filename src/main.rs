use anyhow::Result;
use clap::{Parser, Subcommand};
use prcycle::config::{AppConfig, RepoId};
use prcycle::fetcher;
use prcycle::github::GitHubClient;
use prcycle::report::{self, OutputFormat};
use prcycle::store::FileArtifactStore;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pull request cycle-time report for a GitHub repository
#[derive(Parser)]
#[command(name = "prcycle", version)]
struct Cli {
    /// Repository in owner/repo form (defaults to GITHUB_REPOSITORY)
    #[arg(long, global = true, value_name = "OWNER/REPO")]
    repo: Option<RepoId>,

    /// Directory holding fetched artifacts (defaults to ARTIFACT_DIR or ./json)
    #[arg(long, global = true, value_name = "DIR")]
    artifact_dir: Option<PathBuf>,

    /// Branch whose history counts as released (defaults to RELEASE_BRANCH or "release")
    #[arg(long, global = true, value_name = "BRANCH")]
    release_branch: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch pull requests, their artifacts and the release branch history
    Fetch,
    /// Fetch only the pull request list
    FetchPulls,
    /// Fetch the artifacts of a single pull request
    FetchCommits {
        #[arg(long)]
        number: u64,
    },
    /// Fetch only the release branch history
    FetchReleaseCommits,
    /// Print the cycle-time report from fetched artifacts
    Report {
        #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing (logging). Stdout carries the report, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prcycle=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env()?;
    if let Some(repo) = cli.repo {
        config.github_repository = Some(repo);
    }
    if let Some(dir) = cli.artifact_dir {
        config.artifact_dir = dir;
    }
    if let Some(branch) = cli.release_branch {
        config.release_branch = branch;
    }

    let store = FileArtifactStore::new(&config.artifact_dir);

    match cli.command {
        Command::Report { format } => {
            let rows = report::build_report(&store)?;
            report::write_report(&rows, format, std::io::stdout().lock())?;
        }
        Command::Fetch => {
            let client = github_client(&config)?;
            fetcher::fetch_all(&client, &config, &store).await?;
        }
        Command::FetchPulls => {
            let client = github_client(&config)?;
            fetcher::fetch_pulls(&client, &store).await?;
        }
        Command::FetchCommits { number } => {
            let client = github_client(&config)?;
            fetcher::fetch_pull_artifacts(&client, &store, number).await?;
        }
        Command::FetchReleaseCommits => {
            let client = github_client(&config)?;
            fetcher::fetch_release_commits(&client, &store, &config.release_branch).await?;
        }
    }

    Ok(())
}

fn github_client(config: &AppConfig) -> Result<GitHubClient> {
    GitHubClient::new(config, config.repository()?.clone())
}
