use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use reddit_client::RedditClient;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use subsnap_core::{AppConfig, ErrorReporter, SnapshotError};
use subsnap_engine::{partial_path, write_snapshot, Harvest, Harvester, PostSelector};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "subsnap=info,subsnap_engine=info,reddit_client=info";

#[derive(Parser)]
#[command(author, version, about = "Save Reddit posts and their comments as JSON snapshots")]
struct Cli {
    /// TOML configuration file (defaults to ./subsnap.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subreddit to read from
    #[arg(short = 'r', long, global = true, default_value = "selfhosted")]
    subreddit: String,

    /// Write collected posts to <output>.partial if the listing fails mid-run
    #[arg(long, global = true)]
    save_partial: bool,

    /// Output file (defaults to a name derived from the mode)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Every post of one author in the subreddit
    Author {
        /// Reddit username, without the u/ prefix
        username: String,
    },
    /// Posts from the last N days
    Recent {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Posts created between two dates, both inclusive (UTC)
    Range {
        #[arg(long, value_parser = parse_date)]
        start_date: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        end_date: NaiveDate,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Not a valid date: '{}'. Expected format: YYYY-MM-DD.", s))
}

fn build_selector(cli: &Cli, now: DateTime<Utc>) -> Result<PostSelector, SnapshotError> {
    match &cli.mode {
        Mode::Author { username } => Ok(PostSelector::by_author(username, &cli.subreddit)),
        Mode::Recent { days } => Ok(PostSelector::by_window(&cli.subreddit, *days, now)),
        Mode::Range {
            start_date,
            end_date,
        } => PostSelector::by_date_range(&cli.subreddit, *start_date, *end_date),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let reporter = ErrorReporter::new();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&reporter, &err);
            ExitCode::FAILURE
        }
    }
}

fn report_failure(reporter: &ErrorReporter, err: &anyhow::Error) {
    match err.downcast_ref::<SnapshotError>() {
        Some(snapshot_error) => reporter.report_error(snapshot_error),
        None => error!("{:#}", err),
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let now = Utc::now();
    let selector = build_selector(cli, now)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(selector.default_output_name()));

    let config = AppConfig::load(cli.config.as_deref()).map_err(SnapshotError::Config)?;
    let save_partial = cli.save_partial || config.harvest.save_partial;

    let client = RedditClient::new(config.reddit, &config.harvest).map_err(SnapshotError::Auth)?;
    client.authenticate().await.map_err(SnapshotError::Auth)?;

    info!(
        "Fetching r/{} into {}",
        selector.collection(),
        output.display()
    );

    let harvest = match Harvester::new(&client).harvest(&selector, now).await {
        Ok(harvest) => harvest,
        Err(interrupted) => {
            if save_partial {
                save_partial_snapshot(&interrupted.partial, &output);
            }
            return Err(interrupted.error.into());
        }
    };

    write_snapshot(&harvest.document, &output)?;
    report_summary(&harvest);

    let quota = client.get_rate_limit_status().await;
    debug!(
        "Request budget left: {}/{} tokens, server quota {:?}",
        quota.available_tokens, quota.max_tokens, quota.server_remaining
    );
    Ok(())
}

fn save_partial_snapshot(partial: &Harvest, output: &Path) {
    let path = partial_path(output);
    match write_snapshot(&partial.document, &path) {
        Ok(()) => warn!(
            "Saved {} posts collected before the failure to {}",
            partial.posts_seen,
            path.display()
        ),
        Err(e) => error!("Could not save partial snapshot: {}", e),
    }
}

fn report_summary(harvest: &Harvest) {
    if !harvest.comment_failures.is_empty() {
        warn!(
            "Comments could not be fetched for {} posts: {}",
            harvest.comment_failures.len(),
            harvest.comment_failures.join(", ")
        );
    }
    info!(
        "Finished fetching. Found {} posts and {} comments",
        harvest.posts_seen, harvest.comments_seen
    );
}
