use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use issue_resolver::{AgentMessage, Config, Issue, IssueHandler, PRHandler, Verdict};

#[derive(Parser)]
#[command(name = "issue-resolver")]
#[command(about = "GitHub issue/PR ingestion with LLM-based resolution checking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, default_value = ".issue-resolver/config.yml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a repository's issues or pull requests as normalized records
    Fetch {
        /// Repository (owner/repo)
        #[arg(long)]
        repo: String,

        /// Fetch pull requests instead of issues
        #[arg(long)]
        pulls: bool,

        /// Print full records as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Check whether an agent's recorded actions addressed the feedback
    /// on one issue or pull request
    Check {
        /// Repository (owner/repo)
        #[arg(long)]
        repo: String,

        /// Issue or PR number
        #[arg(long)]
        number: u64,

        /// Treat the number as a pull request
        #[arg(long)]
        pulls: bool,

        /// Path to a JSON file with the agent's messages
        #[arg(long)]
        history: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("issue_resolver=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Fetch { repo, pulls, json } => {
            run_fetch(&config, &repo, pulls, json).await?;
        }
        Commands::Check {
            repo,
            number,
            pulls,
            history,
        } => {
            run_check(&config, &repo, number, pulls, &history).await?;
        }
    }

    Ok(())
}

async fn run_fetch(config: &Config, repo: &str, pulls: bool, json: bool) -> Result<()> {
    let token = std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN not set")?;
    let records = fetch_records(config, repo, &token, pulls).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No open records found in {}.", repo);
        return Ok(());
    }

    for record in &records {
        print_record(record);
    }

    Ok(())
}

async fn run_check(
    config: &Config,
    repo: &str,
    number: u64,
    pulls: bool,
    history_path: &Path,
) -> Result<()> {
    let token = std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN not set")?;
    let api_key = std::env::var("LLM_API_KEY").context("LLM_API_KEY not set")?;

    let history = read_history(history_path)?;
    let llm_config = config.llm_config(&api_key);
    let (owner, name) = parse_repo(repo)?;

    let verdict = if pulls {
        let handler = PRHandler::new(owner, name, &token)
            .with_base_url(&config.github.api_base)
            .with_graphql_url(&config.github.graphql_url);
        let records = handler.get_converted_issues().await?;
        let record = find_record(&records, number, repo)?;
        handler.guess_success(record, &history, &llm_config).await?
    } else {
        let handler =
            IssueHandler::new(owner, name, &token).with_base_url(&config.github.api_base);
        let records = handler.get_converted_issues().await?;
        let record = find_record(&records, number, repo)?;
        handler.guess_success(record, &history, &llm_config).await?
    };

    print_verdict(number, &verdict);

    if !verdict.success {
        std::process::exit(1);
    }

    Ok(())
}

async fn fetch_records(
    config: &Config,
    repo: &str,
    token: &str,
    pulls: bool,
) -> Result<Vec<Issue>> {
    let (owner, name) = parse_repo(repo)?;

    let records = if pulls {
        PRHandler::new(owner, name, token)
            .with_base_url(&config.github.api_base)
            .with_graphql_url(&config.github.graphql_url)
            .get_converted_issues()
            .await?
    } else {
        IssueHandler::new(owner, name, token)
            .with_base_url(&config.github.api_base)
            .get_converted_issues()
            .await?
    };

    Ok(records)
}

/// Parse owner and repo from "owner/repo" format
fn parse_repo(repo: &str) -> Result<(&str, &str)> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => anyhow::bail!("Invalid repo format. Expected 'owner/repo', got: {}", repo),
    }
}

fn read_history(path: &Path) -> Result<Vec<AgentMessage>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history file: {}", path.display()))
}

fn find_record<'a>(records: &'a [Issue], number: u64, repo: &str) -> Result<&'a Issue> {
    records
        .iter()
        .find(|record| record.number == number)
        .with_context(|| format!("No open record found for #{} in {}", number, repo))
}

fn print_record(record: &Issue) {
    let thread_count = record.thread_comments.as_deref().map_or(0, |c| c.len());
    match &record.head_branch {
        Some(branch) => {
            let review_count = record.review_comments.as_deref().map_or(0, |c| c.len());
            println!(
                "#{} {} [{}] - {} thread comments, {} review comments",
                record.number, record.title, branch, thread_count, review_count
            );
        }
        None => {
            println!(
                "#{} {} - {} thread comments",
                record.number, record.title, thread_count
            );
        }
    }
}

fn print_verdict(number: u64, verdict: &Verdict) {
    println!(
        "Verdict for #{}: {}",
        number,
        if verdict.success { "success" } else { "failure" }
    );
    if let Some(items) = &verdict.per_item {
        for (index, addressed) in items.iter().enumerate() {
            println!(
                "  {}. {}",
                index + 1,
                if *addressed { "addressed" } else { "not addressed" }
            );
        }
    }
    println!();
    println!("{}", verdict.explanation);
}
