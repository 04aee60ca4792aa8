use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::classifier;
use crate::error::{ApiError, ClassifierError};
use crate::llm::{LlmClient, LlmConfig};
use crate::models::{AgentMessage, Issue, Verdict};

use super::pagination::fetch_all;
use super::{DEFAULT_API_BASE, LIST_PARAMS};

/// Fetches a repository's issues and converts them to normalized records
pub struct IssueHandler {
    owner: String,
    repo: String,
    token: String,
    base_url: String,
    client: Client,
    llm: LlmClient,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    body: Option<String>,
    /// Present when the listing item is actually a pull request
    pull_request: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    body: Option<String>,
}

impl IssueHandler {
    pub fn new(owner: &str, repo: &str, token: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            base_url: DEFAULT_API_BASE.to_string(),
            client: Client::new(),
            llm: LlmClient::new(),
        }
    }

    /// Override the REST endpoint, e.g. for GitHub Enterprise or tests
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch all issues and convert them, comments included
    ///
    /// The issues listing also returns pull requests; those are skipped
    /// here and belong to `PRHandler`.
    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    pub async fn get_converted_issues(&self) -> Result<Vec<Issue>, ApiError> {
        let url = format!(
            "{}/repos/{}/{}/issues",
            self.base_url, self.owner, self.repo
        );
        let raw_items = fetch_all(&self.client, &url, &self.token, LIST_PARAMS).await?;

        let mut issues = Vec::new();
        for item in raw_items {
            let raw: RawIssue = serde_json::from_value(item).map_err(|e| ApiError::Schema {
                url: url.clone(),
                message: e.to_string(),
            })?;

            if raw.pull_request.is_some() {
                debug!(number = raw.number, "Skipping pull request in issues listing");
                continue;
            }

            let mut issue = Issue::new(
                self.owner.clone(),
                self.repo.clone(),
                raw.number,
                raw.title,
                raw.body.unwrap_or_default(),
            );
            issue.thread_comments = Some(
                fetch_comment_bodies(
                    &self.client,
                    &self.base_url,
                    &self.token,
                    &self.owner,
                    &self.repo,
                    raw.number,
                )
                .await?,
            );

            issues.push(issue);
        }

        info!(count = issues.len(), "Converted issues");
        Ok(issues)
    }

    /// Ask the language model whether the agent's work addressed the
    /// feedback on `issue`
    pub async fn guess_success(
        &self,
        issue: &Issue,
        history: &[AgentMessage],
        llm_config: &LlmConfig,
    ) -> Result<Verdict, ClassifierError> {
        classifier::guess_success(&self.llm, issue, history, llm_config).await
    }
}

/// Fetch every conversation-comment body for one issue or PR, in API order
///
/// Pull requests share this endpoint: their conversation comments live
/// under `issues/{number}/comments` too.
pub(crate) async fn fetch_comment_bodies(
    client: &Client,
    base_url: &str,
    token: &str,
    owner: &str,
    repo: &str,
    number: u64,
) -> Result<Vec<String>, ApiError> {
    let url = format!(
        "{}/repos/{}/{}/issues/{}/comments",
        base_url, owner, repo, number
    );
    let raw_items = fetch_all(client, &url, token, LIST_PARAMS).await?;

    let mut bodies = Vec::with_capacity(raw_items.len());
    for item in raw_items {
        let comment: RawComment = serde_json::from_value(item).map_err(|e| ApiError::Schema {
            url: url.clone(),
            message: e.to_string(),
        })?;
        bodies.push(comment.body.unwrap_or_default());
    }

    Ok(bodies)
}
