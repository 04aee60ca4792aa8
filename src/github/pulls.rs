use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::classifier;
use crate::error::{ApiError, ClassifierError};
use crate::llm::{LlmClient, LlmConfig};
use crate::models::{AgentMessage, Issue, Verdict};

use super::graphql::{self, fetch_pr_metadata};
use super::issues::fetch_comment_bodies;
use super::pagination::fetch_all;
use super::{DEFAULT_API_BASE, DEFAULT_GRAPHQL_URL, LIST_PARAMS};

/// Fetches a repository's pull requests and converts them to normalized
/// records, review metadata included
pub struct PRHandler {
    owner: String,
    repo: String,
    token: String,
    base_url: String,
    graphql_url: String,
    client: Client,
    llm: LlmClient,
}

#[derive(Debug, Deserialize)]
struct RawPull {
    number: u64,
    title: String,
    body: Option<String>,
    head: RawHead,
}

#[derive(Debug, Deserialize)]
struct RawHead {
    #[serde(rename = "ref")]
    branch: String,
}

impl PRHandler {
    pub fn new(owner: &str, repo: &str, token: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            base_url: DEFAULT_API_BASE.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            client: Client::new(),
            llm: LlmClient::new(),
        }
    }

    /// Override the REST endpoint, e.g. for GitHub Enterprise or tests
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Override the GraphQL endpoint
    pub fn with_graphql_url(mut self, graphql_url: &str) -> Self {
        self.graphql_url = graphql_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch all pull requests and convert them, comments and review
    /// metadata included
    ///
    /// Any metadata failure fails the whole call; there are no partial
    /// records.
    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    pub async fn get_converted_issues(&self) -> Result<Vec<Issue>, ApiError> {
        let url = format!("{}/repos/{}/{}/pulls", self.base_url, self.owner, self.repo);
        let raw_items = fetch_all(&self.client, &url, &self.token, LIST_PARAMS).await?;

        let mut issues = Vec::new();
        for item in raw_items {
            let raw: RawPull = serde_json::from_value(item).map_err(|e| ApiError::Schema {
                url: url.clone(),
                message: e.to_string(),
            })?;
            issues.push(self.convert(raw).await?);
        }

        info!(count = issues.len(), "Converted pull requests");
        Ok(issues)
    }

    async fn convert(&self, raw: RawPull) -> Result<Issue, ApiError> {
        let mut issue = Issue::new(
            self.owner.clone(),
            self.repo.clone(),
            raw.number,
            raw.title,
            raw.body.unwrap_or_default(),
        );
        issue.head_branch = Some(raw.head.branch);

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

        let metadata = fetch_pr_metadata(
            &self.client,
            &self.graphql_url,
            &self.token,
            &self.owner,
            &self.repo,
            raw.number,
        )
        .await?;

        debug!(
            number = issue.number,
            closing = metadata.closing_issues.len(),
            reviews = metadata.review_bodies.len(),
            threads = metadata.threads.len(),
            "Merged PR metadata"
        );

        issue.closing_issues = Some(metadata.closing_issues);

        // Flatten threads so review_comments[i] and thread_ids[i] always
        // describe the same thread.
        let mut review_comments = Vec::new();
        let mut thread_ids = Vec::new();
        for thread in metadata.threads {
            for comment in thread.comments {
                review_comments.push(comment);
                thread_ids.push(thread.id.clone());
            }
        }
        issue.review_comments = Some(review_comments);
        issue.thread_ids = Some(thread_ids);

        Ok(issue)
    }

    /// Post a reply inside one of this repository's review threads
    pub async fn reply_to_thread(&self, thread_id: &str, body: &str) -> Result<(), ApiError> {
        graphql::reply_to_thread(&self.client, &self.graphql_url, &self.token, thread_id, body)
            .await
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_listing(server: &MockServer, endpoint: &str, first_page: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(first_page))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    async fn mount_graphql(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn handler(server: &MockServer) -> PRHandler {
        PRHandler::new("test-owner", "test-repo", "test-token")
            .with_base_url(&server.uri())
            .with_graphql_url(&format!("{}/graphql", server.uri()))
    }

    #[tokio::test]
    async fn test_get_converted_issues_merges_comments_and_metadata() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            "/repos/test-owner/test-repo/pulls",
            json!([{
                "number": 1,
                "title": "Test PR",
                "body": "Test Body",
                "head": {"ref": "test-branch"}
            }]),
        )
        .await;
        mount_listing(
            &server,
            "/repos/test-owner/test-repo/issues/1/comments",
            json!([{"body": "First comment"}, {"body": "Second comment"}]),
        )
        .await;
        mount_graphql(
            &server,
            json!({
                "data": {
                    "repository": {
                        "pullRequest": {
                            "closingIssuesReferences": {"edges": []},
                            "reviews": {"nodes": []},
                            "reviewThreads": {"edges": []}
                        }
                    }
                }
            }),
        )
        .await;

        let issues = handler(&server).get_converted_issues().await.unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 1);
        assert_eq!(issues[0].title, "Test PR");
        assert_eq!(issues[0].body, "Test Body");
        assert_eq!(issues[0].head_branch, Some("test-branch".to_string()));
        assert_eq!(
            issues[0].thread_comments,
            Some(vec!["First comment".to_string(), "Second comment".to_string()])
        );
        assert_eq!(issues[0].closing_issues, Some(Vec::new()));
        assert_eq!(issues[0].review_comments, Some(Vec::new()));
        assert_eq!(issues[0].thread_ids, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_review_comments_stay_parallel_to_thread_ids() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            "/repos/test-owner/test-repo/pulls",
            json!([{
                "number": 2,
                "title": "Refactor",
                "body": "",
                "head": {"ref": "refactor"}
            }]),
        )
        .await;
        mount_listing(&server, "/repos/test-owner/test-repo/issues/2/comments", json!([])).await;
        mount_graphql(
            &server,
            json!({
                "data": {
                    "repository": {
                        "pullRequest": {
                            "closingIssuesReferences": {
                                "edges": [
                                    {"node": {"title": "Wrong name", "body": "Issue description"}}
                                ]
                            },
                            "reviews": {"nodes": [{"body": "Looks close"}]},
                            "reviewThreads": {
                                "edges": [
                                    {
                                        "node": {
                                            "id": "RT_1",
                                            "comments": {
                                                "nodes": [
                                                    {"body": "Rename this"},
                                                    {"body": "Still wrong"}
                                                ]
                                            }
                                        }
                                    },
                                    {
                                        "node": {
                                            "id": "RT_2",
                                            "comments": {"nodes": [{"body": "Add a test"}]}
                                        }
                                    }
                                ]
                            }
                        }
                    }
                }
            }),
        )
        .await;

        let issues = handler(&server).get_converted_issues().await.unwrap();

        assert_eq!(
            issues[0].closing_issues,
            Some(vec!["Wrong name\n\nIssue description".to_string()])
        );
        assert_eq!(
            issues[0].review_comments,
            Some(vec![
                "Rename this".to_string(),
                "Still wrong".to_string(),
                "Add a test".to_string()
            ])
        );
        assert_eq!(
            issues[0].thread_ids,
            Some(vec![
                "RT_1".to_string(),
                "RT_1".to_string(),
                "RT_2".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_metadata_failure_fails_the_whole_call() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            "/repos/test-owner/test-repo/pulls",
            json!([{
                "number": 3,
                "title": "Doomed",
                "body": "",
                "head": {"ref": "doomed"}
            }]),
        )
        .await;
        mount_listing(&server, "/repos/test-owner/test-repo/issues/3/comments", json!([])).await;
        mount_graphql(
            &server,
            json!({"data": null, "errors": [{"message": "something went wrong"}]}),
        )
        .await;

        let err = handler(&server).get_converted_issues().await.unwrap_err();

        assert!(matches!(err, ApiError::Graphql { .. }));
    }
}
