use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;

use super::USER_AGENT;

/// Query for the PR metadata the REST listing cannot provide
const PR_METADATA_QUERY: &str = r#"
query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $number) {
      closingIssuesReferences(first: 50) {
        edges {
          node {
            title
            body
          }
        }
      }
      reviews(first: 100) {
        nodes {
          body
        }
      }
      reviewThreads(first: 100) {
        edges {
          node {
            id
            comments(first: 100) {
              nodes {
                body
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// Mutation for replying inside an existing review thread
const THREAD_REPLY_MUTATION: &str = r#"
mutation($threadId: ID!, $body: String!) {
  addPullRequestReviewThreadReply(input: {pullRequestReviewThreadId: $threadId, body: $body}) {
    comment {
      id
    }
  }
}
"#;

/// PR metadata assembled from one GraphQL round trip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrMetadata {
    /// Title and body of each issue the PR claims to close
    pub closing_issues: Vec<String>,
    /// Top-level review bodies, in API order
    pub review_bodies: Vec<String>,
    /// Review threads with their comments, in API order
    pub threads: Vec<ReviewThread>,
}

/// One review thread and its comments in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewThread {
    pub id: String,
    pub comments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MetadataData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    pull_request: Option<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    closing_issues_references: EdgeList<ClosingIssueNode>,
    reviews: NodeList<ReviewNode>,
    review_threads: EdgeList<ThreadNode>,
}

#[derive(Debug, Deserialize)]
struct EdgeList<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct NodeList<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ClosingIssueNode {
    title: String,
    body: String,
}

impl ClosingIssueNode {
    fn into_text(self) -> String {
        if self.body.is_empty() {
            self.title
        } else {
            format!("{}\n\n{}", self.title, self.body)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewNode {
    body: String,
}

#[derive(Debug, Deserialize)]
struct ThreadNode {
    id: String,
    comments: NodeList<ThreadCommentNode>,
}

#[derive(Debug, Deserialize)]
struct ThreadCommentNode {
    body: String,
}

/// Run the metadata query for one PR
pub async fn fetch_pr_metadata(
    client: &Client,
    graphql_url: &str,
    token: &str,
    owner: &str,
    repo: &str,
    number: u64,
) -> Result<PrMetadata, ApiError> {
    let payload = json!({
        "query": PR_METADATA_QUERY,
        "variables": {"owner": owner, "repo": repo, "number": number},
    });

    let data: MetadataData = post_graphql(client, graphql_url, token, &payload).await?;

    let pull_request = data
        .repository
        .and_then(|repository| repository.pull_request)
        .ok_or_else(|| ApiError::MissingField {
            url: graphql_url.to_string(),
            field: "data.repository.pullRequest".to_string(),
        })?;

    let closing_issues = pull_request
        .closing_issues_references
        .edges
        .into_iter()
        .map(|edge| edge.node.into_text())
        .collect();

    let review_bodies = pull_request
        .reviews
        .nodes
        .into_iter()
        .map(|node| node.body)
        .collect();

    let threads = pull_request
        .review_threads
        .edges
        .into_iter()
        .map(|edge| ReviewThread {
            id: edge.node.id,
            comments: edge
                .node
                .comments
                .nodes
                .into_iter()
                .map(|comment| comment.body)
                .collect(),
        })
        .collect();

    Ok(PrMetadata {
        closing_issues,
        review_bodies,
        threads,
    })
}

/// Post a reply to a specific review thread
///
/// The REST API cannot reply inside a thread, so this goes through the
/// `addPullRequestReviewThreadReply` mutation.
pub async fn reply_to_thread(
    client: &Client,
    graphql_url: &str,
    token: &str,
    thread_id: &str,
    body: &str,
) -> Result<(), ApiError> {
    let payload = json!({
        "query": THREAD_REPLY_MUTATION,
        "variables": {"threadId": thread_id, "body": body},
    });

    let _: serde_json::Value = post_graphql(client, graphql_url, token, &payload).await?;
    debug!(thread_id, "Posted review thread reply");
    Ok(())
}

async fn post_graphql<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    token: &str,
    payload: &serde_json::Value,
) -> Result<T, ApiError> {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", token))
        .header("User-Agent", USER_AGENT)
        .json(payload)
        .send()
        .await
        .map_err(|e| ApiError::Transport {
            url: url.to_string(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let envelope: GraphqlEnvelope<T> =
        response.json().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            source: e,
        })?;

    if let Some(error) = envelope.errors.first() {
        return Err(ApiError::Graphql {
            url: url.to_string(),
            message: error.message.clone(),
        });
    }

    envelope.data.ok_or_else(|| ApiError::MissingField {
        url: url.to_string(),
        field: "data".to_string(),
    })
}
