use serde::{Deserialize, Serialize};

/// Normalized record for a GitHub issue or pull request
///
/// Both ingesters produce this same shape; PR-only fields stay `None` for
/// plain issues. On the comment collections, `None` means the fetch never
/// ran, while `Some(vec![])` means the fetch ran and found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    /// Conversation comments in API order
    pub thread_comments: Option<Vec<String>>,
    /// Review thread comments, flattened thread by thread
    pub review_comments: Option<Vec<String>>,
    /// Thread id for each entry of `review_comments`, index-parallel
    pub thread_ids: Option<Vec<String>>,
    /// Title and body text of each issue the PR claims to close
    pub closing_issues: Option<Vec<String>>,
    /// Head branch name, populated for pull requests only
    pub head_branch: Option<String>,
}

impl Issue {
    /// Create a record with only the base fields populated
    pub fn new(owner: String, repo: String, number: u64, title: String, body: String) -> Self {
        Self {
            owner,
            repo,
            number,
            title,
            body,
            thread_comments: None,
            review_comments: None,
            thread_ids: None,
            closing_issues: None,
            head_branch: None,
        }
    }

    /// The feedback a classification call would consume, if any
    ///
    /// Thread comments outrank review comments. A fetched-but-empty
    /// collection does not count as feedback.
    pub fn feedback(&self) -> Option<&[String]> {
        match &self.thread_comments {
            Some(comments) if !comments.is_empty() => Some(comments),
            _ => match &self.review_comments {
                Some(comments) if !comments.is_empty() => Some(comments),
                _ => None,
            },
        }
    }
}

/// One entry of an agent's action history, reduced to its text content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub content: String,
}

impl AgentMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Outcome of one success classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// True only when every feedback item was judged addressed
    pub success: bool,
    /// Per-item verdicts in prompt order; `None` when there was no feedback
    pub per_item: Option<Vec<bool>>,
    pub explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_issue() -> Issue {
        Issue::new(
            "test-owner".to_string(),
            "test-repo".to_string(),
            1,
            "Test Issue".to_string(),
            "Test Body".to_string(),
        )
    }

    #[test]
    fn test_new_issue_has_no_fetched_collections() {
        let issue = base_issue();
        assert!(issue.thread_comments.is_none());
        assert!(issue.review_comments.is_none());
        assert!(issue.thread_ids.is_none());
        assert!(issue.closing_issues.is_none());
        assert!(issue.head_branch.is_none());
    }

    #[test]
    fn test_feedback_prefers_thread_comments() {
        let mut issue = base_issue();
        issue.thread_comments = Some(vec!["thread".to_string()]);
        issue.review_comments = Some(vec!["review".to_string()]);
        assert_eq!(issue.feedback(), Some(&["thread".to_string()][..]));
    }

    #[test]
    fn test_feedback_falls_back_to_review_comments() {
        let mut issue = base_issue();
        issue.thread_comments = Some(Vec::new());
        issue.review_comments = Some(vec!["review".to_string()]);
        assert_eq!(issue.feedback(), Some(&["review".to_string()][..]));

        issue.thread_comments = None;
        assert_eq!(issue.feedback(), Some(&["review".to_string()][..]));
    }

    #[test]
    fn test_feedback_absent_when_nothing_fetched_or_empty() {
        let mut issue = base_issue();
        assert!(issue.feedback().is_none());

        issue.thread_comments = Some(Vec::new());
        issue.review_comments = Some(Vec::new());
        assert!(issue.feedback().is_none());
    }
}
