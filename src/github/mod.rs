pub mod graphql;
pub mod issues;
pub mod pagination;
pub mod pulls;

pub use issues::IssueHandler;
pub use pulls::PRHandler;

/// Default REST endpoint
pub(crate) const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default GraphQL endpoint
pub(crate) const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// User-Agent sent with every GitHub request
pub(crate) const USER_AGENT: &str = "issue-resolver/0.1";

/// Query parameters shared by every listing request
pub(crate) const LIST_PARAMS: &[(&str, &str)] = &[("per_page", "100")];
