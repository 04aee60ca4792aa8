use thiserror::Error;

/// Errors surfaced while talking to GitHub REST, GitHub GraphQL, or the
/// completion endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint answered with a non-success status.
    #[error("request to {url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// The request failed before a usable response arrived.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// GraphQL answered 200 but reported query-level errors.
    #[error("GraphQL request to {url} failed: {message}")]
    Graphql { url: String, message: String },

    /// A response body did not match the shape conversion requires.
    #[error("unexpected response shape from {url}: {message}")]
    Schema { url: String, message: String },

    /// A response was missing a field the pipeline cannot proceed without.
    #[error("response from {url} is missing `{field}`")]
    MissingField { url: String, field: String },
}

/// The model's reply did not follow the required section format.
///
/// Carries the raw reply so the operator can see what the model actually
/// said instead of a silent false verdict.
#[derive(Debug, Error)]
#[error("could not parse classifier response ({reason}); raw response:\n{raw}")]
pub struct ClassificationParseError {
    pub reason: String,
    pub raw: String,
}

/// Failure modes of one classification call.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Fetching or completing failed at the network or protocol level.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The completion arrived but could not be parsed.
    #[error(transparent)]
    Parse(#[from] ClassificationParseError),
}
