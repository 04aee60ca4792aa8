pub mod classifier;
pub mod config;
pub mod error;
pub mod github;
pub mod llm;
pub mod models;

pub use config::Config;
pub use error::{ApiError, ClassificationParseError, ClassifierError};
pub use github::{IssueHandler, PRHandler};
pub use llm::{LlmClient, LlmConfig};
pub use models::*;
