pub mod adapter;
pub mod response;

pub use adapter::{GitHubAdapter, GitHubAdapterConfig, PROPOSAL_BRANCH_PREFIX};
