pub mod adapter;
pub mod response;

pub use adapter::{GitLabAdapter, GitLabAdapterConfig, PROPOSAL_BRANCH_PREFIX};
