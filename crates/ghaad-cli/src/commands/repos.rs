use anyhow::{Result, bail};
use ghaad::Engine;

use super::format;

pub async fn run(engine: &Engine) -> Result<()> {
    let repositories = engine.fetch_repositories().await?;
    format::print_repository_table(&repositories);
    Ok(())
}

pub fn select(engine: &Engine, repository: &str) -> Result<()> {
    let (owner, repo) = split_repository(repository)?;
    engine.set_repo_owner(Some(owner.to_owned()));
    engine.set_repo_name(Some(repo.to_owned()));
    println!("Using {owner}/{repo}.");
    Ok(())
}

/// Split on the last `/`, so GitLab subgroups stay in the owner.
fn split_repository(repository: &str) -> Result<(&str, &str)> {
    match repository.rsplit_once('/') {
        Some((owner, repo)) if !repo.is_empty() && owner.split('/').all(|s| !s.is_empty()) => {
            Ok((owner, repo))
        }
        _ => bail!("expected a repository as owner/repo, got `{repository}`"),
    }
}
