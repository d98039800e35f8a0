use anyhow::Result;
use ghaad::{Engine, EngineError};

pub async fn run(engine: &Engine) -> Result<()> {
    let Some(adapter) = engine.get_adapter() else {
        println!("No provider selected; run `ghaad login --provider <name>`.");
        return Ok(());
    };

    let token = if engine.get_token().is_some() {
        "stored"
    } else {
        "missing"
    };
    println!("Provider:   {}", adapter.name());
    println!("Token:      {token}");

    let (Some(owner), Some(repo)) = (engine.get_repo_owner(), engine.get_repo_name()) else {
        println!("Repository: none; run `ghaad use <owner>/<repo>`.");
        return Ok(());
    };
    println!("Repository: {owner}/{repo}");

    match engine.fetch_repo_config().await {
        Ok(_) | Err(EngineError::EmptyRepository | EngineError::InvalidRepoConfig(_)) => {}
        Err(e) => return Err(e.into()),
    }
    println!("Status:     {}", engine.get_repo_status());

    if let Some(config) = engine.get_repo_config() {
        let mode = if config.pr_based_mutations {
            "pull requests"
        } else {
            "direct commits"
        };
        println!("Changes:    {mode}");
    }
    Ok(())
}
