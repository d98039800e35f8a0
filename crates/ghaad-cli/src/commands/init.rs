use anyhow::Result;
use ghaad::{Engine, EngineError};

pub async fn run(engine: &Engine) -> Result<()> {
    match engine.fetch_repo_config().await {
        Ok(_) => {
            println!("The repository is already initialized.");
            return Ok(());
        }
        Err(EngineError::EmptyRepository | EngineError::InvalidRepoConfig(_)) => {}
        Err(e) => return Err(e.into()),
    }

    engine.initialize().await?;

    let collections: Vec<&str> = engine
        .get_collections()
        .iter()
        .map(|c| c.names().path.as_str())
        .collect();
    println!(
        "Initialized config.json and collections: {}.",
        collections.join(", ")
    );
    Ok(())
}
