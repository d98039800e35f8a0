use anyhow::{Context, Result, bail};
use ghaad::Engine;

pub async fn run(engine: &Engine, collection: &str, id: &str) -> Result<()> {
    let singular = engine.get_collection(collection)?.names().singular.clone();

    let Some(item) = engine.fetch_collection_item(collection, id).await? else {
        bail!("{singular} {id} not found");
    };

    let json = serde_json::to_string_pretty(&item).context("failed to render item")?;
    println!("{json}");
    Ok(())
}
