use anyhow::Result;
use ghaad::Engine;

use super::{load_repo_config, parse_object, report_write};

pub async fn run(engine: &Engine, collection: &str, id: &str, json: &str) -> Result<()> {
    let data = parse_object(json)?;
    let singular = engine.get_collection(collection)?.names().singular.clone();
    let mode = load_repo_config(engine).await?;

    // Updates only apply to cached items.
    engine.fetch_collection_items(collection).await?;
    engine.update_in_collection(collection, id, data).await?;

    report_write(mode, &format!("Updated {singular} {id}"));
    Ok(())
}
