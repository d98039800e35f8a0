use anyhow::Result;
use ghaad::collection::item_id;
use ghaad::{Engine, MutationMode};

use super::{load_repo_config, parse_object, report_write};

pub async fn run(engine: &Engine, collection: &str, json: &str) -> Result<()> {
    let data = parse_object(json)?;
    let singular = engine.get_collection(collection)?.names().singular.clone();
    let mode = load_repo_config(engine).await?;

    let items = engine.add_to_collection(collection, data).await?;

    // Direct commits append the new item to the cache.
    match (mode, items.last().and_then(item_id)) {
        (MutationMode::DirectCommit, Some(id)) => println!("Created {singular} {id}."),
        _ => report_write(mode, &format!("Created {singular}")),
    }
    Ok(())
}
