use anyhow::Result;
use ghaad::Engine;

use super::format;

pub async fn run(engine: &Engine, collection: &str) -> Result<()> {
    let plural = engine.get_collection(collection)?.names().plural.clone();
    let items = engine.fetch_collection_items(collection).await?;

    format::print_item_table(&plural, &items);
    Ok(())
}
