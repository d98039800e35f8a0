use anyhow::Result;
use ghaad::Engine;

use super::format;

pub async fn run(engine: &Engine, collection: &str, id: &str) -> Result<()> {
    let revisions = engine.fetch_item_history(collection, id).await?;
    format::print_history(&revisions);
    Ok(())
}
