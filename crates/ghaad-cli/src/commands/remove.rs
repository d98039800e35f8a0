use anyhow::Result;
use ghaad::Engine;

use super::{load_repo_config, report_write};

pub async fn run(engine: &Engine, collection: &str, id: &str) -> Result<()> {
    let singular = engine.get_collection(collection)?.names().singular.clone();
    let mode = load_repo_config(engine).await?;

    engine.remove_from_collection(collection, id).await?;

    report_write(mode, &format!("Removed {singular} {id}"));
    Ok(())
}
