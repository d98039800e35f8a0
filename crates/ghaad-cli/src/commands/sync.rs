use anyhow::Result;
use ghaad::Engine;

pub async fn run(engine: &Engine) -> Result<()> {
    engine.sync().await?;

    for collection in engine.get_collections() {
        let count = engine.get_collection_items(collection.id())?.len();
        println!("{:<12} {count}", collection.names().plural);
    }
    Ok(())
}
