use anyhow::Result;
use ghaad::Engine;

use super::format;

pub async fn run(engine: &Engine, force: bool) -> Result<()> {
    let pull_requests = engine.fetch_pull_requests(force).await?;
    format::print_pull_request_table(&pull_requests);

    for pr in &pull_requests {
        if let Some(url) = &pr.url {
            println!("  #{}  {url}", pr.id);
        }
    }
    Ok(())
}
