use anyhow::{Result, bail};
use ghaad::Engine;

pub fn run(engine: &Engine, provider: &str, token: Option<String>) -> Result<()> {
    let adapter = engine.select_adapter(provider)?;

    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        bail!(
            "no token given; pass --token or set GHAAD_TOKEN.\nAuthorize the app at {}",
            adapter.oauth().authorize_url()
        );
    };

    engine.set_token(Some(token));
    println!("Logged in to {}.", adapter.name());

    if let Some(url) = &adapter.oauth().access_management_url {
        println!("Manage access at {url}");
    }
    Ok(())
}

pub fn logout(engine: &Engine) -> Result<()> {
    engine.logout();
    println!("Logged out.");
    Ok(())
}
