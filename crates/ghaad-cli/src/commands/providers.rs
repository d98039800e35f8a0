use anyhow::Result;
use ghaad::Engine;

pub fn run(engine: &Engine) -> Result<()> {
    let selected = engine.get_adapter().map(|a| a.name().to_owned());

    for adapter in engine.get_adapters() {
        let marker = if selected.as_deref() == Some(adapter.name()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<8}  {}", adapter.name(), adapter.oauth().base_url);
    }

    Ok(())
}
