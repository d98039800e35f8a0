pub mod add;
pub mod format;
pub mod history;
pub mod init;
pub mod list;
pub mod login;
pub mod prs;
pub mod providers;
pub mod remove;
pub mod repos;
pub mod show;
pub mod status;
pub mod sync;
pub mod update;

use anyhow::{Context, Result, bail};
use ghaad::{Engine, EngineError, MutationMode};
use serde_json::Value;

/// Load `config.json` so writes go through the repository's mutation mode.
pub async fn load_repo_config(engine: &Engine) -> Result<MutationMode> {
    match engine.fetch_repo_config().await {
        Ok(config) => Ok(config.mutation_mode()),
        Err(EngineError::EmptyRepository) => {
            bail!("the repository is not initialized; run `ghaad init` first")
        }
        Err(e @ EngineError::InvalidRepoConfig(_)) => {
            Err(e).context("run `ghaad init` to rewrite config.json")
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse a `--json` argument into an object.
pub fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--json is not valid JSON")?;
    if !value.is_object() {
        bail!("--json must be a JSON object");
    }
    Ok(value)
}

pub fn report_write(mode: MutationMode, done: &str) {
    match mode {
        MutationMode::DirectCommit => println!("{done}."),
        MutationMode::PullRequest => {
            println!("Proposed as a pull request; run `ghaad prs` to review it.")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ghaad::test_support::InMemoryAdapter;
    use ghaad::{Adapter, AppConfig, EngineConfig, RepoStatus};
    use serde_json::json;

    use super::*;
    use crate::schema;

    const TALK: &str = r#"{
        "title": "Ownership",
        "description": "Borrowing explained",
        "outline": "1. Moves",
        "idealDurationMinutes": 30
    }"#;

    fn engine() -> (Engine, Arc<InMemoryAdapter>) {
        let memory = Arc::new(InMemoryAdapter::new("GitHub"));
        let engine = Engine::new(EngineConfig {
            app: AppConfig::new("CFP Tracker"),
            adapters: vec![memory.clone() as Arc<dyn Adapter>],
            collections: schema::collections(),
            store: None,
        })
        .unwrap();

        login::run(&engine, "github", Some("secret".into())).unwrap();
        repos::select(&engine, "octo/cfp").unwrap();
        (engine, memory)
    }

    #[test]
    fn parse_object_accepts_objects() {
        let value = parse_object(r#"{"title":"Ownership"}"#).unwrap();
        assert_eq!(value["title"], "Ownership");
    }

    #[test]
    fn parse_object_rejects_other_json() {
        assert!(parse_object("[1, 2]").is_err());
        assert!(parse_object("{ not json").is_err());
    }

    #[test]
    fn login_without_token_fails() {
        let (engine, _) = engine();
        assert!(login::run(&engine, "github", None).is_err());
        assert!(login::run(&engine, "bitbucket", Some("t".into())).is_err());
    }

    #[tokio::test]
    async fn init_lays_out_an_empty_repository() {
        let (engine, memory) = engine();

        init::run(&engine).await.unwrap();

        assert_eq!(engine.get_repo_status(), RepoStatus::Valid);
        let config: serde_json::Value =
            serde_json::from_str(&memory.file("config.json").unwrap()).unwrap();
        assert_eq!(config, json!({ "prBasedMutations": true }));
        assert!(memory.file("collections/talks/.gitkeep").is_some());
        assert!(memory.file("collections/conferences/.gitkeep").is_some());
    }

    #[tokio::test]
    async fn init_leaves_initialized_repository_alone() {
        let (engine, memory) = engine();
        memory.insert_file("config.json", r#"{"prBasedMutations":false}"#);

        init::run(&engine).await.unwrap();

        assert_eq!(memory.call_count("create_file"), 0);
        assert_eq!(memory.call_count("update_file"), 0);
    }

    #[tokio::test]
    async fn writes_require_an_initialized_repository() {
        let (engine, memory) = engine();

        let err = add::run(&engine, "talks", TALK).await.unwrap_err();
        assert!(err.to_string().contains("ghaad init"));
        assert_eq!(memory.call_count("create_file"), 0);
    }

    #[tokio::test]
    async fn add_update_remove_with_direct_commits() {
        let (engine, memory) = engine();
        memory.insert_file("config.json", r#"{"prBasedMutations":false}"#);

        add::run(&engine, "talks", TALK).await.unwrap();
        let items = engine.get_collection_items("talks").unwrap();
        assert_eq!(items.len(), 1);
        let id = items[0]["id"].as_str().unwrap().to_owned();
        let path = format!("collections/talks/{id}.json");
        assert!(memory.file(&path).is_some());

        let renamed = TALK.replace("Ownership", "Lifetimes");
        update::run(&engine, "talks", &id, &renamed).await.unwrap();
        assert!(memory.file(&path).unwrap().contains("Lifetimes"));

        remove::run(&engine, "talks", &id).await.unwrap();
        assert!(memory.file(&path).is_none());
    }

    #[tokio::test]
    async fn add_proposes_pull_request_by_default() {
        let (engine, memory) = engine();
        memory.insert_file("config.json", "{}");

        add::run(&engine, "talks", TALK).await.unwrap();

        assert_eq!(memory.call_count("create_pull_request"), 1);
        assert!(engine.get_collection_items("talks").unwrap().is_empty());
        assert_eq!(engine.fetch_pull_requests(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_invalid_records() {
        let (engine, memory) = engine();
        memory.insert_file("config.json", r#"{"prBasedMutations":false}"#);

        let result = add::run(&engine, "talks", r#"{"title":"Only a title"}"#).await;
        assert!(result.is_err());
        assert_eq!(memory.call_count("create_file"), 0);
    }

    #[tokio::test]
    async fn show_reports_missing_items() {
        let (engine, _) = engine();
        assert!(show::run(&engine, "talks", "talk_missing").await.is_err());
    }

    #[tokio::test]
    async fn unknown_collections_are_rejected() {
        let (engine, memory) = engine();
        assert!(list::run(&engine, "speakers").await.is_err());
        assert!(memory.calls().is_empty());
    }
}
