mod commands;
mod config;
mod schema;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ghaad::{Adapter, AppConfig, Engine, EngineConfig, JsonFileStore, SessionStore};
use ghaad_github::{GitHubAdapter, GitHubAdapterConfig};
use ghaad_gitlab::{GitLabAdapter, GitLabAdapterConfig};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "ghaad")]
#[command(about = "Keep application data as JSON files in a GitHub or GitLab repository")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the hosting providers this build can talk to
    Providers,
    /// Select a provider and store an access token for it
    Login {
        /// Provider name (github, gitlab)
        #[arg(long)]
        provider: String,
        /// Access token; falls back to the GHAAD_TOKEN environment variable
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the stored token and repository
    Logout,
    /// List repositories reachable with the stored token
    Repos,
    /// Target a repository, given as owner/repo
    Use {
        /// Repository in owner/repo form
        repository: String,
    },
    /// Show the session and the repository status
    Status,
    /// Lay out config.json and the collection directories
    Init,
    /// Fetch the repository config and every collection
    Sync,
    /// List the items of a collection
    List {
        /// Collection id (talks, conferences)
        collection: String,
    },
    /// Print one item as JSON
    Show {
        collection: String,
        id: String,
    },
    /// Create an item from a JSON object
    Add {
        collection: String,
        /// Item fields as a JSON object; the id is assigned automatically
        #[arg(long)]
        json: String,
    },
    /// Replace an item with a JSON object
    Update {
        collection: String,
        id: String,
        #[arg(long)]
        json: String,
    },
    /// Delete an item
    Remove {
        collection: String,
        id: String,
    },
    /// Show the commits that touched an item
    History {
        collection: String,
        id: String,
    },
    /// List open pull requests
    Prs {
        /// Bypass the pull request cache
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ghaad=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_adapters(config: &CliConfig) -> Vec<Arc<dyn Adapter>> {
    let github = config.github.clone().unwrap_or_default();
    let gitlab = config.gitlab.clone().unwrap_or_default();

    vec![
        Arc::new(GitHubAdapter::new(GitHubAdapterConfig {
            client_id: github.client_id,
            redirect_uri: github.redirect_uri,
            api_base_url: github.api_base_url,
        })) as Arc<dyn Adapter>,
        Arc::new(GitLabAdapter::new(GitLabAdapterConfig {
            client_id: gitlab.client_id,
            redirect_uri: gitlab.redirect_uri,
            base_url: gitlab.base_url,
            api_base_url: gitlab.api_base_url,
        })) as Arc<dyn Adapter>,
    ]
}

fn build_engine(config: &CliConfig) -> Result<Engine> {
    let path = config::session_path().context("could not determine config directory")?;
    let store = Arc::new(JsonFileStore::new(path)) as Arc<dyn SessionStore>;

    let engine = Engine::new(EngineConfig {
        app: AppConfig::new(config.app_name.clone()).persisted(true),
        adapters: build_adapters(config),
        collections: schema::collections(),
        store: Some(store),
    })
    .context("failed to set up the engine")?;

    engine.set_unauthorized_handler(|| {
        warn!("the provider rejected the stored token; run `ghaad login` again");
    });

    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = config::load_config();
    let engine = build_engine(&config)?;

    match cli.command {
        Command::Providers => commands::providers::run(&engine),
        Command::Login { provider, token } => {
            let token = token.or_else(|| std::env::var("GHAAD_TOKEN").ok());
            commands::login::run(&engine, &provider, token)
        }
        Command::Logout => commands::login::logout(&engine),
        Command::Repos => commands::repos::run(&engine).await,
        Command::Use { repository } => commands::repos::select(&engine, &repository),
        Command::Status => commands::status::run(&engine).await,
        Command::Init => commands::init::run(&engine).await,
        Command::Sync => commands::sync::run(&engine).await,
        Command::List { collection } => commands::list::run(&engine, &collection).await,
        Command::Show { collection, id } => commands::show::run(&engine, &collection, &id).await,
        Command::Add { collection, json } => commands::add::run(&engine, &collection, &json).await,
        Command::Update {
            collection,
            id,
            json,
        } => commands::update::run(&engine, &collection, &id, &json).await,
        Command::Remove { collection, id } => {
            commands::remove::run(&engine, &collection, &id).await
        }
        Command::History { collection, id } => {
            commands::history::run(&engine, &collection, &id).await
        }
        Command::Prs { force } => commands::prs::run(&engine, force).await,
    }
}
