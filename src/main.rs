use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use mini_cms_client::api::{ApiClient, ApiError};
use mini_cms_client::config::{
    API_BASE_URL_ENV, ClientConfig, ConfigError, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_STORAGE_PATH, STORAGE_PATH_ENV, TIMEOUT_MS_ENV,
};
use mini_cms_client::news::{self, NewsDraft};
use mini_cms_client::router::{Router, RouterError};
use mini_cms_client::session::{Credentials, LoginError, SessionStore};
use mini_cms_client::storage::{FileStorage, StorageError};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("login failed: {0}")]
    Login(#[from] LoginError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "mini-cms", about = "Mini CMS session and API client")]
struct Cli {
    /// API origin; a trailing slash is stripped.
    #[arg(long, env = API_BASE_URL_ENV, default_value = DEFAULT_API_BASE_URL)]
    base_url: String,

    /// JSON file holding the saved session.
    #[arg(long, env = STORAGE_PATH_ENV, default_value = DEFAULT_STORAGE_PATH)]
    storage_path: PathBuf,

    /// Request timeout in milliseconds.
    #[arg(long, env = TIMEOUT_MS_ENV, default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and open the page the login was guarding.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "MINI_CMS_PASSWORD", hide_env_values = true)]
        password: String,
        /// Page to land on after signing in, e.g. `/admin`.
        #[arg(long)]
        redirect: Option<String>,
    },
    Logout,
    Whoami,
    /// Resolve a page through the navigation guards.
    Navigate { path: String },
    /// Print the absolute URL for a stored file path.
    FileUrl { path: String },
    News(NewsCommand),
}

#[derive(Args, Debug)]
struct NewsCommand {
    #[command(subcommand)]
    command: NewsSubcommand,
}

#[derive(Subcommand, Debug)]
enum NewsSubcommand {
    List,
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    Upload {
        news_id: i64,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let storage = FileStorage::open(&config.storage_path)?;
    let api = ApiClient::new(&config)?;
    let session = SessionStore::new(api, Arc::new(storage));

    match cli.command {
        Command::Login { username, password, redirect } => {
            run_login(&session, Credentials::new(username, password), redirect).await
        }
        Command::Logout => {
            session.logout();
            println!("signed out");
            Ok(())
        }
        Command::Whoami => {
            if session.is_authenticated() {
                println!("{}", session.username());
            } else {
                println!("not signed in");
            }
            Ok(())
        }
        Command::Navigate { path } => {
            let mut router = Router::new(session.clone());
            let nav = router.push(&path)?;
            println!("{}", nav.to.full_path());
            println!("{}", router.document_title());
            Ok(())
        }
        Command::FileUrl { path } => {
            println!("{}", session.api().resolve_file_url(&path));
            Ok(())
        }
        Command::News(news) => run_news(&session, news).await,
    }
}

/// Flags win over environment variables; clap resolves both.
fn build_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    Ok(ClientConfig::new(&cli.base_url)?
        .with_storage_path(cli.storage_path.clone())
        .with_timeout(Duration::from_millis(cli.timeout_ms)))
}

async fn run_login(session: &SessionStore, credentials: Credentials, redirect: Option<String>) -> Result<(), CliError> {
    let mut router = Router::new(session.clone());
    // Start where the user was headed so the guard records the return path.
    let start = router.push(redirect.as_deref().unwrap_or("/admin"))?;
    let target = start
        .to
        .redirect_target()
        .map_or_else(|| start.to.full_path(), str::to_owned);

    session.login(&credentials).await?;
    let nav = router.replace(&target)?;
    println!("signed in as {}", session.username());
    println!("{}", router.document_title());
    tracing::debug!(path = %nav.to.full_path(), "post-login navigation");
    Ok(())
}

async fn run_news(session: &SessionStore, news: NewsCommand) -> Result<(), CliError> {
    let api = session.api();
    match news.command {
        NewsSubcommand::List => print_json(&news::list_news(api).await?),
        NewsSubcommand::Create { title, content } => {
            print_json(&news::create_news(api, &NewsDraft { title, content }).await?)
        }
        NewsSubcommand::Upload { news_id, file } => {
            let bytes = std::fs::read(&file).map_err(|source| CliError::ReadFile { path: file.clone(), source })?;
            let filename = file
                .file_name()
                .map_or_else(|| "upload.bin".to_owned(), |n| n.to_string_lossy().into_owned());
            let uploaded = news::upload_file(api, news_id, &filename, bytes).await?;
            println!("{}", uploaded.download_url(api));
            print_json(&uploaded)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
