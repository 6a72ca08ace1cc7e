use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use forum_client::models::{ListingQuery, SearchQuery};
use forum_client::{ClientConfig, ForumClient};

/// Command-line access to the forum backend.
#[derive(Parser, Debug)]
#[command(name = "forum", about = "Query a community forum backend from the terminal")]
struct Args {
    /// Backend base URL (overrides FORUM_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Directory holding the persisted session (overrides FORUM_SESSION_DIR)
    #[arg(long)]
    session_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List categories with their subcategories
    Categories,
    /// List threads, optionally within one category
    Threads {
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one thread and its replies
    Thread { id: String },
    /// Full-text search
    Search { query: String },
    /// Browse marketplace listings
    Listings {
        #[arg(long)]
        search: Option<String>,
    },
    /// Sign in and persist the session
    Login { email: String, password: String },
    /// Sign out and clear the persisted session
    Logout,
    /// Show the signed-in user, confirming the session with the backend
    Whoami,
    /// List notifications
    Notifications {
        #[arg(long)]
        unread: bool,
    },
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is only picked up in debug builds
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env();
    if let Some(url) = args.api_url {
        config = ClientConfig { base_url: url.trim_end_matches('/').to_string(), ..config };
    }
    if let Some(dir) = args.session_dir {
        config = config.with_session_dir(dir);
    }
    info!("Using backend {}", config.base_url);

    let client = ForumClient::new(&config).context("building forum client")?;

    match args.command {
        Command::Categories => print(&client.forum.category_tree().await?)?,
        Command::Threads { category } => print(&client.forum.threads(category.as_deref()).await?)?,
        Command::Thread { id } => {
            let thread = client.forum.thread(&id).await.with_context(|| format!("thread {id}"))?;
            let posts = client.forum.posts(&id).await?;
            print(&serde_json::json!({ "thread": thread, "posts": posts }))?;
        }
        Command::Search { query } => print(&client.forum.search(&SearchQuery::new(query)).await?)?,
        Command::Listings { search } => {
            let query = ListingQuery { search, ..Default::default() };
            print(&client.marketplace.listings(&query).await?)?;
        }
        Command::Login { email, password } => {
            let user = client.session.sign_in(&email, &password).await?;
            info!("Signed in as {}", user.display_name());
            print(&user)?;
        }
        Command::Logout => client.session.sign_out().await?,
        Command::Whoami => match client.session.current_user() {
            None => println!("not signed in"),
            Some(cached) => {
                client.session.settled().await;
                match client.session.current_user() {
                    Some(user) => print(&user)?,
                    None => println!("session expired (was {})", cached.display_name()),
                }
            }
        },
        Command::Notifications { unread } => print(&client.notifications.list(unread, Some(50)).await?)?,
    }
    Ok(())
}
