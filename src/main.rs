use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use message_mind::config::Settings;
use message_mind::consts::REPO;
use message_mind::driver::Driver;
use message_mind::engine::classify::ClassifyEngine;
use message_mind::item::NewItem;
use message_mind::notify::telegram::TelegramNotifier;
use message_mind::notify::{LogNotifier, Notifier};
use message_mind::oracle::openai::OpenAiOracle;
use message_mind::store::sqlite::SqliteStore;
use message_mind::store::{Inserted, Store};
use message_mind::telemetry::init_tracing;
use message_mind::tools::ToolRegistry;
use message_mind::tools::web_text::HtmlToTextTool;
use message_mind::tools::youtube::YoutubeTool;

#[derive(Parser)]
#[command(
    name = "message-mind",
    version,
    about = "Sorts saved messages into categories."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Command {
    /// Save a message for the next sweep
    Add {
        /// Message text (a link or a note)
        details: String,
        /// Link preview title
        #[arg(long)]
        title: Option<String>,
        /// Link preview description
        #[arg(long)]
        description: Option<String>,
        /// The message carries a photo, video or document
        #[arg(long, default_value_t = false)]
        media: bool,
    },
    /// Classify every pending message
    Run,
    /// List the categories assigned so far
    Categories,
    /// Show a stored message
    Show {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    cli.settings.validate()?;

    let store = Arc::new(open_store(&cli.settings)?);

    match cli.command {
        Command::Add {
            details,
            title,
            description,
            media,
        } => handle_add(store.as_ref(), details, title, description, media).await,
        Command::Run => handle_run(&cli.settings, store).await,
        Command::Categories => handle_categories(store.as_ref()).await,
        Command::Show { id } => handle_show(store.as_ref(), id).await,
    }
}

fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
    let path = settings.db_path()?;
    if path != ":memory:"
        && let Some(parent) = Path::new(&path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SqliteStore::open(&path)
}

async fn handle_add(
    store: &dyn Store,
    details: String,
    title: Option<String>,
    description: Option<String>,
    media: bool,
) -> anyhow::Result<()> {
    if media {
        bail!("messages with media are not supported; send the text or a link instead");
    }
    if details.trim().is_empty() {
        bail!("message is empty");
    }

    let mut item = NewItem::new(details);
    if let Some(title) = title {
        item = item.with_title(title);
    }
    if let Some(description) = description {
        item = item.with_description(description);
    }

    match store.insert(item).await? {
        Inserted::New(id) => println!("✓ saved as #{}", id),
        Inserted::Duplicate => println!("already saved, skipping"),
    }
    Ok(())
}

async fn handle_run(settings: &Settings, store: Arc<SqliteStore>) -> anyhow::Result<()> {
    let api_key = settings
        .openai_api_key
        .clone()
        .filter(|key| !key.is_empty())
        .context("OPENAI_API_KEY is not set")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("message-mind/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let tools = Arc::new(ToolRegistry::new());
    tools
        .register(Arc::new(HtmlToTextTool::new(
            client.clone(),
            settings.text_budget,
        )))
        .await;
    tools
        .register(Arc::new(YoutubeTool::new(
            client.clone(),
            settings.youtube_api_key.clone(),
        )))
        .await;

    let mut oracle = OpenAiOracle::new(client.clone(), api_key, settings.model.clone());
    if let Some(base_url) = &settings.openai_base_url {
        oracle = oracle.with_base_url(base_url.as_str());
    }
    let engine = ClassifyEngine::new(Arc::new(oracle), tools, settings.engine_config());

    let notifier: Arc<dyn Notifier> = match settings.telegram() {
        Some((token, chat_id)) => Arc::new(TelegramNotifier::new(client.clone(), token, chat_id)),
        None => Arc::new(LogNotifier),
    };

    info!(
        model = engine.model(),
        max_turns = settings.max_turns,
        concurrency = settings.concurrency,
        repo = REPO,
        "starting sweep"
    );

    let driver = Driver::new(Arc::new(engine), store, notifier)
        .with_concurrency(settings.concurrency)
        .with_notify_timeout(settings.notify_timeout());

    // Ctrl+C abandons the sweep. Items not yet written stay pending.
    tokio::select! {
        report = driver.sweep() => {
            println!("{}", report?);
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\ninterrupted");
        }
    }
    Ok(())
}

async fn handle_categories(store: &dyn Store) -> anyhow::Result<()> {
    let categories = store.fetch_categories().await?;
    if categories.is_empty() {
        println!("(none yet)");
    }
    for category in categories.iter() {
        println!("{}", category);
    }
    Ok(())
}

async fn handle_show(store: &dyn Store, id: i64) -> anyhow::Result<()> {
    let Some(item) = store.get(id).await? else {
        bail!("no item with id {}", id);
    };
    println!("{}", serde_json::to_string_pretty(&item.to_prompt_json())?);
    Ok(())
}
