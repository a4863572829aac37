mod agent;
mod config;
mod email;
mod feeds;
mod llm;
mod progress;
mod report;
mod store;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use agent::{Agent, RunOutcome};
use store::{JsonStore, Store};

#[derive(Parser)]
#[command(
    name = "topic-master",
    version,
    about = "Daily learning digest: one playlist lesson plus tech news, by email"
)]
struct Cli {
    #[arg(short, long, default_value = "~/.topic-master/config.toml")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily pipeline once (default)
    Run,
    /// Create the config template and seed the store
    Init,
    /// Show playlist progress, history and feed sources
    Status,
    /// List models available to the configured API key
    Models,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut cfg = config::load(&cli.config)?;
    cfg.apply_env(|key| std::env::var(key).ok());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cfg).await,
        Commands::Init => {
            let path = config::init_config_dir(&cli.config, &cfg.store.dir).await?;
            JsonStore::new(cfg.store.dir.clone())?.ensure_initialized()?;
            tracing::info!(
                "Initialized {} (store: {})",
                path.display(),
                cfg.store.dir.display()
            );
            Ok(())
        }
        Commands::Status => status(&cfg),
        Commands::Models => models(&cfg).await,
    }
}

async fn run(cfg: config::Config) -> Result<()> {
    cfg.validate()?;

    let store: Arc<dyn Store> = Arc::new(JsonStore::new(cfg.store.dir.clone())?);
    let llm = llm::create_client(&cfg.llm)?;
    let agent = Agent::new(
        store,
        feeds::FeedFetcher::new(&cfg.feeds)?,
        report::ReportGenerator::new(llm, &cfg.report),
        email::EmailDispatcher::new(Arc::new(email::SmtpMailer::new(cfg.mail.clone()))),
        cfg.mail.recipient.clone(),
        cfg.report.curriculum_name.clone(),
    );

    match agent.run().await? {
        RunOutcome::NothingToDo => tracing::info!("No data; exiting"),
        RunOutcome::Sent {
            subject,
            advanced_to,
        } => tracing::info!(?subject, ?advanced_to, "Workflow complete"),
    }
    Ok(())
}

fn status(cfg: &config::Config) -> Result<()> {
    let store = JsonStore::new(cfg.store.dir.clone())?;
    let active = store.active_config()?;
    println!("Store:    {}", store.dir().display());
    println!("Playlist: {}", active.playlist_id);
    println!("Status:   {}", active.status);
    println!("Index:    {}", active.current_video_index);

    let history = store.history()?;
    println!("\nHistory ({}):", history.len());
    for row in &history {
        println!(
            "  {}  {:?}  {} videos  {}",
            row.date_completed.format("%Y-%m-%d"),
            row.status,
            row.total_videos_watched,
            row.playlist_id
        );
    }

    let sources = store.feed_sources()?;
    println!("\nFeed sources ({}):", sources.len());
    for source in &sources {
        println!(
            "  {} <{}> [{}]",
            source.name.as_deref().unwrap_or("-"),
            source.url,
            source.kind
        );
    }
    Ok(())
}

async fn models(cfg: &config::Config) -> Result<()> {
    if cfg.llm.api_key.trim().is_empty() {
        anyhow::bail!("Missing AI API key. Set GEMINI_API_KEY or [llm] api_key.");
    }
    let llm = llm::create_client(&cfg.llm)?;
    let models = llm.list_models().await?;
    println!("Available models ({}):", cfg.llm.provider);
    for model in models {
        println!("- {model}");
    }
    Ok(())
}
