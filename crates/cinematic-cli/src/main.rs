//! cinematic - media assistant bot

mod config;
mod console;
mod services;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cinematic_agent::{
    Bot, CatalogService, Dispatcher, RelevanceGate, ResolutionEvent, Resolver, ResolverConfig,
    Services, StatusRefresher, TokenBudget,
};
use cinematic_ai::{CompletionProvider, RetryConfig, providers::openai::OpenAIProvider};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use config::Config;
use console::{ConsoleInput, ConsolePlatform};
use services::{
    UtilityModel, Unconfigured,
    arr::{ArrClient, ArrKind},
    examples::ExampleCatalog,
    memory::JsonMemoryStore,
    review::ReviewLog,
    web::DuckDuckGo,
};

/// cinematic - chat with your media server
#[derive(Parser, Debug)]
#[command(name = "cinematic")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.config/cinematic/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model for conversations (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Name the console user chats as
    #[arg(short, long)]
    user: Option<String>,

    /// Do not refresh the bot status
    #[arg(long)]
    no_status: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "cinematic=debug" } else { "cinematic=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);

    if args.init_config {
        let path = Config::init(&config_path).context("creating config file")?;
        println!("Config file at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    if let Some(model) = args.model {
        config.openai.model = model;
    }

    let api_key = config
        .openai_api_key()
        .context("no OpenAI API key: set [openai] api_key or OPENAI_API_KEY")?;
    let mut provider = OpenAIProvider::new(api_key);
    if let Some(base_url) = &config.openai.base_url {
        provider = provider.with_base_url(base_url);
    }
    let provider: Arc<dyn CompletionProvider> = Arc::new(provider);
    let utility = UtilityModel::new(
        provider.clone(),
        config.openai.utility_model.clone(),
        config.openai.temperature,
    );

    let services = Services {
        movies: catalog(ArrKind::Movies, &config.radarr, &utility),
        series: catalog(ArrKind::Series, &config.sonarr, &utility),
        memory: Arc::new(JsonMemoryStore::new(config.memory_path(), utility.clone())),
        web: Arc::new(DuckDuckGo::new(utility.clone())),
    };
    let examples = Arc::new(ExampleCatalog::builtin(utility.clone())?);

    let resolver = Resolver::new(
        provider.clone(),
        Dispatcher::new(services),
        ResolverConfig {
            model: config.openai.model.clone(),
            temperature: config.openai.temperature,
            max_depth: config.bot.max_depth,
            budget: TokenBudget::new(config.bot.token_ceiling),
            retry: RetryConfig::default(),
        },
    );
    let events = resolver.subscribe();

    let user_name = args
        .user
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "console".to_string());
    let platform = Arc::new(ConsolePlatform::new(user_name));
    let gate = RelevanceGate::new(provider.clone(), config.openai.utility_model.clone());
    let bot = Arc::new(Bot::new(
        platform.clone(),
        gate,
        examples,
        resolver,
        Arc::new(ReviewLog::new(config.review_log_path())),
    ));

    let cancel = CancellationToken::new();
    tokio::spawn(log_events(events, cancel.clone()));
    if !args.no_status {
        let refresher = StatusRefresher::new(
            provider.clone(),
            platform.clone(),
            config.openai.utility_model.clone(),
            Duration::from_secs(config.bot.status_interval_secs),
        );
        tokio::spawn(refresher.run(cancel.clone()));
    }

    eprintln!(
        "{} ({}) ready. Type a message, >N to reply to #N, !flag N to flag #N, /quit to exit.",
        config.bot.name, config.openai.model
    );
    let result = run_console(&bot, &platform).await;
    cancel.cancel();
    result
}

fn catalog(
    kind: ArrKind,
    config: &config::ArrConfig,
    utility: &UtilityModel,
) -> Arc<dyn CatalogService> {
    if config.url.is_none() {
        tracing::warn!(service = kind.service_name(), "no url configured, lookups will fail");
        return Arc::new(Unconfigured {
            name: kind.service_name(),
        });
    }
    match ArrClient::new(kind, config, utility.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!(service = kind.service_name(), error = %e, "catalog unavailable");
            Arc::new(Unconfigured {
                name: kind.service_name(),
            })
        }
    }
}

async fn run_console(bot: &Arc<Bot>, platform: &ConsolePlatform) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = Vec::new();

    while let Some(line) = lines.next_line().await? {
        match console::parse_line(&line) {
            ConsoleInput::Empty => continue,
            ConsoleInput::Quit => break,
            ConsoleInput::Flag(id) => {
                if let Err(e) = bot.handle_reaction(platform.flag(id)).await {
                    eprintln!("Error: {}", e);
                }
            }
            ConsoleInput::Message { text, reply_to } => {
                let message = platform.inbound(&text, reply_to);
                match bot.handle_message(message).await {
                    Ok(Some(handle)) => pending.push(handle),
                    Ok(None) => eprintln!("(ignored)"),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
        pending.retain(|h| !h.is_finished());
    }

    // let in-flight conversations finish before exiting
    for handle in pending {
        let _ = handle.await;
    }
    Ok(())
}

async fn log_events(
    mut events: tokio::sync::broadcast::Receiver<ResolutionEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => tracing::debug!(
                    id = %event.resolution_id(),
                    event = %serde_json::to_string(&event).unwrap_or_default(),
                    "resolution event"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event log lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
