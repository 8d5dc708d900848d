use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use policychat_core::{Config, ConversationController, HttpChatEndpoint};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const DEFAULT_LOG_FILTER: &str = "policychat_core=info,policychat_tui=info";

#[derive(Parser)]
#[command(name = "policychat")]
#[command(version, about = "Chat with the insurance policy assistant")]
struct Cli {
    /// Backend base URL (overrides POLICYCHAT_URL and the config file)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Give up on a reply after this many seconds (default: wait indefinitely)
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Send a single question and print the reply
    Ask {
        /// Your question
        question: String,
    },
    /// Check that the backend is reachable
    Ping,
    /// Ask the backend to ingest its policy documents
    Ingest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    init_logging(matches!(command, Commands::Chat))?;

    let mut config = Config::load()
        .unwrap_or_else(|e| {
            tracing::warn!("failed to load config, using defaults: {e}");
            Config::new()
        })
        .with_env();
    if let Some(url) = cli.url {
        config.base_url = Some(url);
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout_secs = Some(secs);
    }

    let base_url = config.endpoint_url();
    let endpoint = HttpChatEndpoint::new(&base_url);
    tracing::info!(url = %base_url, timeout = ?config.request_timeout(), "using chat backend");

    match command {
        Commands::Chat => {
            let controller = ConversationController::new(Arc::new(endpoint))
                .with_timeout(config.request_timeout());
            run_tui(App::new(controller, base_url)).await?
        }
        Commands::Ask { question } => {
            let controller = ConversationController::new(Arc::new(endpoint))
                .with_timeout(config.request_timeout());
            ask(controller, &question).await?
        }
        Commands::Ping => match endpoint.health().await {
            Ok(message) => println!("{base_url}: {message}"),
            Err(e) => bail!("backend at {base_url} is not reachable ({e})"),
        },
        Commands::Ingest => match endpoint.ingest().await {
            Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
            Err(e) => bail!("ingest failed ({e})"),
        },
    }

    Ok(())
}

/// In the TUI, logs go to a file so they don't draw over the alternate screen
fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if to_file {
        let dir = Config::config_dir()?;
        std::fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("policychat.log"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn ask(mut controller: ConversationController, question: &str) -> Result<()> {
    controller.update_draft(question);
    if !controller.submit() {
        bail!("question is empty");
    }
    controller.reconcile_next().await;

    if let Some(reply) = controller.transcript().last() {
        println!("{}", reply.content);
    }
    Ok(())
}

async fn run_tui(mut app: App) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}
