use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docqa_core::{ChatSession, Config, HttpTransport};
use tracing::{info, warn};

mod app;
mod commands;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(version, about = "Ask questions about a PDF and watch the answer stream in")]
struct Cli {
    /// Document service URL (overrides DOCQA_API_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// PDF to send with each question
    #[arg(short, long, global = true)]
    attach: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and print the streamed answer
    Ask {
        /// Your question
        question: String,
    },
    /// Upload a document without asking anything
    Upload {
        /// File to upload
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring config: {}", e);
        Config::default()
    });

    if let Err(e) = logging::initialize(config.log_level.as_deref()) {
        eprintln!("Logging disabled: {:#}", e);
    }

    let base_url = config.resolve_base_url(cli.base_url.as_deref());
    let transport = match config.connect_timeout() {
        Some(timeout) => HttpTransport::with_connect_timeout(&base_url, timeout)?,
        None => HttpTransport::new(&base_url),
    };
    info!(base_url = %transport.base_url(), "starting docqa");

    let attach = cli.attach.or_else(|| config.default_attachment.clone());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_tui(transport, attach).await,
        Commands::Ask { question } => commands::ask(&transport, &question, attach.as_deref()).await,
        Commands::Upload { file } => commands::upload(&transport, &file).await,
    }
}

async fn run_tui(transport: HttpTransport, attach: Option<PathBuf>) -> Result<()> {
    tui::install_panic_hook();

    let mut events = EventHandler::new();
    let session = ChatSession::new().with_notifier(events.session_sender());
    let mut app = App::new(session, transport);

    if let Some(path) = attach {
        app.load_attachment(&path).await;
    }

    let mut terminal = tui::init()?;

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if app.session.is_in_flight() {
        warn!("quitting with an answer still streaming");
    }
    app.shutdown();
    tui::restore()?;

    result
}
