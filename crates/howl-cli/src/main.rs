//! Howl CLI - chat with a locally downloaded language model
//!
//! Usage:
//!     howl [OPTIONS]
//!
//! Environment Variables:
//!     HOWL_MODEL_URL: Model artifact URL (default: Llama 3.2 3B Instruct, Q4_K_M GGUF)
//!     HOWL_MODEL_DIR: Directory the artifact is stored in
//!     HOWL_MODEL_FILE: File name of the stored artifact (default: model.gguf)
//!     HOWL_MAX_TOKENS: Maximum tokens per reply (default: 256)
//!     HOWL_CONTEXT_SIZE: Context window in tokens (default: 2048)
//!     HOWL_THREADS: Inference threads (default: all cores)
//!     HOWL_LOG: Log level when RUST_LOG is unset (default: warn)

mod logger;
mod view;

use anyhow::Result;
use clap::Parser;
use howl_chat::{
    ChatApp, ChatConfig, FetchConfig, GenerationConfig, LocalModelLoader, ModelFetcher,
    DEFAULT_MODEL_FILE, DEFAULT_MODEL_URL,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;

use view::ConsoleView;

/// Howl - chat with a local language model
#[derive(Parser, Debug)]
#[command(name = "howl")]
#[command(about = "Howl - chat with a locally downloaded language model")]
#[command(after_help = r#"Examples:
    # Download the default model and start chatting
    howl

    # Use a different GGUF artifact
    howl --model-url https://example.com/models/tiny.gguf

    # Reuse the artifact from a previous run
    howl --offline

Commands inside the chat:
    /clear    Clear the conversation
    /status   Show the model status
    quit      Exit (also: exit, q, Ctrl-D)
"#)]
struct Cli {
    /// Model artifact URL
    #[arg(long, env = "HOWL_MODEL_URL", default_value = DEFAULT_MODEL_URL)]
    model_url: String,

    /// Directory the artifact is stored in
    #[arg(long, env = "HOWL_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// File name of the stored artifact
    #[arg(long, env = "HOWL_MODEL_FILE", default_value = DEFAULT_MODEL_FILE)]
    model_file: String,

    /// Maximum tokens per reply
    #[arg(long, env = "HOWL_MAX_TOKENS", default_value = "256")]
    max_tokens: usize,

    /// Context window in tokens
    #[arg(long, env = "HOWL_CONTEXT_SIZE", default_value = "2048")]
    context_size: u32,

    /// Inference threads (default: all cores)
    #[arg(long, env = "HOWL_THREADS")]
    threads: Option<usize>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, env = "HOWL_LOG", default_value = "warn")]
    log_level: String,

    /// Skip the download and load the artifact already on disk
    #[arg(long)]
    offline: bool,

    /// Suppress the header
    #[arg(short = 'q', long)]
    quiet: bool,
}

impl Cli {
    fn chat_config(&self) -> ChatConfig {
        let mut fetch = FetchConfig::default().with_model_file(&self.model_file);
        fetch.model_url = self.model_url.clone();
        if let Some(dir) = &self.model_dir {
            fetch.model_dir = dir.clone();
        }

        let mut generation = GenerationConfig::default()
            .with_max_tokens(self.max_tokens)
            .with_context_size(self.context_size);
        if let Some(threads) = self.threads {
            generation = generation.with_threads(threads);
        }

        ChatConfig::new().with_fetch(fetch).with_generation(generation)
    }
}

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Clear,
    Status,
    Send(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("quit")
        || trimmed.eq_ignore_ascii_case("exit")
        || trimmed.eq_ignore_ascii_case("q")
    {
        Input::Quit
    } else if trimmed == "/clear" {
        Input::Clear
    } else if trimmed == "/status" {
        Input::Status
    } else {
        Input::Send(line.trim_end_matches(['\r', '\n']))
    }
}

/// Print application header
fn print_header(config: &ChatConfig, offline: bool) {
    println!("{}", "=".repeat(50));
    println!("Howl - local model chat");
    println!("{}", "=".repeat(50));
    if offline {
        println!("Model: {} (offline)", config.fetch.destination().display());
    } else {
        println!("Model URL: {}", config.fetch.model_url);
        println!("Stored at: {}", config.fetch.destination().display());
    }
    println!("Max Tokens: {}", config.generation.max_tokens);
    println!("Context: {}", config.generation.context_size);
    println!("{}", "=".repeat(50));
    println!("Type a message and press Enter. '/clear' clears, 'quit' exits.\n");
}

/// Read one line, replacing invalid UTF-8 instead of failing.
///
/// Partial input stays in `buf` when the future is dropped, so this can race
/// other branches in `select!`. Returns `None` at end of input.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    if reader.read_until(b'\n', buf).await? == 0 && buf.is_empty() {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(['\r', '\n'])
        .to_string();
    buf.clear();
    Ok(Some(line))
}

/// Run the chat loop until the user quits or stdin closes
async fn run_chat(mut app: ChatApp, mut events: howl_chat::EventReceiver) -> Result<()> {
    let mut view = ConsoleView::new();
    let mut stdout = io::stdout();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut pending = Vec::new();

    view.refresh(&app, &mut stdout)?;

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                app.apply(event);
            }
            line = next_line(&mut stdin, &mut pending) => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        println!("\nGoodbye!");
                        break;
                    }
                    Err(e) => {
                        warn!("Could not read input: {}", e);
                        println!("\nGoodbye!");
                        break;
                    }
                };
                match parse_input(&line) {
                    Input::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    Input::Clear => {
                        app.clear();
                        view.cleared(&mut stdout)?;
                    }
                    Input::Status => view.reprint_status(&app, &mut stdout)?,
                    Input::Send(text) => {
                        app.submit(text);
                    }
                }
            }
        }
        view.refresh(&app, &mut stdout)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    logger::init(&args.log_level)?;

    let config = args.chat_config();
    if !args.quiet {
        print_header(&config, args.offline);
    }

    let loader = Arc::new(LocalModelLoader::new());
    let destination = config.fetch.destination();
    let fetcher = ModelFetcher::new(config.fetch.clone());
    let (mut app, events) = ChatApp::new(config);

    // Setup failures only change the status line; chatting still works.
    let started = if args.offline {
        app.start_local_load(destination, loader)
    } else {
        fetcher.and_then(|fetcher| app.start_model_setup(fetcher, loader))
    };
    if let Err(e) = started {
        warn!("Model setup did not start: {}", e);
        // The view prints the app status; only report what it doesn't show.
        if app.status() != e.to_string() {
            println!("[status] {}", e);
        }
    }

    run_chat(app, events).await
}
