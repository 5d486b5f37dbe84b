#![deny(dead_code)]
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};

mod ui;
mod utils;

use parley::config::{self, Settings};
use parley::controller::Layout;
use parley::random::StdRandom;
use parley::scheduler::TokioScheduler;
use parley::source::{ConversationSource, DemoSource, JsonFileSource};
use parley::{ChatClient, ChatError};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "parley: terminal front end for the conversation engine.",
    long_about = "Runs the conversation engine against a JSON seed file or built-in demo data, \
    with a simulated peer that answers some of your messages."
)]
struct Args {
    /// JSON file with {"currentUser": ..., "conversations": [...]}
    #[arg(long, value_name = "PATH")]
    data: Option<PathBuf>,

    /// Settings file to use instead of the default config location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Single-pane layout: list and conversation take turns
    #[arg(long)]
    narrow: bool,

    /// Seed for the simulated peer, for reproducible sessions
    #[arg(long)]
    seed: Option<u64>,

    /// Write the loaded seed data to the --data path and exit
    #[arg(long, requires = "data")]
    export_demo: bool,
}

enum Command {
    List(String),
    Open(String),
    Back,
    Layout(Layout),
    Help,
    Quit,
    Send(String),
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    match head {
        "/list" => Command::List(rest.to_string()),
        "/open" => Command::Open(rest.to_string()),
        "/back" => Command::Back,
        "/narrow" => Command::Layout(Layout::Narrow),
        "/wide" => Command::Layout(Layout::Wide),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Send(line.to_string()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.config {
        config::set_settings_path_override(path.clone());
    }
    let mut settings = config::load_settings().unwrap_or_else(|e| {
        eprintln!("Warning: could not read settings ({}), using defaults", e);
        Settings::default()
    });
    if args.narrow {
        settings.layout = Layout::Narrow;
    }
    if args.data.is_some() {
        settings.data_path = args.data.clone();
    }

    let log_file = args.log_file.as_ref().and_then(|p| p.to_str());
    utils::setup_logging(log_file, settings.log_level_filter())?;
    info!("System information: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    if args.export_demo {
        let seed = DemoSource::new(chrono::Utc::now()).fetch()?;
        if let Some(path) = &settings.data_path {
            JsonFileSource::new(path).save(&seed)?;
            println!("Demo data written to {}", path.display());
        }
        return Ok(());
    }

    let seed = match &settings.data_path {
        Some(path) => JsonFileSource::new(path).fetch()?,
        None => DemoSource::new(chrono::Utc::now()).fetch()?,
    };

    let rng = match args.seed {
        Some(seed) => StdRandom::seeded(seed),
        None => StdRandom::from_entropy(),
    };
    let (scheduler, mut events) = TokioScheduler::new();
    let mut client = ChatClient::new(scheduler, rng, settings.simulator.clone(), settings.layout)
        .context("Failed to start chat client")?;

    // Listener only flags that a redraw is needed; rendering happens in the loop
    let dirty = Rc::new(Cell::new(true));
    let flag = dirty.clone();
    client.subscribe(move |_| flag.set(true));

    client
        .load(seed.conversations, seed.current_user)
        .context("Conversation data is invalid")?;

    println!("{}", ui::HELP);
    let mut filter = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if dirty.replace(false) {
            println!("\n{}", ui::render(&client, &filter));
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed, shutting down");
                    break;
                };
                match parse_command(&line) {
                    Command::List(text) => {
                        filter = text;
                        println!("\n{}", ui::render_list(&client, &filter));
                    }
                    Command::Open(target) => {
                        let id = match target.parse::<usize>() {
                            Ok(n) if n > 0 => client
                                .visible_conversations(&filter)
                                .get(n - 1)
                                .map(|c| c.id.clone())
                                .unwrap_or(target),
                            _ => target,
                        };
                        if let Err(e) = client.select_conversation(&id) {
                            println!("{}", e);
                        }
                    }
                    Command::Back => {
                        client.back();
                        dirty.set(true);
                    }
                    Command::Layout(layout) => {
                        client.set_layout(layout);
                        dirty.set(true);
                    }
                    Command::Help => println!("{}", ui::HELP),
                    Command::Quit => break,
                    Command::Send(text) => {
                        let target = client.store().selected_id().map(str::to_string);
                        let result = match target {
                            Some(id) => client.send_message(&id, &text).map(|_| ()),
                            None => Err(ChatError::NoActiveConversationError),
                        };
                        match result {
                            Ok(()) => debug!("Message queued"),
                            Err(ChatError::EmptyContentError) => {}
                            Err(e) => println!("{}", e),
                        }
                    }
                }
            }
            Some(event) = events.recv() => {
                if let Err(e) = client.handle_event(event) {
                    error!("Failed to apply simulator event: {}", e);
                }
            }
        }
    }

    if client.pending_events() > 0 {
        warn!("Exiting with {} simulator events still pending", client.pending_events());
    }
    Ok(())
}
