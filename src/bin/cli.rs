//! Console front end for SCAR.

use clap::{Parser, Subcommand};
use scar::storage::FileStore;
use scar::stt::{LineRecognizer, RESTART_LINE};
use scar::tts::ConsoleSynthesizer;
use scar::{Assistant, RuntimeEvent, ScarConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// SCAR: wake-word voice assistant.
#[derive(Parser)]
#[command(name = "scar", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not sync with the remote authority.
    #[arg(long)]
    offline: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Converse: each stdin line is heard as one utterance.
    Chat,

    /// Manage goals.
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Store a memory note.
    Remember {
        /// Note text.
        note: Vec<String>,
    },

    /// Show recent utterances.
    History {
        /// How many entries to show.
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}

#[derive(Subcommand)]
enum GoalAction {
    /// Add a goal.
    Add {
        /// Goal text.
        text: Vec<String>,
    },
    /// Flip a goal between done and not done.
    Toggle {
        /// Zero-based position in the list.
        index: usize,
    },
    /// List goals.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scar=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config {
        Some(ref path) => ScarConfig::from_file(path)?,
        None => {
            let default_path = ScarConfig::default_config_path();
            if default_path.exists() {
                ScarConfig::from_file(&default_path)?
            } else {
                ScarConfig::default()
            }
        }
    };
    if cli.offline {
        config.sync.online = false;
    }

    let assistant = Assistant::new(
        &config,
        Box::new(FileStore::new(&config.storage.dir)),
        scar::responder::from_config(&config.responder)?,
        Arc::new(ConsoleSynthesizer),
    )?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(assistant, &config).await,
        Command::Goal { action } => run_goal(assistant, action).await,
        Command::Remember { note } => {
            let mut assistant = assistant;
            if assistant.remember(&note.join(" ")) {
                println!("Remembered.");
            } else {
                println!("Nothing to remember.");
            }
            cancel_on_ctrl_c(assistant.cancel_token());
            assistant.flush_syncs().await;
            Ok(())
        }
        Command::History { count } => {
            for entry in assistant.history_tail(count) {
                println!("{entry}");
            }
            Ok(())
        }
    }
}

async fn run_chat(assistant: Assistant, config: &ScarConfig) -> anyhow::Result<()> {
    println!("SCAR v{}", env!("CARGO_PKG_VERSION"));

    let (event_tx, event_rx) = mpsc::channel(16);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (recognizer, _reader) = LineRecognizer::spawn_with_commands(
        BufReader::new(tokio::io::stdin()),
        event_tx,
        command_tx,
    );

    let (runtime_tx, runtime_rx) = broadcast::channel(64);
    tokio::spawn(print_events(runtime_rx));

    let mut assistant = assistant
        .with_recognizer(Box::new(recognizer))
        .with_runtime_events(runtime_tx)
        .with_session_commands(command_rx);

    cancel_on_ctrl_c(assistant.cancel_token());

    println!(
        "\nSay \"{}\" to wake me and \"{}\" to stop. Type \"{RESTART_LINE}\" to listen again after stopping. Press Ctrl+C to quit.\n",
        config.conversation.wake_word, config.conversation.stop_phrase,
    );

    assistant.start();
    assistant.run(event_rx).await?;
    Ok(())
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            token.cancel();
        }
    });
}

async fn print_events(mut rx: broadcast::Receiver<RuntimeEvent>) {
    loop {
        match rx.recv().await {
            Ok(RuntimeEvent::Status(status)) => println!("[{status}]"),
            Ok(RuntimeEvent::Response(text)) => println!("SCAR: {text}"),
            Ok(RuntimeEvent::Notice(notice)) => println!("! {notice}"),
            Ok(RuntimeEvent::ReminderCreated(reminder)) => {
                println!("Reminder saved: {}", reminder.text);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run_goal(mut assistant: Assistant, action: GoalAction) -> anyhow::Result<()> {
    match action {
        GoalAction::Add { text } => match assistant.add_goal(&text.join(" ")) {
            Some(goal) => println!("Added goal: {}", goal.text),
            None => println!("Goal text is empty."),
        },
        GoalAction::Toggle { index } => {
            let completed = assistant.toggle_goal(index)?;
            println!(
                "Goal {index} marked {}.",
                if completed { "done" } else { "not done" }
            );
        }
        GoalAction::List => {
            for (i, goal) in assistant.collections().goals.iter().enumerate() {
                let mark = if goal.completed { "x" } else { " " };
                println!("{i}. [{mark}] {}", goal.text);
            }
        }
    }
    cancel_on_ctrl_c(assistant.cancel_token());
    assistant.flush_syncs().await;
    Ok(())
}
