//! pairchat - terminal client for a two-person private chat

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pairchat::chat::{self, commands};
use pairchat::config::Config;
use pairchat::{auth, tui};

#[derive(Parser)]
#[command(name = "pairchat")]
#[command(about = "Terminal client for a two-person private chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with your name and the shared secret code
    Login {
        #[arg(short, long)]
        name: String,

        /// Shared secret code
        #[arg(short, long)]
        code: String,

        /// Your partner's display name, stored for presence lookups
        #[arg(short, long)]
        partner: Option<String>,
    },

    /// Log out and clear the stored session
    Logout,

    /// Show current authentication status
    Status,

    /// Print recent messages
    History {
        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a text message, or a voice message from an audio file
    Send {
        /// Message content
        #[arg(required_unless_present = "voice", conflicts_with = "voice")]
        message: Option<String>,

        /// Audio file to send as a voice message
        #[arg(long)]
        voice: Option<PathBuf>,
    },

    /// Ping your partner
    Alert,

    /// Print live messages and partner activity until Ctrl-C
    Listen,

    /// Open the full-screen chat
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The chat screen owns the terminal, so its logs go to a buffer
    let logs = tui::LogBuffer::new();
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if matches!(cli.command, Commands::Chat) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .without_time()
                    .with_writer(logs.clone()),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    let mut config = Config::load()?;

    match cli.command {
        Commands::Login {
            name,
            code,
            partner,
        } => {
            tracing::info!("Logging in...");
            let session = auth::login(&mut config, &name, &code, partner.as_deref()).await?;
            println!("Logged in as {}.", session.user.name);
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout(&mut config).await?;
        }
        Commands::Status => {
            auth::status(&config);
        }
        Commands::History { limit } => {
            commands::history(&config, limit).await?;
        }
        Commands::Send { message, voice } => match (message, voice) {
            (_, Some(path)) => commands::send_voice(&config, &path).await?,
            (Some(text), None) => commands::send_text(&config, &text).await?,
            (None, None) => anyhow::bail!("Nothing to send"),
        },
        Commands::Alert => {
            commands::alert(&config).await?;
        }
        Commands::Listen => {
            commands::listen(&config).await?;
        }
        Commands::Chat => {
            let (service, events) = chat::open(&config).await?;
            let service = std::sync::Arc::new(service);

            let runner = std::sync::Arc::clone(&service);
            let event_task = tokio::spawn(async move { runner.run(events).await });

            let result = tui::run(std::sync::Arc::clone(&service), logs).await;
            // Queued on the transport directly so it goes out before the close
            service.send_typing(false);
            service.shutdown().await;
            event_task.abort();
            result?;
        }
    }

    Ok(())
}
