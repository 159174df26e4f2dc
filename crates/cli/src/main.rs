//! Spindle CLI, the front end for the advisor pipeline.
//!
//! Commands:
//! - `init`       - Write a default config file
//! - `config`     - Show, locate or validate the configuration
//! - `chat`       - Interactive chat or single-message mode
//! - `tasks`      - Let the model manage tasks through tool calls
//! - `plan`       - Generate a structured travel itinerary
//! - `sentiment`  - Classify text into a fixed label
//! - `speak`      - Synthesize speech to an audio file
//! - `image`      - Generate an image
//! - `memory`     - Inspect stored conversations

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "spindle",
    about = "Spindle: advisor pipeline middleware for LLM calls",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Chat with the model
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation whose history is replayed and extended
        #[arg(short, long, default_value = "default")]
        conversation: String,

        /// Print the reply as it is generated
        #[arg(short, long)]
        stream: bool,
    },

    /// Ask the model to create, assign and update tasks
    Tasks {
        /// Instruction for the model
        message: String,
    },

    /// Generate a travel itinerary
    Plan {
        #[arg(long)]
        city: String,

        #[arg(long, default_value_t = 3)]
        days: u32,
    },

    /// Classify the sentiment of a text
    Sentiment {
        text: String,
    },

    /// Synthesize speech
    Speak {
        text: String,

        /// Output audio file
        #[arg(short, long, default_value = "speech.mp3")]
        out: PathBuf,

        /// Voice override
        #[arg(long)]
        voice: Option<String>,
    },

    /// Generate an image
    Image {
        prompt: String,

        /// Write the image here when the endpoint returns bytes
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Inspect conversation memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
}

#[derive(Subcommand, Debug)]
enum MemoryAction {
    /// List stored conversations
    List,
    /// Print the history of one conversation
    Show { id: String },
    /// Delete the history of one conversation
    Clear { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::config_cmd::init(force).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Chat {
            message,
            conversation,
            stream,
        } => commands::chat::run(message, conversation, stream).await?,
        Commands::Tasks { message } => commands::tasks::run(&message).await?,
        Commands::Plan { city, days } => commands::plan::run(&city, days).await?,
        Commands::Sentiment { text } => commands::sentiment::run(&text).await?,
        Commands::Speak { text, out, voice } => commands::media::speak(&text, &out, voice).await?,
        Commands::Image { prompt, out } => commands::media::image(&prompt, out.as_deref()).await?,
        Commands::Memory { action } => match action {
            MemoryAction::List => commands::memory::list().await?,
            MemoryAction::Show { id } => commands::memory::show(&id).await?,
            MemoryAction::Clear { id } => commands::memory::clear(&id).await?,
        },
    }

    Ok(())
}
