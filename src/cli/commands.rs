use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "prattle", version, about = "Streaming LLM chat client and relay", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat relay HTTP server
    Serve,

    /// Enter the interactive chat REPL
    Chat(ChatArgs),

    /// Manage the stored API key and model
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect or clear the send history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChatArgs {
    /// Model to request instead of the stored one
    #[arg(short, long)]
    pub model: Option<String>,

    /// API key for this session only (not stored)
    #[arg(long, env = "PRATTLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Relay base URL, e.g. http://127.0.0.1:8080
    #[arg(long)]
    pub relay_url: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the stored settings
    Show,

    /// Store the API key sent with chat requests
    SetKey {
        key: String,
    },

    /// Forget the stored API key
    ClearKey,

    /// Store the model name to request
    SetModel {
        model: String,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List sent messages, most recent first
    List,

    /// Forget all sent messages
    Clear,
}
