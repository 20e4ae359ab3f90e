pub mod commands;
pub mod repl;

use std::sync::Arc;

use thiserror::Error;

use crate::cli::commands::{Commands, ConfigAction, HistoryAction};
use crate::client::prefs::{self, PreferenceStore, Preferences, StoreError};
use crate::client::ClientError;
use crate::config::AppConfig;
use crate::db::{get_connection, DuckDbStore};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Database Error: {0}")]
    Database(#[from] duckdb::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("`{0}` is not handled by the command runner; start it from the prattle binary")]
    Unsupported(&'static str),
}

pub fn open_store(config: &AppConfig) -> Result<Arc<dyn PreferenceStore>, CliError> {
    let pool = get_connection(&config.database)?;
    Ok(Arc::new(DuckDbStore::new(pool)))
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

pub async fn run_cli(command: Commands, config_path: &str) -> Result<(), CliError> {
    let config = AppConfig::load(config_path)?;

    match command {
        Commands::Serve => return Err(CliError::Unsupported("serve")),
        Commands::Chat(args) => {
            let store = open_store(&config)?;
            repl::run_repl(config, store, args).await?;
        }
        Commands::Config { action } => {
            let store = open_store(&config)?;
            let mut stored = Preferences::load(store.as_ref())?;

            match action {
                ConfigAction::Show => {
                    println!("{:<12} | {}", "Relay", config.client.relay_url);
                    println!("{:<12} | {}", "Model", stored.model_name);
                    println!(
                        "{:<12} | {}",
                        "API key",
                        stored.api_key.as_deref().map(mask_key).unwrap_or_else(|| "(not set)".to_string())
                    );
                    println!("{:<12} | {}", "Store", config.database.path);
                }
                ConfigAction::SetKey { key } => {
                    stored.api_key = Some(key.trim().to_string()).filter(|k| !k.is_empty());
                    stored.save(store.as_ref())?;
                    println!("API key saved.");
                }
                ConfigAction::ClearKey => {
                    stored.api_key = None;
                    stored.save(store.as_ref())?;
                    println!("API key removed.");
                }
                ConfigAction::SetModel { model } => {
                    stored.model_name = model.trim().to_string();
                    stored.save(store.as_ref())?;
                    println!("Model set to {}.", stored.model_name);
                }
            }
        }
        Commands::History { action } => {
            let store = open_store(&config)?;

            match action {
                HistoryAction::List => {
                    let history = prefs::load_history(store.as_ref())?;
                    if history.is_empty() {
                        println!("No messages sent yet.");
                    } else {
                        for (i, entry) in history.iter().enumerate() {
                            let first_line = entry.lines().next().unwrap_or_default();
                            println!("{:>3} | {}", i, first_line);
                        }
                    }
                }
                HistoryAction::Clear => {
                    prefs::save_history(store.as_ref(), &Default::default())?;
                    println!("Send history cleared.");
                }
            }
        }
    }

    Ok(())
}
