use actix_web::{App, HttpServer};
use clap::Parser;
use prattle::api::{self, transcribe::TranscriptionUpstream};
use prattle::cli::{commands::{Cli, Commands}, run_cli};
use prattle::config::AppConfig;
use prattle::llm::ProviderFactory;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        // Keep logs quiet so they don't interleave with streamed replies.
        init_tracing("warn");
        if let Err(e) = run_cli(cli.command, &cli.config).await {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    init_tracing("info");
    info!("Starting Prattle relay...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let llm_provider = match ProviderFactory::create_default(&config) {
        Some(p) => p,
        None => {
            error!(
                "No usable settings for LLM provider '{}' in configuration",
                config.llm.provider
            );
            std::process::exit(1);
        }
    };
    let transcription = TranscriptionUpstream::from_config(&config);

    let host = config.server.host.clone();
    let port = config.server.port;

    info!(provider = llm_provider.name(), "Relay listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new().configure(api::configure_app(llm_provider.clone(), transcription.clone()))
    })
    .bind((host, port))?
    .run()
    .await
}
