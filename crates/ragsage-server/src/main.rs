//! RagSage — chat and embedding provider gateway.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod registry;
mod routes;
mod state;

use ragsage_core::ProviderConfig;
use ragsage_infer::LocalModels;
use registry::{ProviderRecord, ProviderRegistry};
use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("RAGSAGE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn build_state(data_dir: &std::path::Path) -> anyhow::Result<(AppState, ProviderRegistry)> {
    let config = ragsage_core::RagSageConfig::from_env(data_dir)?;
    let registry = ProviderRegistry::load(&config.data_paths.providers_file);
    let local_models = LocalModels::with_default_loader(&config.data_paths.models);
    let state = AppState::build(config, &registry, &local_models);
    Ok((state, registry))
}

/// Starter registry: OpenAI chat (key from `OPENAI_API_KEY`) and local BGE.
fn sample_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::default();
    registry.chat.insert(
        "openai".into(),
        ProviderRecord::new("OpenAI", ProviderConfig::new("", "gpt-3.5-turbo")),
    );
    registry.embedding.insert(
        "bge".into(),
        ProviderRecord::new("BAAI", ProviderConfig::default()),
    );
    registry
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--check" | "check" => {
                let data_dir = args.get(2).map(PathBuf::from).unwrap_or_else(resolve_data_dir);
                let (state, registry) = build_state(&data_dir)?;
                for summary in state.chat_summaries() {
                    println!("chat       {:<16} {:<16} {}", summary.id, summary.factory, summary.model);
                }
                for summary in state.embedding_summaries() {
                    println!("embedding  {:<16} {:<16} {}", summary.id, summary.factory, summary.model);
                }
                let skipped = registry.chat.len() + registry.embedding.len()
                    - state.chat_models.len()
                    - state.embedding_models.len();
                if skipped > 0 {
                    eprintln!("{} provider record(s) could not be built", skipped);
                    std::process::exit(1);
                }
                return Ok(());
            }
            "--init" | "init" => {
                let data_dir = args.get(2).map(PathBuf::from).unwrap_or_else(resolve_data_dir);
                let config = ragsage_core::RagSageConfig::from_env(&data_dir)?;
                let path = &config.data_paths.providers_file;
                if path.exists() {
                    eprintln!("{} already exists", path.display());
                    std::process::exit(1);
                }
                sample_registry().save(path)?;
                println!("Wrote {}", path.display());
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("RagSage — chat and embedding provider gateway");
                println!();
                println!("Usage: ragsage [command]");
                println!();
                println!("Commands:");
                println!("  (none)              Start the server");
                println!("  init [data-dir]     Write a starter providers.json");
                println!("  check [data-dir]    Build every configured provider and report");
                println!("  help                Show this help message");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'ragsage help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let (state, _) = build_state(&data_dir)?;
    let port = state.config.port;
    let app = routes::build_router(Arc::new(state));

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("RagSage server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
