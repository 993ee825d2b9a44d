use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dashboard_ai::{
    analysis::summarize_file,
    config::Config,
    llm::ModelClient,
    routes::create_router,
    storage::DatasetStore,
    utils::init_tracing,
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dashboard-ai", version, about = "Dataset profiling and AI chart suggestion service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Print the summary pack of a local CSV or XLSX file
    Profile {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Profile { path } => {
            let summary = tokio::task::spawn_blocking(move || summarize_file(&path, &config.profiling)).await??;
            println!("{}", summary);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let _log_guard = init_tracing(config.logging.directory.as_deref());
    info!("Configuration loaded: {:?}", config.server);

    let store = DatasetStore::open(&config.storage.root, config.storage.max_upload_bytes).await?;
    let model_client = Arc::new(ModelClient::from_config(&config.llm));

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    let addr: SocketAddr = listener.local_addr()?;

    let state = AppState {
        config,
        store,
        model_client,
    };
    let app = create_router(state);

    info!("Server listening on {}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
