//! tablerag: graph + vector retrieval over tabular data, as an HTTP server
//! or one-shot CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use tablerag_core::EngineConfig;
use tablerag_engine::Engine;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("TABLERAG_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn print_usage() {
    println!("tablerag: knowledge graph + vector retrieval over CSV tables");
    println!();
    println!("Usage: tablerag [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve           Start the HTTP server");
    println!("  build <csv>              Build once and print graph stats");
    println!("  query <csv> <text> [k]   Build, then print the top-k contexts");
    println!("  help                     Show this help message");
}

fn open_engine(data_dir: &Path) -> anyhow::Result<(EngineConfig, Engine)> {
    let config = EngineConfig::from_env(data_dir)?;
    let engine = Engine::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize engine: {}", e))?;
    Ok((config, engine))
}

fn run_build(csv: &str) -> anyhow::Result<()> {
    let (_, engine) = open_engine(&resolve_data_dir())?;
    let report = engine.build(Path::new(csv))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", serde_json::to_string_pretty(&engine.stats())?);
    Ok(())
}

fn run_query(csv: &str, text: &str, k: Option<&str>) -> anyhow::Result<()> {
    let (_, engine) = open_engine(&resolve_data_dir())?;
    let k = match k {
        Some(raw) => {
            let k: i64 = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("k must be an integer, got {}", raw))?;
            if k <= 0 {
                anyhow::bail!("k must be positive, got {}", k);
            }
            k as usize
        }
        None => engine.default_k(),
    };

    engine.build(Path::new(csv))?;
    let result = engine.query(text, k)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    println!();
    println!("{}", result.to_prompt_context());
    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutting down, cancelling in-flight builds");
    state.shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "serve" => {}
            "build" => {
                if args.len() < 3 {
                    eprintln!("Usage: tablerag build <csv>");
                    std::process::exit(1);
                }
                return run_build(&args[2]);
            }
            "query" => {
                if args.len() < 4 {
                    eprintln!("Usage: tablerag query <csv> <text> [k]");
                    std::process::exit(1);
                }
                return run_query(&args[2], &args[3], args.get(4).map(|s| s.as_str()));
            }
            "--help" | "-h" | "help" => {
                print_usage();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'tablerag help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let (config, engine) = open_engine(&data_dir)?;
    let port = config.port;
    let state = Arc::new(AppState::new(config, engine));

    let app = routes::build_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("tablerag server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}
