use std::path::PathBuf;
use std::sync::Arc;

use common::exec::NativeExecutor;
use common::storage::FilesystemBlobStore;
use tracing::{Level, info, warn};

use server::build_router;
use server::config::AppConfig;
use server::repo::FsProblemStore;
use server::runs::RunService;
use server::session::SessionManager;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = Arc::new(AppConfig::load()?);
    let data_dir = PathBuf::from(&config.storage.data_dir);

    let blobs = Arc::new(
        FilesystemBlobStore::new(data_dir.join("blobs"), config.storage.max_blob_size).await?,
    );
    let problems = Arc::new(FsProblemStore::open(data_dir.join("problems")).await?);
    let sessions = Arc::new(SessionManager::open(data_dir.join("sessions")).await?);

    // Deployments register their sandbox handlers on the executor here.
    let executor = Arc::new(NativeExecutor::new());
    warn!("no execution handlers registered; run submissions will be rejected");

    let runs = RunService::start(
        executor,
        sessions.clone(),
        blobs.clone(),
        config.storage.problem_quota,
        config.runner.workers,
        config.runner.queue_capacity,
    );

    let state = AppState {
        config: config.clone(),
        blobs,
        problems,
        sessions,
        runs,
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
