pub mod api;
pub mod debug;
pub mod error;
pub mod models;
pub mod rules;
pub mod service;
pub mod settings;
pub mod store;

use api::AppState;
use debug::DebugLog;
use rules::lifecycle::Workflow;
use service::BugService;
use settings::StorageKind;
use std::sync::Arc;
use store::{db::SqliteBugRepository, memory::MemoryBugRepository, BugRepository};

/// Load settings, open the store and serve the API until Ctrl-C.
pub async fn run() -> Result<(), String> {
    let data_dir = settings::data_dir();

    // The logger starts first so warnings from the settings load are kept.
    let log_level = settings::configured_log_level(&data_dir);
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    )
    .try_init();

    let settings = settings::load_effective_settings(&data_dir)?;

    let repo: Arc<dyn BugRepository> = match settings.storage {
        StorageKind::Sqlite => Arc::new(
            SqliteBugRepository::open(&settings.database_path)
                .map_err(|e| format!("DB error: {e}"))?,
        ),
        StorageKind::Memory => {
            log::warn!("using in-memory storage; bugs are lost on exit");
            Arc::new(MemoryBugRepository::new())
        }
    };

    let workflow = Workflow {
        allow_direct_resolve: settings.allow_direct_resolve,
    };
    let state = AppState::new(
        BugService::new(repo, workflow),
        Arc::new(DebugLog::new(settings.debug_log_capacity)),
        data_dir,
    );

    let listener = tokio::net::TcpListener::bind(settings.bind_address)
        .await
        .map_err(|e| format!("Failed to bind {}: {e}", settings.bind_address))?;
    log::info!("bugtrack listening on http://{}", settings.bind_address);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("shutting down");
        })
        .await
        .map_err(|e| format!("Server error: {e}"))
}
