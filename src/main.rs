use anyhow::Context;
use std::sync::Arc;

use simple_bank::config::AppConfig;
use simple_bank::db::Database;
use simple_bank::gateway::{self, state::AppState};
use simple_bank::ledger::{LedgerStore, PgBackend, Store};
use simple_bank::logging::init_logging;
use simple_bank::user_auth::UserAuthService;

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1).cloned())
}

/// `--env/-e <name>` selects `config/<name>.yaml`
fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn get_port_override() -> Option<u16> {
    get_arg(&["--port"]).and_then(|p| p.parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }

    let _log_guard = init_logging(&config);
    tracing::info!(
        env = %env,
        git_hash = env!("GIT_HASH"),
        "Starting simple_bank"
    );

    let db = Database::connect(&config.postgres)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.migrate().await.context("Failed to run migrations")?;

    let store: Arc<dyn Store> = Arc::new(LedgerStore::new(PgBackend::new(db.pool().clone())));
    let user_auth = Arc::new(UserAuthService::new(store.clone(), &config.token));
    let state = Arc::new(AppState::new(
        store,
        user_auth,
        config.gateway.request_timeout(),
    ));

    gateway::run_server(&config.gateway, state).await
}
