//! Mirage server binary.
//!
//! Startup sequence:
//!
//! 1. Initialize structured logging (tracing).
//! 2. Load settings from the environment.
//! 3. Open the database and bootstrap the schema.
//! 4. Recover the world: latest snapshot + event replay, then overlay the
//!    newest persisted agent rows.
//! 5. Append `WORLD_STARTED`.
//! 6. Wire the chain collaborators (entry verifier, anchor sink).
//! 7. Spawn the tick scheduler and serve the API until Ctrl-C.
//!
//! Shutdown is graceful: the HTTP server stops accepting requests, the
//! scheduler finishes its in-flight tick, and only then does the process
//! exit -- a partially-applied tick is impossible.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mirage_chain::{
    AnchorSink, EntryVerifier, HttpAnchorSink, HttpEntryVerifier, NullAnchorSink,
    StaticEntryVerifier,
};
use mirage_core::Settings;
use mirage_db::Database;
use mirage_server::router::build_router;
use mirage_server::scheduler::run_scheduler;
use mirage_server::state::AppState;
use mirage_server::replay;
use mirage_types::EventType;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load a .env file if one is present; real environment wins.
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("mirage-server starting");

    let settings = Settings::from_env()?;
    info!(
        db_path = settings.db_path,
        tick_interval_ms = settings.tick_interval_ms,
        snapshot_every_ticks = settings.snapshot_every_ticks,
        map_size = settings.map_size,
        chain_mode = settings.chain_mode(),
        "Configuration loaded"
    );

    let db = Database::connect(&settings.db_path).await?;
    db.init().await?;

    let mut world = replay::load_world(&db, settings.map_size).await?;
    let agent_rows = db.agents().list().await?;
    replay::overlay_agents(&mut world, &agent_rows);
    info!(
        tick = world.tick,
        agents = world.agents.len(),
        alive = world.alive_count(),
        "World recovered"
    );

    db.events()
        .insert(
            world.tick,
            EventType::WorldStarted.as_str(),
            None,
            &serde_json::json!({"tick": world.tick}),
        )
        .await?;

    let verifier: Arc<dyn EntryVerifier> =
        match (&settings.chain_rpc_url, &settings.entry_fee_contract_address) {
            (Some(rpc_url), Some(contract)) => Arc::new(HttpEntryVerifier::new(rpc_url, contract)),
            // Trust mode never consults the verifier; deny-all is a safe filler.
            _ => Arc::new(StaticEntryVerifier { paid: false }),
        };
    let anchor: Arc<dyn AnchorSink> = match &settings.anchor_sink_url {
        Some(url) => Arc::new(HttpAnchorSink::new(url)),
        None => Arc::new(NullAnchorSink),
    };

    let bind_addr = settings.bind_addr.clone();
    let state = AppState::new(world, db, settings, verifier, anchor);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(state.clone(), shutdown_rx));

    let router = build_router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(addr = bind_addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Let the scheduler drain its current tick before exiting.
    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;

    info!("mirage-server stopped");
    Ok(())
}
