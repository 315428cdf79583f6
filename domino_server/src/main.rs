//! Domino tournament server.
//!
//! Wires the engine to its ports (Postgres-backed when DATABASE_URL is set,
//! in-memory otherwise), runs the in-process scheduler dispatcher, and
//! serves the HTTP API.

mod api;
mod config;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use domino_engine::ledger::{BalanceLedger, MemoryLedger, PgLedger};
use domino_engine::scheduler::{TaskKind, TokioScheduler};
use domino_engine::store::{GameStore, MemoryStore, PgStore};
use domino_engine::DominoEngine;
use log::{error, info, warn};
use pico_args::Arguments;
use sqlx::postgres::PgPoolOptions;

use config::ServerConfig;

const HELP: &str = "\
Run a domino tournament server

USAGE:
  domino_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8086]
  --db-url     URL         Database connection string  [default: env DATABASE_URL, else in-memory]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8086)
  DATABASE_URL             PostgreSQL connection string
  TARGET_SCORE             Cumulative score that ends a tournament
  TURN_TIMEOUT_SECS        Turn timer with a playable tile
  PASS_TIMEOUT_SECS        Turn timer with no playable tile
  START_GAME_DELAY_SECS    Countdown once a table fills
  NEXT_ROUND_DELAY_SECS    Pause between rounds
  COMMISSION_PERCENT       House cut taken at settlement
  USD_TO_VES_RATE          VES per USD for entry fee pricing
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind_override: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url_override: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let config = ServerConfig::from_env(bind_override, database_url_override)?;

    logging::init();

    let (scheduler, mut fired) = TokioScheduler::new();
    let scheduler = Arc::new(scheduler);

    let (store, ledger): (Arc<dyn GameStore>, Arc<dyn BalanceLedger>) =
        match &config.database_url {
            Some(url) => {
                let pool = Arc::new(
                    PgPoolOptions::new()
                        .max_connections(16)
                        .connect(url)
                        .await?,
                );
                let store = PgStore::new(Arc::clone(&pool));
                store.init().await?;
                let ledger = PgLedger::new(pool);
                ledger.init().await?;
                info!("using postgres store and ledger");
                (Arc::new(store), Arc::new(ledger))
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store and ledger");
                (Arc::new(MemoryStore::new()), Arc::new(MemoryLedger::new()))
            }
        };

    let engine = Arc::new(DominoEngine::new(
        store,
        ledger,
        scheduler,
        config.engine.clone(),
    ));

    // Dispatcher: feed fired in-process tasks back into the engine callbacks.
    let dispatch_engine = Arc::clone(&engine);
    tokio::spawn(async move {
        while let Some(task) = fired.recv().await {
            let game_id = task.payload.game_id.clone();
            let result = match task.kind {
                TaskKind::StartGame => dispatch_engine.start_game_callback(&game_id).await,
                TaskKind::TurnTimeout => {
                    let expected = task.payload.expected_player_id.as_deref().unwrap_or_default();
                    dispatch_engine
                        .turn_timeout_callback(&game_id, expected)
                        .await
                }
            };
            if let Err(err) = result {
                error!("scheduled {:?} task failed for game {game_id}: {err}", task.kind);
            }
        }
    });

    let app = api::create_router(api::AppState { engine });
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("domino server listening on {}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
