use std::sync::Arc;

use tracing::info;

use alivebot_core::{
    config::Config, conversation::ConversationEngine, heartbeat, heartbeat::Heartbeat,
    roster::RosterStore, runtime::SystemRuntimeInfo,
};

#[tokio::main]
async fn main() -> Result<(), alivebot_core::Error> {
    alivebot_core::logging::init("alivebot")?;

    let cfg = Arc::new(Config::load()?);

    let roster = Arc::new(RosterStore::open(&cfg.db_path)?);
    let engine = Arc::new(ConversationEngine::new(roster.clone(), cfg.owner_user_id));
    let runtime = Arc::new(SystemRuntimeInfo::new());

    // Read the previous run's heartbeat before the writer overwrites it.
    let downtime = heartbeat::read_downtime(&cfg.heartbeat_file);
    match downtime {
        Some(gap) => info!("previous heartbeat found, estimated downtime {}s", gap.as_secs()),
        None => info!("no previous heartbeat, skipping downtime estimate"),
    }
    let hb = Heartbeat::start(cfg.heartbeat_file.clone(), cfg.heartbeat_interval);

    let result = alivebot_telegram::poll::run_polling(
        cfg.clone(),
        roster,
        engine,
        runtime,
        downtime,
    )
    .await;

    hb.stop().await;

    result.map_err(|e| alivebot_core::Error::Transport(format!("telegram bot failed: {e}")))
}
