use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, loaded once at startup and shared via `Arc`.
#[derive(Clone, Debug)]
pub struct Config {
    /// Telegram Bot API token.
    pub bot_token: String,
    /// The administrator. Always authorized, never a roster entry.
    pub owner_user_id: i64,

    /// SQLite database backing the subscriber roster.
    pub db_path: PathBuf,

    /// Downtime heartbeat file and write period.
    pub heartbeat_file: PathBuf,
    pub heartbeat_interval: Duration,

    /// Outbound sends during the recovery broadcast.
    pub send_timeout: Duration,
    pub dispatch_concurrency: usize,
    pub dispatch_max_attempts: u32,

    /// Optional JSON-lines audit trail; `None` disables it.
    pub audit_log_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let owner_raw = env_str("OWNER_USER_ID").and_then(non_empty).ok_or_else(|| {
            Error::Config("OWNER_USER_ID environment variable is required".to_string())
        })?;
        let owner_user_id = owner_raw.trim().parse::<i64>().map_err(|_| {
            Error::Config(format!(
                "OWNER_USER_ID must be a numeric Telegram id, got {owner_raw:?}"
            ))
        })?;

        let db_path = env_path("ROSTER_DB_PATH").unwrap_or_else(|| PathBuf::from("alivebot.db"));
        let heartbeat_file =
            env_path("HEARTBEAT_FILE").unwrap_or_else(|| PathBuf::from("alivebot.heartbeat"));
        let heartbeat_interval =
            Duration::from_secs(env_u64("HEARTBEAT_INTERVAL_SECS").unwrap_or(60).max(1));

        let send_timeout = Duration::from_secs(env_u64("SEND_TIMEOUT_SECS").unwrap_or(10).max(1));
        let dispatch_concurrency = env_usize("DISPATCH_CONCURRENCY").unwrap_or(4).max(1);
        let dispatch_max_attempts = env_u32("DISPATCH_MAX_ATTEMPTS").unwrap_or(2).max(1);

        let audit_log_path = env_str("AUDIT_LOG_PATH").and_then(non_empty).map(PathBuf::from);

        Ok(Self {
            bot_token,
            owner_user_id,
            db_path,
            heartbeat_file,
            heartbeat_interval,
            send_timeout,
            dispatch_concurrency,
            dispatch_max_attempts,
            audit_log_path,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
