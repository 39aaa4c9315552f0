//! Liveness heartbeat file.
//!
//! A background task rewrites a file with the current unix timestamp every
//! interval. After a crash or power loss the stale value tells the next boot
//! roughly how long the server was down.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::Result;

pub struct Heartbeat {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawn the writer. The first beat lands immediately, so even short runs
    /// leave a timestamp behind.
    pub fn start(path: PathBuf, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                  _ = token.cancelled() => break,
                  _ = tick.tick() => {
                    if let Err(e) = write_timestamp(&path, now_unix()) {
                        warn!("heartbeat write failed: {e}");
                    }
                  }
                }
            }
        });
        Self { cancel, handle }
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

fn write_timestamp(path: &Path, ts: i64) -> Result<()> {
    let mut file = File::create(path)?;
    write!(file, "{ts}")?;
    file.sync_all()?;
    Ok(())
}

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Downtime estimate based on the previous run's last heartbeat.
///
/// `None` when the file is missing or unreadable (first boot, wiped disk).
/// Callers must read this before `Heartbeat::start` overwrites the file.
pub fn read_downtime(path: &Path) -> Option<Duration> {
    read_downtime_at(path, now_unix())
}

fn read_downtime_at(path: &Path, now: i64) -> Option<Duration> {
    let raw = std::fs::read_to_string(path).ok()?;
    let last: i64 = raw.trim().parse().ok()?;
    // Clock went backwards across the restart; report zero rather than nonsense.
    let gap = (now - last).max(0);
    Some(Duration::from_secs(gap as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"))
    }

    #[test]
    fn downtime_is_gap_between_heartbeat_and_now() {
        let path = tmp_file("alivebot-hb-gap");
        write_timestamp(&path, 1_000).unwrap();
        assert_eq!(
            read_downtime_at(&path, 1_090),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn missing_or_corrupt_file_yields_none() {
        let missing = tmp_file("alivebot-hb-missing");
        assert_eq!(read_downtime(&missing), None);

        let corrupt = tmp_file("alivebot-hb-corrupt");
        std::fs::write(&corrupt, "not a number").unwrap();
        assert_eq!(read_downtime(&corrupt), None);
    }

    #[test]
    fn future_heartbeat_clamps_to_zero() {
        let path = tmp_file("alivebot-hb-future");
        write_timestamp(&path, 2_000).unwrap();
        assert_eq!(read_downtime_at(&path, 1_500), Some(Duration::from_secs(0)));
    }

    #[tokio::test]
    async fn writer_keeps_file_fresh_until_stopped() {
        let path = tmp_file("alivebot-hb-writer");
        let before = now_unix();

        let hb = Heartbeat::start(path.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        hb.stop().await;

        let raw = std::fs::read_to_string(&path).unwrap();
        let written: i64 = raw.trim().parse().unwrap();
        assert!(written >= before);
        assert!(written <= now_unix());
    }
}
