//! Startup notification fan-out.
//!
//! Runs once per boot: every roster member plus the owner gets the recovery
//! notice. Delivery is best effort, there is no queue and no redelivery, the
//! next boot simply sends the next notice.

use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    audit::{AuditEvent, AuditLogger},
    config::Config,
    domain::ChatId,
    messaging::port::MessagingPort,
    roster::RosterStore,
};

/// Pause between attempts to the same recipient.
const RETRY_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct NotificationDispatcher {
    messenger: Arc<dyn MessagingPort>,
    roster: Arc<RosterStore>,
    audit: AuditLogger,
    owner_id: i64,
    send_timeout: Duration,
    max_attempts: u32,
    concurrency: usize,
}

impl NotificationDispatcher {
    pub fn new(messenger: Arc<dyn MessagingPort>, roster: Arc<RosterStore>, cfg: &Config) -> Self {
        Self {
            messenger,
            roster,
            audit: AuditLogger::new(cfg.audit_log_path.clone()),
            owner_id: cfg.owner_user_id,
            send_timeout: cfg.send_timeout,
            max_attempts: cfg.dispatch_max_attempts,
            concurrency: cfg.dispatch_concurrency,
        }
    }

    /// Send `message` to every recipient, a bounded number at a time.
    ///
    /// Failures are isolated per recipient; one dead chat never blocks the
    /// rest. The owner is always included, even when the roster cannot be read.
    pub async fn dispatch(&self, message: &str) -> DispatchReport {
        let mut recipients: Vec<i64> = match self.roster.list().await {
            Ok(subscribers) => subscribers.iter().map(|s| s.telegram_id).collect(),
            Err(e) => {
                warn!("roster read failed before dispatch: {e}");
                Vec::new()
            }
        };
        if !recipients.contains(&self.owner_id) {
            recipients.push(self.owner_id);
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            let semaphore = Arc::clone(&semaphore);
            let messenger = Arc::clone(&self.messenger);
            let message = message.to_string();
            let send_timeout = self.send_timeout;
            let max_attempts = self.max_attempts;

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return false;
                };
                deliver(
                    messenger.as_ref(),
                    recipient,
                    &message,
                    send_timeout,
                    max_attempts,
                )
                .await
            }));
        }

        let mut report = DispatchReport::default();
        for handle in handles {
            match handle.await {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!("notification task panicked: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            "startup notification: {} delivered, {} failed",
            report.delivered, report.failed
        );
        if let Err(e) = self
            .audit
            .write(AuditEvent::dispatch(report.delivered, report.failed))
        {
            debug!("audit write failed: {e}");
        }

        report
    }
}

async fn deliver(
    messenger: &dyn MessagingPort,
    recipient: i64,
    message: &str,
    send_timeout: Duration,
    max_attempts: u32,
) -> bool {
    for attempt in 1..=max_attempts {
        let send = messenger.send_html(ChatId(recipient), message);
        match tokio::time::timeout(send_timeout, send).await {
            Ok(Ok(_)) => return true,
            Ok(Err(e)) => {
                warn!("notify {recipient} attempt {attempt}/{max_attempts} failed: {e}");
            }
            Err(_) => {
                warn!("notify {recipient} attempt {attempt}/{max_attempts} timed out");
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(RETRY_PAUSE).await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        path::PathBuf,
        sync::Mutex as StdMutex,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        Error, Result,
    };

    const OWNER: i64 = 1;

    struct FakeMessenger {
        attempts: StdMutex<Vec<i64>>,
        sent: StdMutex<Vec<i64>>,
        fail: HashSet<i64>,
        fail_first: StdMutex<HashSet<i64>>,
        hang: HashSet<i64>,
    }

    impl FakeMessenger {
        fn new() -> Self {
            Self {
                attempts: StdMutex::new(Vec::new()),
                sent: StdMutex::new(Vec::new()),
                fail: HashSet::new(),
                fail_first: StdMutex::new(HashSet::new()),
                hang: HashSet::new(),
            }
        }

        fn attempt_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }

        fn sent_ids(&self) -> Vec<i64> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_html(&self, chat_id: ChatId, _html: &str) -> Result<MessageRef> {
            self.attempts.lock().unwrap().push(chat_id.0);
            if self.hang.contains(&chat_id.0) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail.contains(&chat_id.0) {
                return Err(Error::Transport("fake send failure".to_string()));
            }
            if self.fail_first.lock().unwrap().remove(&chat_id.0) {
                return Err(Error::Transport("fake transient failure".to_string()));
            }
            self.sent.lock().unwrap().push(chat_id.0);
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    fn test_config(max_attempts: u32) -> Config {
        Config {
            bot_token: "test-token".to_string(),
            owner_user_id: OWNER,
            db_path: PathBuf::from(":memory:"),
            heartbeat_file: PathBuf::from("/tmp/alivebot-dispatch-test-heartbeat"),
            heartbeat_interval: Duration::from_secs(60),
            send_timeout: Duration::from_millis(100),
            dispatch_concurrency: 4,
            dispatch_max_attempts: max_attempts,
            audit_log_path: None,
        }
    }

    async fn roster_with(ids: &[i64]) -> Arc<RosterStore> {
        let roster = Arc::new(RosterStore::open_in_memory().unwrap());
        for id in ids {
            roster.add(*id, None).await.unwrap();
        }
        roster
    }

    #[tokio::test]
    async fn counts_partial_failures() {
        let mut fake = FakeMessenger::new();
        fake.fail.insert(10);
        let messenger = Arc::new(fake);
        let roster = roster_with(&[10, 20]).await;

        let dispatcher =
            NotificationDispatcher::new(messenger.clone(), roster, &test_config(1));
        let report = dispatcher.dispatch("server is back").await;

        assert_eq!(report, DispatchReport { delivered: 2, failed: 1 });
        assert_eq!(messenger.attempt_count(), 3);
        let mut sent = messenger.sent_ids();
        sent.sort_unstable();
        assert_eq!(sent, vec![OWNER, 20]);
    }

    #[tokio::test]
    async fn owner_is_not_notified_twice() {
        let messenger = Arc::new(FakeMessenger::new());
        let roster = roster_with(&[OWNER, 5]).await;

        let dispatcher =
            NotificationDispatcher::new(messenger.clone(), roster, &test_config(1));
        let report = dispatcher.dispatch("hi").await;

        assert_eq!(report.delivered, 2);
        assert_eq!(
            messenger.sent_ids().iter().filter(|id| **id == OWNER).count(),
            1
        );
    }

    #[tokio::test]
    async fn empty_roster_still_notifies_owner() {
        let messenger = Arc::new(FakeMessenger::new());
        let roster = roster_with(&[]).await;

        let dispatcher =
            NotificationDispatcher::new(messenger.clone(), roster, &test_config(1));
        let report = dispatcher.dispatch("hi").await;

        assert_eq!(report, DispatchReport { delivered: 1, failed: 0 });
        assert_eq!(messenger.sent_ids(), vec![OWNER]);
    }

    #[tokio::test]
    async fn hanging_send_counts_as_failure() {
        let mut fake = FakeMessenger::new();
        fake.hang.insert(7);
        let messenger = Arc::new(fake);
        let roster = roster_with(&[7]).await;

        let dispatcher =
            NotificationDispatcher::new(messenger.clone(), roster, &test_config(1));
        let report = dispatcher.dispatch("hi").await;

        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(messenger.sent_ids(), vec![OWNER]);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let fake = FakeMessenger::new();
        fake.fail_first.lock().unwrap().insert(42);
        let messenger = Arc::new(fake);
        let roster = roster_with(&[42]).await;

        let dispatcher =
            NotificationDispatcher::new(messenger.clone(), roster, &test_config(2));
        let report = dispatcher.dispatch("hi").await;

        assert_eq!(report, DispatchReport { delivered: 2, failed: 0 });
        assert!(messenger.sent_ids().contains(&42));
        assert_eq!(messenger.attempt_count(), 3);
    }
}
