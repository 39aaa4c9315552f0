//! Message routing: role resolution, command dispatch, conversation input.
//!
//! Works entirely on normalized messages and the messaging port, so the whole
//! flow runs in tests without a Telegram connection.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::{
    access::{BotCommand, Role},
    audit::{AuditEvent, AuditLogger},
    config::Config,
    conversation::{CommandKind, ConversationEngine, EngineReply},
    domain::ChatId,
    messaging::{port::MessagingPort, types::IncomingMessage},
    roster::RosterStore,
    runtime::RuntimeInfoProvider,
    texts,
};

#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct UpdateRouter {
    owner_id: i64,
    messenger: Arc<dyn MessagingPort>,
    roster: Arc<RosterStore>,
    engine: Arc<ConversationEngine>,
    runtime: Arc<dyn RuntimeInfoProvider>,
    audit: AuditLogger,
    chat_locks: ChatLocks,
}

impl UpdateRouter {
    pub fn new(
        cfg: &Config,
        messenger: Arc<dyn MessagingPort>,
        roster: Arc<RosterStore>,
        engine: Arc<ConversationEngine>,
        runtime: Arc<dyn RuntimeInfoProvider>,
    ) -> Self {
        Self {
            owner_id: cfg.owner_user_id,
            messenger,
            roster,
            engine,
            runtime,
            audit: AuditLogger::new(cfg.audit_log_path.clone()),
            chat_locks: ChatLocks::default(),
        }
    }

    pub async fn handle_message(&self, msg: IncomingMessage) {
        // Sequentialize per chat so a prompt and its answer cannot interleave.
        let _guard = self.chat_locks.lock_chat(msg.chat_id.0).await;

        // Fail closed: an unreadable roster must not grant access.
        let role = Role::resolve(msg.sender, self.owner_id, self.roster.as_ref())
            .await
            .unwrap_or_else(|e| {
                warn!("role resolution failed: {e}");
                Role::Unregistered
            });

        let text = msg.text.trim().to_string();
        if text.is_empty() {
            return;
        }

        if text.starts_with('/') {
            self.handle_command(&msg, role, &text).await;
            return;
        }

        // Plain text only matters in an owner chat with a pending admin command.
        if role == Role::Owner {
            match self.engine.handle_input(msg.chat_id.0, &text).await {
                Ok(Some(reply)) => {
                    self.reply_engine(&msg, reply).await;
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("admin command failed: {e}");
                    self.reply(msg.chat_id, &texts::admin_command_failed()).await;
                    return;
                }
            }
        }

        debug!("ignoring plain text in chat {}", msg.chat_id.0);
    }

    async fn handle_command(&self, msg: &IncomingMessage, role: Role, text: &str) {
        let Some(cmd) = BotCommand::parse(text) else {
            self.reply(msg.chat_id, &texts::unknown_command()).await;
            return;
        };

        if !cmd.allowed_for(role) {
            if let Some(sender) = msg.sender {
                self.record(AuditEvent::denied(
                    sender.0,
                    msg.sender_name.as_deref(),
                    cmd.as_str(),
                ));
            }
            self.reply(msg.chat_id, &texts::unauthorized(cmd)).await;
            return;
        }

        match cmd {
            BotCommand::Start => {
                let body = texts::greeting(msg.sender_name.as_deref(), role);
                self.reply(msg.chat_id, &body).await;
            }
            BotCommand::Help => {
                self.reply(msg.chat_id, &texts::help_for(role)).await;
            }
            BotCommand::Id => {
                // Channel posts have no sender; nothing sensible to answer.
                if let Some(sender) = msg.sender {
                    self.reply(msg.chat_id, &texts::id_reply(sender.0)).await;
                }
            }
            BotCommand::Check => {
                let snapshot = self.runtime.snapshot();
                self.reply(msg.chat_id, &texts::check_reply(&snapshot)).await;
            }
            BotCommand::AddUser => {
                let reply = self.engine.begin(msg.chat_id.0, CommandKind::Add).await;
                self.reply_engine(msg, reply).await;
            }
            BotCommand::DeleteUser => {
                let reply = self.engine.begin(msg.chat_id.0, CommandKind::Delete).await;
                self.reply_engine(msg, reply).await;
            }
            BotCommand::Cancel => {
                let reply = self.engine.cancel(msg.chat_id.0).await;
                self.reply_engine(msg, reply).await;
            }
        }
    }

    async fn reply_engine(&self, msg: &IncomingMessage, reply: EngineReply) {
        let body = match reply {
            EngineReply::PromptForId(kind) => texts::prompt_for_id(kind),
            EngineReply::InvalidId(kind) => texts::reprompt_invalid_id(kind),
            EngineReply::Cancelled => texts::cancelled(),
            EngineReply::NothingToCancel => texts::nothing_to_cancel(),
            EngineReply::OwnerExcluded => texts::owner_excluded(),
            EngineReply::Added(id) => {
                self.record_roster_change(msg, "/add_user", id, "added");
                texts::added(id)
            }
            EngineReply::AlreadyRegistered(id) => texts::already_registered(id),
            EngineReply::Deleted(id) => {
                self.record_roster_change(msg, "/delete_user", id, "deleted");
                texts::deleted(id)
            }
            EngineReply::NotRegistered(id) => texts::not_registered(id),
        };
        self.reply(msg.chat_id, &body).await;
    }

    async fn reply(&self, chat_id: ChatId, html: &str) {
        if let Err(e) = self.messenger.send_html(chat_id, html).await {
            warn!("reply to chat {} failed: {e}", chat_id.0);
        }
    }

    fn record_roster_change(&self, msg: &IncomingMessage, command: &str, target: i64, outcome: &str) {
        let Some(sender) = msg.sender else {
            return;
        };
        self.record(AuditEvent::roster_change(
            sender.0,
            msg.sender_name.as_deref(),
            command,
            target,
            outcome,
        ));
    }

    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.write(event) {
            debug!("audit write failed: {e}");
        }
    }
}
