//! Per-chat admin conversation state.
//!
//! `/add_user` and `/delete_user` are two-step flows: the command opens a
//! session, the next plain message supplies the target id. Sessions are keyed
//! by chat so concurrent admin chats never see each other's state.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    roster::{AddOutcome, DeleteOutcome, RosterStore},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Add,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingUserId(CommandKind),
}

/// What the engine wants said back to the admin. The router turns these into
/// HTML via `texts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineReply {
    PromptForId(CommandKind),
    InvalidId(CommandKind),
    Cancelled,
    NothingToCancel,
    OwnerExcluded,
    Added(i64),
    AlreadyRegistered(i64),
    Deleted(i64),
    NotRegistered(i64),
}

pub struct ConversationEngine {
    roster: Arc<RosterStore>,
    owner_id: i64,
    sessions: Mutex<HashMap<i64, CommandKind>>,
}

impl ConversationEngine {
    pub fn new(roster: Arc<RosterStore>, owner_id: i64) -> Self {
        Self {
            roster,
            owner_id,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn state_of(&self, chat_id: i64) -> SessionState {
        match self.sessions.lock().await.get(&chat_id) {
            Some(kind) => SessionState::AwaitingUserId(*kind),
            None => SessionState::Idle,
        }
    }

    /// Open (or replace) the chat's pending admin command and ask for an id.
    pub async fn begin(&self, chat_id: i64, kind: CommandKind) -> EngineReply {
        self.sessions.lock().await.insert(chat_id, kind);
        EngineReply::PromptForId(kind)
    }

    pub async fn cancel(&self, chat_id: i64) -> EngineReply {
        if self.sessions.lock().await.remove(&chat_id).is_some() {
            EngineReply::Cancelled
        } else {
            EngineReply::NothingToCancel
        }
    }

    /// Feed a plain (non-command) message into the chat's pending session.
    ///
    /// Returns `None` when the chat has no session, so the router can treat the
    /// message as ordinary chatter. Non-numeric input re-prompts and keeps the
    /// session open; everything else closes it, including roster failures, so a
    /// failed write never leaves the chat stuck waiting for an id.
    pub async fn handle_input(&self, chat_id: i64, text: &str) -> Result<Option<EngineReply>> {
        let kind = {
            let sessions = self.sessions.lock().await;
            match sessions.get(&chat_id) {
                Some(kind) => *kind,
                None => return Ok(None),
            }
        };

        let Ok(target) = text.trim().parse::<i64>() else {
            return Ok(Some(EngineReply::InvalidId(kind)));
        };

        self.sessions.lock().await.remove(&chat_id);

        if target == self.owner_id {
            return Ok(Some(EngineReply::OwnerExcluded));
        }

        let reply = match kind {
            CommandKind::Add => match self.roster.add(target, None).await? {
                AddOutcome::Added => EngineReply::Added(target),
                AddOutcome::AlreadyExists => EngineReply::AlreadyRegistered(target),
            },
            CommandKind::Delete => match self.roster.delete(target).await? {
                DeleteOutcome::Deleted => EngineReply::Deleted(target),
                DeleteOutcome::NotFound => EngineReply::NotRegistered(target),
            },
        };
        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i64 = 1;
    const CHAT: i64 = 100;

    fn engine() -> ConversationEngine {
        let roster = Arc::new(RosterStore::open_in_memory().unwrap());
        ConversationEngine::new(roster, OWNER)
    }

    #[tokio::test]
    async fn add_flow_registers_the_given_id() {
        let eng = engine();

        assert_eq!(
            eng.begin(CHAT, CommandKind::Add).await,
            EngineReply::PromptForId(CommandKind::Add)
        );
        assert_eq!(
            eng.state_of(CHAT).await,
            SessionState::AwaitingUserId(CommandKind::Add)
        );

        let reply = eng.handle_input(CHAT, "555").await.unwrap();
        assert_eq!(reply, Some(EngineReply::Added(555)));
        assert_eq!(eng.state_of(CHAT).await, SessionState::Idle);
        assert!(eng.roster.contains(555).await.unwrap());
    }

    #[tokio::test]
    async fn non_numeric_input_reprompts_and_keeps_session() {
        let eng = engine();
        eng.begin(CHAT, CommandKind::Add).await;

        let reply = eng.handle_input(CHAT, "five five five").await.unwrap();
        assert_eq!(reply, Some(EngineReply::InvalidId(CommandKind::Add)));
        assert_eq!(
            eng.state_of(CHAT).await,
            SessionState::AwaitingUserId(CommandKind::Add)
        );

        let reply = eng.handle_input(CHAT, " 777 ").await.unwrap();
        assert_eq!(reply, Some(EngineReply::Added(777)));
    }

    #[tokio::test]
    async fn duplicate_add_reports_already_registered() {
        let eng = engine();
        eng.roster.add(555, None).await.unwrap();

        eng.begin(CHAT, CommandKind::Add).await;
        let reply = eng.handle_input(CHAT, "555").await.unwrap();
        assert_eq!(reply, Some(EngineReply::AlreadyRegistered(555)));
        assert_eq!(eng.roster.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_flow_removes_or_reports_missing() {
        let eng = engine();
        eng.roster.add(9, None).await.unwrap();

        eng.begin(CHAT, CommandKind::Delete).await;
        let reply = eng.handle_input(CHAT, "9").await.unwrap();
        assert_eq!(reply, Some(EngineReply::Deleted(9)));

        eng.begin(CHAT, CommandKind::Delete).await;
        let reply = eng.handle_input(CHAT, "9").await.unwrap();
        assert_eq!(reply, Some(EngineReply::NotRegistered(9)));
    }

    #[tokio::test]
    async fn owner_id_is_refused() {
        let eng = engine();
        eng.begin(CHAT, CommandKind::Add).await;

        let reply = eng.handle_input(CHAT, &OWNER.to_string()).await.unwrap();
        assert_eq!(reply, Some(EngineReply::OwnerExcluded));
        assert_eq!(eng.state_of(CHAT).await, SessionState::Idle);
        assert!(!eng.roster.contains(OWNER).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_clears_pending_command() {
        let eng = engine();
        eng.begin(CHAT, CommandKind::Delete).await;

        assert_eq!(eng.cancel(CHAT).await, EngineReply::Cancelled);
        assert_eq!(eng.state_of(CHAT).await, SessionState::Idle);
        assert_eq!(eng.handle_input(CHAT, "5").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cancel_when_idle_reports_nothing_to_cancel() {
        let eng = engine();
        assert_eq!(eng.cancel(CHAT).await, EngineReply::NothingToCancel);
    }

    #[tokio::test]
    async fn second_command_replaces_the_first() {
        let eng = engine();
        eng.roster.add(3, None).await.unwrap();

        eng.begin(CHAT, CommandKind::Add).await;
        eng.begin(CHAT, CommandKind::Delete).await;
        assert_eq!(
            eng.state_of(CHAT).await,
            SessionState::AwaitingUserId(CommandKind::Delete)
        );

        let reply = eng.handle_input(CHAT, "3").await.unwrap();
        assert_eq!(reply, Some(EngineReply::Deleted(3)));
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_chat() {
        let eng = engine();
        eng.begin(CHAT, CommandKind::Add).await;

        assert_eq!(eng.handle_input(CHAT + 1, "42").await.unwrap(), None);
        assert_eq!(
            eng.state_of(CHAT).await,
            SessionState::AwaitingUserId(CommandKind::Add)
        );
        assert!(!eng.roster.contains(42).await.unwrap());
    }

    #[tokio::test]
    async fn input_without_session_is_ignored() {
        let eng = engine();
        assert_eq!(eng.handle_input(CHAT, "hello").await.unwrap(), None);
    }
}
