use crate::{domain::UserId, roster::RosterStore, Result};

// ============== Roles ==============

/// What a sender is allowed to do. Resolved fresh for every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Registered,
    Unregistered,
}

impl Role {
    /// Resolve the sender's role. The owner id comes from config and wins over
    /// roster membership, so the owner can never be demoted by a roster edit.
    pub async fn resolve(
        sender: Option<UserId>,
        owner_id: i64,
        roster: &RosterStore,
    ) -> Result<Role> {
        let Some(sender) = sender else {
            return Ok(Role::Unregistered);
        };
        if sender.0 == owner_id {
            return Ok(Role::Owner);
        }
        if roster.contains(sender.0).await? {
            return Ok(Role::Registered);
        }
        Ok(Role::Unregistered)
    }
}

// ============== Commands ==============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Id,
    Check,
    AddUser,
    DeleteUser,
    Cancel,
}

impl BotCommand {
    /// Parse the leading command word. Telegram may send `/cmd@botname arg1 ...`;
    /// arguments are ignored because every admin flow prompts for its input.
    pub fn parse(text: &str) -> Option<BotCommand> {
        let first = text.trim().split_whitespace().next().unwrap_or("");
        if !first.starts_with('/') {
            return None;
        }

        let cmd = first
            .trim_start_matches('/')
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();

        match cmd.as_str() {
            "start" => Some(BotCommand::Start),
            "help" => Some(BotCommand::Help),
            "id" => Some(BotCommand::Id),
            "check" => Some(BotCommand::Check),
            "add_user" => Some(BotCommand::AddUser),
            "delete_user" => Some(BotCommand::DeleteUser),
            "cancel" => Some(BotCommand::Cancel),
            _ => None,
        }
    }

    pub fn allowed_for(self, role: Role) -> bool {
        match role {
            Role::Owner => true,
            Role::Registered => matches!(
                self,
                BotCommand::Start | BotCommand::Help | BotCommand::Id | BotCommand::Check
            ),
            Role::Unregistered => {
                matches!(self, BotCommand::Start | BotCommand::Help | BotCommand::Id)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BotCommand::Start => "/start",
            BotCommand::Help => "/help",
            BotCommand::Id => "/id",
            BotCommand::Check => "/check",
            BotCommand::AddUser => "/add_user",
            BotCommand::DeleteUser => "/delete_user",
            BotCommand::Cancel => "/cancel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_variants() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("/CHECK"), Some(BotCommand::Check));
        assert_eq!(
            BotCommand::parse("/add_user@alivebot 123"),
            Some(BotCommand::AddUser)
        );
        assert_eq!(BotCommand::parse("  /cancel  "), Some(BotCommand::Cancel));
        assert_eq!(BotCommand::parse("/frobnicate"), None);
        assert_eq!(BotCommand::parse("hello"), None);
        assert_eq!(BotCommand::parse(""), None);
    }

    #[test]
    fn role_gates_commands() {
        for cmd in [
            BotCommand::Start,
            BotCommand::Help,
            BotCommand::Id,
            BotCommand::Check,
            BotCommand::AddUser,
            BotCommand::DeleteUser,
            BotCommand::Cancel,
        ] {
            assert!(cmd.allowed_for(Role::Owner));
        }

        assert!(BotCommand::Check.allowed_for(Role::Registered));
        assert!(!BotCommand::AddUser.allowed_for(Role::Registered));
        assert!(!BotCommand::DeleteUser.allowed_for(Role::Registered));
        assert!(!BotCommand::Cancel.allowed_for(Role::Registered));

        assert!(BotCommand::Id.allowed_for(Role::Unregistered));
        assert!(!BotCommand::Check.allowed_for(Role::Unregistered));
        assert!(!BotCommand::AddUser.allowed_for(Role::Unregistered));
    }

    #[tokio::test]
    async fn resolves_owner_before_roster() {
        let roster = RosterStore::open_in_memory().unwrap();
        roster.add(10, None).await.unwrap();

        let role = Role::resolve(Some(UserId(10)), 10, &roster).await.unwrap();
        assert_eq!(role, Role::Owner);
    }

    #[tokio::test]
    async fn resolves_registered_and_unregistered() {
        let roster = RosterStore::open_in_memory().unwrap();
        roster.add(20, None).await.unwrap();

        assert_eq!(
            Role::resolve(Some(UserId(20)), 1, &roster).await.unwrap(),
            Role::Registered
        );
        assert_eq!(
            Role::resolve(Some(UserId(30)), 1, &roster).await.unwrap(),
            Role::Unregistered
        );
        assert_eq!(
            Role::resolve(None, 1, &roster).await.unwrap(),
            Role::Unregistered
        );
    }
}
