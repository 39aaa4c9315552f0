//! All user-facing reply texts, as Telegram HTML.
//!
//! Centralized so the router and the dispatcher stay free of formatting and
//! tests can assert on stable strings.

use crate::{
    access::{BotCommand, Role},
    conversation::CommandKind,
    formatting::{escape_html, format_duration},
};

pub fn greeting(name: Option<&str>, role: Role) -> String {
    let name = match name {
        Some(n) if !n.is_empty() => escape_html(n),
        _ => "there".to_string(),
    };
    format!(
        "👋 Hello, <b>{name}</b>!\n\n\
I watch this server and send a message when it comes back online.\n\n\
{}",
        help_for(role)
    )
}

pub fn help_for(role: Role) -> String {
    let mut lines = vec![
        "📋 <b>Commands:</b>".to_string(),
        "/start - Greeting and this command list".to_string(),
        "/help - Show this command list".to_string(),
        "/id - Show your Telegram id".to_string(),
    ];

    match role {
        Role::Owner => {
            lines.push("/check - Current server status".to_string());
            lines.push("/add_user - Register a notification recipient".to_string());
            lines.push("/delete_user - Remove a notification recipient".to_string());
            lines.push("/cancel - Abort the current admin command".to_string());
        }
        Role::Registered => {
            lines.push("/check - Current server status".to_string());
        }
        Role::Unregistered => {
            lines.push(String::new());
            lines.push(
                "💡 To receive notifications, send your id (see /id) to the bot owner."
                    .to_string(),
            );
        }
    }

    lines.join("\n")
}

pub fn id_reply(user_id: i64) -> String {
    format!("🆔 Your Telegram id: <code>{user_id}</code>")
}

pub fn check_reply(snapshot: &str) -> String {
    format!(
        "🖥 <b>Server status</b>\n\n<pre>{}</pre>",
        escape_html(snapshot)
    )
}

/// Startup broadcast body. `downtime_secs` comes from the heartbeat file and
/// is only an estimate, so it is labelled as such.
pub fn recovery_notice(downtime_secs: Option<i64>) -> String {
    let mut body = "✅ <b>Back online</b>\nThe server is up and the bot is running again."
        .to_string();
    if let Some(secs) = downtime_secs {
        body.push_str(&format!(
            "\nEstimated downtime: <b>{}</b>",
            format_duration(secs)
        ));
    }
    body
}

fn kind_verb(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::Add => "add",
        CommandKind::Delete => "remove",
    }
}

pub fn prompt_for_id(kind: CommandKind) -> String {
    format!(
        "Send the numeric Telegram id of the user to {}, or /cancel.",
        kind_verb(kind)
    )
}

pub fn reprompt_invalid_id(kind: CommandKind) -> String {
    format!(
        "⚠️ That doesn't look like a numeric id. Send the id of the user to {} (digits only), or /cancel.",
        kind_verb(kind)
    )
}

pub fn cancelled() -> String {
    "🚫 Command cancelled.".to_string()
}

pub fn nothing_to_cancel() -> String {
    "Nothing to cancel.".to_string()
}

pub fn owner_excluded() -> String {
    "The owner always receives notifications and cannot be added to the roster.".to_string()
}

pub fn added(id: i64) -> String {
    format!("✅ Added <code>{id}</code> to the notification roster.")
}

pub fn already_registered(id: i64) -> String {
    format!("<code>{id}</code> is already on the notification roster.")
}

pub fn deleted(id: i64) -> String {
    format!("✅ Removed <code>{id}</code> from the notification roster.")
}

pub fn not_registered(id: i64) -> String {
    format!("<code>{id}</code> is not on the notification roster.")
}

pub fn admin_command_failed() -> String {
    "❌ Something went wrong, the roster was not changed. Please try again.".to_string()
}

pub fn unauthorized(cmd: BotCommand) -> String {
    format!("🚫 You are not allowed to use {}.", cmd.as_str())
}

pub fn unknown_command() -> String {
    "🤔 Unknown command. /help lists what I understand.".to_string()
}
