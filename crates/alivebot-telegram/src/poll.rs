//! Long-polling entry point.
//!
//! Wires the bot to the core router, registers the command menu and spawns
//! the one-shot recovery broadcast before updates start flowing.

use std::{sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};
use tracing::{info, warn};

use alivebot_core::{
    config::Config,
    conversation::ConversationEngine,
    dispatch::NotificationDispatcher,
    domain::{ChatId, UserId},
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
        types::IncomingMessage,
    },
    roster::RosterStore,
    router::UpdateRouter,
    runtime::RuntimeInfoProvider,
    texts,
};

use crate::TelegramMessenger;

pub async fn run_polling(
    cfg: Arc<Config>,
    roster: Arc<RosterStore>,
    engine: Arc<ConversationEngine>,
    runtime: Arc<dyn RuntimeInfoProvider>,
    downtime: Option<Duration>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!("alivebot started: @{}", me.username());
    }

    let menu = vec![
        BotCommand::new("start", "Greeting and command list"),
        BotCommand::new("help", "Show the command list"),
        BotCommand::new("id", "Show your Telegram id"),
        BotCommand::new("check", "Current server status"),
    ];
    if let Err(e) = bot.set_my_commands(menu).await {
        warn!("set_my_commands failed: {e}");
    }

    // Outbound calls go through the throttle so the startup fan-out cannot
    // trip Telegram flood control. RetryAfter handling stays in the adapter.
    let raw: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> =
        Arc::new(ThrottledMessenger::new(raw, ThrottleConfig::default()));

    // Recovery notice fan-out, off the polling path. The short delay gives
    // Telegram a moment to settle after get_me on flaky links.
    let dispatcher = NotificationDispatcher::new(messenger.clone(), roster.clone(), &cfg);
    let downtime_secs = downtime.map(|d| d.as_secs() as i64);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        dispatcher
            .dispatch(&texts::recovery_notice(downtime_secs))
            .await;
    });

    let router = Arc::new(UpdateRouter::new(&cfg, messenger, roster, engine, runtime));

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, router: Arc<UpdateRouter>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let sender = msg.from().map(|u| UserId(u.id.0 as i64));
    let sender_name = msg
        .from()
        .map(|u| u.username.clone().unwrap_or_else(|| u.first_name.clone()));

    let incoming = IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        sender,
        sender_name,
        text: text.to_string(),
    };

    router.handle_message(incoming).await;
    Ok(())
}
