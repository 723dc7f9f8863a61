//! The long-running daemon loop.
//!
//! One task long-polls Telegram into a channel; the main loop serializes
//! update handling and the periodic reminder tick over the single
//! database connection. Reminder markers are stamped only after a
//! message actually goes out, so failed sends come back on the next
//! tick.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use focusloop_core::scheduler::{self, EveningKind, EveningNudge, MorningNudge};
use focusloop_core::{Config, Database};

use crate::handlers::BotContext;
use crate::keyboards;
use crate::router::Router;
use crate::telegram::{self, OutboundMessage, TelegramClient, Update};
use crate::texts;

pub async fn run(config: Config, db: Database) -> Result<(), Box<dyn std::error::Error>> {
    let token = config.bot_token()?;
    let client = TelegramClient::new(
        &config.telegram.api_base,
        &token,
        config.telegram.poll_timeout_secs,
    );

    client.set_my_commands(&texts::COMMAND_MENU).await?;

    let ctx = BotContext { db };
    let router = Router::new();

    let cancel = CancellationToken::new();

    // SIGTERM/SIGINT flip the token; everything drains from there.
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("shutdown signal received");
        shutdown_cancel.cancel();
    });

    let (tx, mut rx) = mpsc::channel::<Update>(64);
    let poll_client = client.clone();
    let poll_cancel = cancel.clone();
    tokio::spawn(async move {
        telegram::poll_updates(poll_client, tx, poll_cancel).await;
    });

    let mut timer = tokio::time::interval(Duration::from_secs(config.reminders.tick_secs));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Skip the first immediate tick.
    timer.tick().await;

    info!("focusloop bot is up");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            update = rx.recv() => match update {
                Some(update) => handle_update(&ctx, &router, &client, update).await,
                None => break,
            },

            _ = timer.tick() => {
                run_reminder_passes(&ctx, &client, Utc::now()).await;
            }
        }
    }

    info!("focusloop bot stopped");
    Ok(())
}

async fn handle_update(ctx: &BotContext, router: &Router, client: &TelegramClient, update: Update) {
    let Some(message) = update.message else { return };
    let Some(text) = message.text else { return };
    let chat_id = message.chat.id;

    for reply in router.dispatch(ctx, chat_id, &text, Utc::now()) {
        if let Err(e) = client.send_message(&reply).await {
            warn!(chat_id, err = %e, "failed to send reply");
        }
    }
}

async fn run_reminder_passes(ctx: &BotContext, client: &TelegramClient, now: DateTime<Utc>) {
    match scheduler::plan_morning(&ctx.db, now) {
        Ok(pass) => {
            // Quiet slots get their marker without a message.
            let mut marks = pass.silent;
            for nudge in &pass.nudges {
                match client.send_message(&morning_message(nudge)).await {
                    Ok(()) => marks.push(nudge.mark()),
                    Err(e) => {
                        warn!(chat_id = nudge.chat_id, err = %e, "morning reminder failed, will retry next tick");
                    }
                }
            }
            if !marks.is_empty() {
                if let Err(e) = ctx.db.mark_morning_sent(&marks) {
                    warn!(err = %e, "failed to stamp morning reminders");
                }
            }
        }
        Err(e) => warn!(err = %e, "morning planning failed"),
    }

    match scheduler::plan_evening(&ctx.db, now) {
        Ok(pass) => {
            let mut marks = Vec::new();
            for nudge in &pass.nudges {
                match client.send_message(&evening_message(nudge)).await {
                    Ok(()) => marks.push(nudge.mark()),
                    Err(e) => {
                        warn!(chat_id = nudge.chat_id, err = %e, "evening reminder failed, will retry next tick");
                    }
                }
            }
            if !marks.is_empty() {
                if let Err(e) = ctx.db.mark_evening_sent(&marks) {
                    warn!(err = %e, "failed to stamp evening reminders");
                }
            }
        }
        Err(e) => warn!(err = %e, "evening planning failed"),
    }
}

fn morning_message(nudge: &MorningNudge) -> OutboundMessage {
    OutboundMessage::text(
        nudge.chat_id,
        texts::morning_nudge(&nudge.name, &nudge.focus_title),
    )
}

fn evening_message(nudge: &EveningNudge) -> OutboundMessage {
    match nudge.kind {
        EveningKind::Summary(status) => {
            OutboundMessage::text(nudge.chat_id, texts::evening_summary(&nudge.name, status))
        }
        EveningKind::Prompt => OutboundMessage::with_keyboard(
            nudge.chat_id,
            texts::evening_prompt(&nudge.name),
            keyboards::checkin(),
        ),
    }
}
