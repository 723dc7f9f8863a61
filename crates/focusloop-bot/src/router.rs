//! Event dispatch: commands first, then button labels, then free text.
//!
//! Commands always win, so a stray "/week" typed mid-onboarding is never
//! swallowed as an answer.

use chrono::{DateTime, Utc};
use focusloop_core::ChatId;

use crate::handlers::{self, BotContext};
use crate::keyboards;
use crate::telegram::OutboundMessage;
use crate::texts;

type Handler = fn(&BotContext, ChatId, &str, DateTime<Utc>) -> Vec<OutboundMessage>;

/// Routing table from command names and button labels to handlers.
/// Built once at startup.
pub struct Router {
    commands: Vec<(&'static str, Handler)>,
    buttons: Vec<(&'static str, Handler)>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            commands: vec![
                ("start", handlers::start),
                ("reset", handlers::reset),
                ("help", handlers::help),
                ("focus", handlers::focus),
                ("week", handlers::week),
                ("streak", handlers::streak),
                ("done", handlers::done_command),
                ("partial", handlers::partial_command),
                ("fail", handlers::fail_command),
            ],
            buttons: vec![
                (keyboards::BTN_DONE, handlers::done_button),
                (keyboards::BTN_PARTIAL, handlers::partial_button),
                (keyboards::BTN_FAILED, handlers::failed_button),
                (keyboards::BTN_CHECKIN, handlers::checkin_button),
            ],
        }
    }

    /// Route one incoming text to its handler and collect the replies.
    pub fn dispatch(
        &self,
        ctx: &BotContext,
        chat_id: ChatId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Vec<OutboundMessage> {
        let trimmed = text.trim();

        if let Some(rest) = trimmed.strip_prefix('/') {
            let (token, args) = match rest.split_once(char::is_whitespace) {
                Some((token, args)) => (token, args.trim()),
                None => (rest, ""),
            };
            // Group menus append the bot's username to the command
            let name = match token.split_once('@') {
                Some((name, _)) => name,
                None => token,
            };
            for (command, handler) in &self.commands {
                if *command == name {
                    return handler(ctx, chat_id, args, now);
                }
            }
            return vec![OutboundMessage::text(chat_id, texts::FALLBACK)];
        }

        for (label, handler) in &self.buttons {
            if *label == trimmed {
                return handler(ctx, chat_id, "", now);
            }
        }

        handlers::free_text(ctx, chat_id, trimmed, now)
    }
}
