//! Telegram transport
//!
//! Inbound updates become [`Inbound`] events for the session manager;
//! outbound prompts go through [`TelegramOutlet`]. Only private chats are
//! served and the chat id is the participant id.

use crate::access::ParticipantId;
use crate::runtime::{ChatOutlet, DeliveryError, Inbound, MessageRef, ProductionManager};
use crate::state_machine::prompt::Choice;
use crate::state_machine::{Button, Command, Event, Markup, Prompt};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    KeyboardRemove, MessageId, ParseMode, ReplyMarkup,
};
use teloxide::{ApiError, RequestError};

/// Telegram rejects callback data longer than this
const MAX_CALLBACK_BYTES: usize = 64;

/// Outbound side of the Telegram transport
#[derive(Clone)]
pub struct TelegramOutlet {
    bot: Bot,
}

impl TelegramOutlet {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatOutlet for TelegramOutlet {
    async fn send(&self, to: ParticipantId, prompt: &Prompt) -> Result<MessageRef, DeliveryError> {
        let mut request = self
            .bot
            .send_message(ChatId(to.0), prompt.text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = reply_markup(&prompt.markup) {
            request = request.reply_markup(markup);
        }
        let message = request.await.map_err(delivery_error)?;
        Ok(MessageRef(message.id.0))
    }

    async fn edit(
        &self,
        to: ParticipantId,
        message: MessageRef,
        prompt: &Prompt,
    ) -> Result<(), DeliveryError> {
        // Only inline keyboards survive an edit; anything else needs a new message
        let inline = match &prompt.markup {
            Markup::None => None,
            Markup::Buttons(rows) => Some(inline_keyboard(rows)),
            Markup::Suggestions(_) | Markup::RemoveSuggestions => {
                return Err(DeliveryError::NotEditable)
            }
        };
        let mut request = self
            .bot
            .edit_message_text(ChatId(to.0), MessageId(message.0), prompt.text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = inline {
            request = request.reply_markup(markup);
        }
        request.await.map_err(delivery_error)?;
        Ok(())
    }
}

fn reply_markup(markup: &Markup) -> Option<ReplyMarkup> {
    match markup {
        Markup::None => None,
        Markup::Buttons(rows) => Some(ReplyMarkup::InlineKeyboard(inline_keyboard(rows))),
        Markup::Suggestions(rows) => Some(ReplyMarkup::Keyboard(
            KeyboardMarkup::new(
                rows.iter()
                    .map(|row| row.iter().map(KeyboardButton::new).collect::<Vec<_>>()),
            )
            .one_time_keyboard()
            .resize_keyboard(),
        )),
        Markup::RemoveSuggestions => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
    }
}

fn inline_keyboard(rows: &[Vec<Choice>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .filter_map(|choice| {
                let payload = choice.button.payload();
                if payload.len() > MAX_CALLBACK_BYTES {
                    tracing::warn!(
                        label = %choice.label,
                        payload = %payload,
                        "Callback data too long, button dropped"
                    );
                    return None;
                }
                Some(InlineKeyboardButton::callback(choice.label.clone(), payload))
            })
            .collect::<Vec<_>>()
    }))
}

fn delivery_error(error: RequestError) -> DeliveryError {
    match error {
        RequestError::Api(ApiError::MessageNotModified) => DeliveryError::Unchanged,
        RequestError::Api(ApiError::MessageCantBeEdited | ApiError::MessageToEditNotFound) => {
            DeliveryError::NotEditable
        }
        RequestError::Api(
            api @ (ApiError::BotBlocked | ApiError::ChatNotFound | ApiError::UserDeactivated),
        ) => DeliveryError::Unreachable(api.to_string()),
        other => DeliveryError::Transport(other.to_string()),
    }
}

/// Run the long-polling dispatcher until Ctrl-C
pub async fn run(bot: Bot, manager: Arc<ProductionManager>) {
    let commands = vec![
        BotCommand::new("start", "Agendar um horário"),
        BotCommand::new("cancelar", "Cancelar a operação atual"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        tracing::warn!(error = %e, "Could not register bot commands");
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    tracing::info!("Telegram dispatcher started");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![manager])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    tracing::info!("Telegram dispatcher stopped");
}

async fn on_message(msg: Message, manager: Arc<ProductionManager>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        tracing::debug!(chat = msg.chat.id.0, "Ignoring message outside a private chat");
        return Ok(());
    }
    let Some(text) = msg.text() else {
        tracing::debug!(chat = msg.chat.id.0, "Ignoring message without text");
        return Ok(());
    };

    let participant = ParticipantId(msg.chat.id.0);
    manager
        .dispatch(Inbound::new(participant, text_event(text), None))
        .await;
    Ok(())
}

async fn on_callback(
    bot: Bot,
    q: CallbackQuery,
    manager: Arc<ProductionManager>,
) -> ResponseResult<()> {
    let button = q.data.as_deref().and_then(Button::decode);
    let answer = bot.answer_callback_query(q.id.clone());

    let Some(button) = button else {
        tracing::warn!(data = ?q.data, "Unknown callback payload");
        answer.text("Opção expirada").await?;
        return Ok(());
    };
    // Stop the client's loading spinner before the work starts
    answer.await?;

    let (participant, origin) = match &q.message {
        Some(message) => {
            if !message.chat().is_private() {
                return Ok(());
            }
            (
                ParticipantId(message.chat().id.0),
                Some(MessageRef(message.id().0)),
            )
        }
        None => match i64::try_from(q.from.id.0) {
            Ok(id) => (ParticipantId(id), None),
            Err(_) => return Ok(()),
        },
    };

    manager
        .dispatch(Inbound::new(participant, Event::Button(button), origin))
        .await;
    Ok(())
}

fn text_event(text: &str) -> Event {
    match Command::parse(text) {
        Some(command) => Event::Command(command),
        None => Event::Text(text.to_string()),
    }
}
