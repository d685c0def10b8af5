use std::error::Error;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile};

use crate::flow::{Reply, ReplyOption};

pub const CANCEL_DATA: &str = "cancel";

// Ограничение Telegram ~4096 символов
const MAX_MESSAGE_CHARS: usize = 3800;
const OPTIONS_PER_ROW: usize = 5;

/// Кнопка отмены под вопросом
pub fn cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Отмена",
        CANCEL_DATA,
    )]])
}

/// Пронумерованные варианты по пять в ряд и отмена последней строкой
pub fn options_keyboard(options: &[ReplyOption]) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = options
        .chunks(OPTIONS_PER_ROW)
        .map(|row| {
            row.iter()
                .map(|option| InlineKeyboardButton::callback(option.label.clone(), option.token.clone()))
                .collect()
        })
        .collect();

    keyboard.push(vec![InlineKeyboardButton::callback("Отмена", CANCEL_DATA)]);
    InlineKeyboardMarkup::new(keyboard)
}

/// Обрезает слишком длинный текст
pub fn fit_message(text: String) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text;
    }
    let mut short: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
    short.push_str("\n\n[Сообщение было сокращено]");
    short
}

pub async fn send_reply(
    bot: &Bot,
    chat_id: ChatId,
    reply: Reply,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match reply {
        Reply::Text(text) => {
            bot.send_message(chat_id, fit_message(text)).await?;
        }
        Reply::Prompt(text) => {
            bot.send_message(chat_id, fit_message(text))
                .reply_markup(cancel_keyboard())
                .await?;
        }
        Reply::Options { text, options } => {
            bot.send_message(chat_id, fit_message(text))
                .reply_markup(options_keyboard(&options))
                .await?;
        }
        Reply::Document { path, caption } => {
            bot.send_document(chat_id, InputFile::file(path))
                .caption(caption)
                .await?;
        }
    }
    Ok(())
}
