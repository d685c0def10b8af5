use teloxide::prelude::*;
use std::error::Error;

use crate::bot_state::BotState;
use crate::handlers::utils::send_reply;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Пожалуйста, отправьте текстовое сообщение.")
            .await?;
        return Ok(());
    };

    // Известные команды уже обработаны в command_handler
    if text.starts_with('/') {
        bot.send_message(msg.chat.id, "Неизвестная команда. Используйте /help для справки.")
            .await?;
        return Ok(());
    }

    let chat = msg.chat.id.0;
    match state.run(|flow| flow.handle_text(chat, text)).await {
        Ok(reply) => send_reply(&bot, msg.chat.id, reply).await,
        Err(e) => {
            log::error!("❌ Error handling message from {}: {}", chat, e);
            bot.send_message(msg.chat.id, format!("⚠️ Произошла ошибка: {}", e))
                .await?;
            Ok(())
        }
    }
}
