use teloxide::prelude::*;
use std::error::Error;

use crate::bot_state::BotState;
use crate::flow::resolve::ResolveToken;
use crate::handlers::utils::{send_reply, CANCEL_DATA};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    bot.answer_callback_query(q.id.clone()).await?;

    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    match data {
        CANCEL_DATA => {
            let reply = state.run(|flow| flow.cancel(chat_id.0)).await;
            send_reply(&bot, chat_id, reply).await?;
        }

        data if ResolveToken::matches(data) => {
            match state.run(|flow| flow.select(chat_id.0, data)).await {
                Ok(reply) => {
                    // убираем кнопки, чтобы по ним не нажимали повторно
                    if let Err(e) = bot.edit_message_reply_markup(chat_id, message_id).await {
                        log::warn!("⚠️ Could not remove options keyboard: {}", e);
                    }
                    send_reply(&bot, chat_id, reply).await?;
                }
                Err(e) => {
                    log::error!("❌ Error resolving bouquet for {}: {}", chat_id, e);
                    bot.send_message(chat_id, format!("⚠️ Произошла ошибка: {}", e))
                        .await?;
                }
            }
        }

        other => {
            log::warn!("⚠️ Unknown callback data {:?} from {}", other, chat_id);
        }
    }

    Ok(())
}
