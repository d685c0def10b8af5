use teloxide::prelude::*;
use std::error::Error;

use crate::bot_state::BotState;
use crate::handlers::utils::send_reply;
use crate::models::Resolution;
use crate::Command;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat = msg.chat.id.0;

    // команда, начинающая диалог, заменяет незавершённый; /start, /help и /users_list его не трогают
    let reply = state
        .run(|flow| match cmd {
            Command::Start => flow.start(chat),
            Command::Help => flow.help(chat),
            Command::AddBouquet => flow.add_bouquet(chat),
            Command::AddLostFlowers => flow.add_lost_flowers(chat),
            Command::SellBouquet => flow.begin_resolve(chat, Resolution::Sold),
            Command::LostBouquet => flow.begin_resolve(chat, Resolution::Lost),
            Command::Report => flow.report(chat),
            Command::AddUser => flow.add_user(chat),
            Command::DelUser => flow.del_user(chat),
            Command::UsersList => flow.users_list(chat),
            Command::Cancel => flow.cancel(chat),
        })
        .await;

    send_reply(&bot, msg.chat.id, reply).await
}
