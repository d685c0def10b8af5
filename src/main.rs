use anyhow::Context;
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};

mod access;
mod bot_state;
mod config;
mod database;
mod flow;
mod handlers;
mod models;
mod report;

use crate::access::AccessControl;
use crate::bot_state::BotState;
use crate::config::Config;
use crate::database::{FileBackend, Records};
use crate::flow::Coordinator;
use crate::handlers::{callback_handler, command_handler, message_handler};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "начать работу с ботом")]
    Start,
    #[command(description = "показать помощь")]
    Help,
    #[command(description = "добавить букет")]
    AddBouquet,
    #[command(description = "зарегистрировать пропавшие цветы")]
    AddLostFlowers,
    #[command(description = "отметить проданный букет")]
    SellBouquet,
    #[command(description = "отметить пропавший букет")]
    LostBouquet,
    #[command(description = "отчет (только для администраторов)")]
    Report,
    #[command(description = "добавить пользователя (только для администраторов)")]
    AddUser,
    #[command(description = "удалить пользователя (только для администраторов)")]
    DelUser,
    #[command(description = "список пользователей (только для администраторов)")]
    UsersList,
    #[command(description = "отменить текущее действие")]
    Cancel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Загружаем .env и инициализируем логирование
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting flower shop bot...");

    let config = Config::from_env().context("invalid configuration")?;

    let backend = FileBackend::new(&config.data_dir)
        .with_context(|| format!("cannot create data directory {}", config.data_dir.display()))?;
    log::info!("📁 Data directory: {}", backend.dir().display());

    let records = Records::load(Arc::new(backend)).context("failed to load records")?;
    let access = AccessControl::new(config.admin_ids.iter().cloned());
    let coordinator = Coordinator::new(records, access, config.report_path());
    let state = BotState::new(coordinator);

    let bot = Bot::new(config.bot_token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("⚠️ Could not register command list: {}", e);
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    log::info!("🚀 Starting dispatcher...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
