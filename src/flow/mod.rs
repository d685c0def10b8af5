//! Диалоги бота: кто чего ждёт и что делать с очередным сообщением.
//!
//! Каждый чат имеет не больше одного ожидания ([`Awaiting`]). Команда
//! начинает диалог (заменяя прежний без предупреждения), текстовое сообщение
//! продвигает его. Неверный ввод оставляет чат в том же состоянии, пока не
//! придёт корректный ответ или отмена.

pub mod parsing;
pub mod resolve;
mod users;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Duration, Local, NaiveDateTime};
use thiserror::Error;

use crate::access::{AccessControl, ACCESS_DENIED};
use crate::database::{Records, StoreError};
use crate::models::{Awaiting, Bouquet, Composition, Resolution, Role};
use crate::report;

use self::parsing::{parse_flower_lines, parse_price};

pub const FORMAT_HINT: &str =
    "Введите состав букета в формате \nцвет1 количество1 \nцвет2 количество2 \nи т.д.";
const FORMAT_ERROR: &str =
    "Некорректный формат ввода. \nИспользуйте формат: \nцвет1 количество1 \nцвет2 количество2 \nи т.д.";

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Что отправить в чат в ответ
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    /// Вопрос, на который ждём ответ; показывается с кнопкой отмены
    Prompt(String),
    /// Текст с пронумерованными вариантами
    Options {
        text: String,
        options: Vec<ReplyOption>,
    },
    Document {
        path: PathBuf,
        caption: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyOption {
    pub label: String,
    pub token: String,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn prompt(text: impl Into<String>) -> Self {
        Reply::Prompt(text.into())
    }
}

/// Результат одного шага: ответ и следующее ожидание (если диалог продолжается)
struct Step {
    reply: Reply,
    next: Option<Awaiting>,
}

impl Step {
    fn done(reply: Reply) -> Self {
        Self { reply, next: None }
    }

    fn then(reply: Reply, next: Awaiting) -> Self {
        Self {
            reply,
            next: Some(next),
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Формат ключей-меток времени (как `datetime.isoformat()`)
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

pub struct Coordinator {
    records: Records,
    access: AccessControl,
    sessions: HashMap<i64, Awaiting>,
    clock: Box<dyn Clock>,
    report_path: PathBuf,
}

impl Coordinator {
    pub fn new(records: Records, access: AccessControl, report_path: PathBuf) -> Self {
        Self {
            records,
            access,
            sessions: HashMap::new(),
            clock: Box::new(SystemClock),
            report_path,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn session(&self, chat: i64) -> Option<&Awaiting> {
        self.sessions.get(&chat)
    }

    fn permits(&self, chat: i64, required: Role) -> bool {
        let allowed = self
            .access
            .permits(&self.records.users, &chat.to_string(), required);
        if !allowed {
            log::warn!("🚫 Chat {} denied ({:?} required)", chat, required);
        }
        allowed
    }

    fn is_admin(&self, chat: i64) -> bool {
        self.access.is_admin(&self.records.users, &chat.to_string())
    }

    fn now(&self) -> String {
        format_timestamp(self.clock.now())
    }

    /// Текущая метка времени, сдвинутая вперёд, пока `is_taken` её отвергает
    fn unique_timestamp(&self, is_taken: impl Fn(&str) -> bool) -> String {
        let mut at = self.clock.now();
        loop {
            let key = format_timestamp(at);
            if !is_taken(&key) {
                return key;
            }
            at += Duration::microseconds(1);
        }
    }

    fn begin(&mut self, chat: i64, awaiting: Awaiting, prompt: &str) -> Reply {
        self.sessions.insert(chat, awaiting);
        Reply::prompt(prompt)
    }

    pub fn start(&self, chat: i64) -> Reply {
        log::info!("👋 /start from {}", chat);
        Reply::text("Привет! Этот бот для цветочного магазина. Используйте /help для справки.")
    }

    pub fn help(&self, chat: i64) -> Reply {
        let mut text = String::from(
            "Этот бот предназначен для учета цветов в цветочном магазине.\n\
             Доступные команды:\n\n\
             /start - приветствие\n\
             /help - эта справка\n\
             /add_bouquet - добавить новый букет\n\
             /add_lost_flowers - зарегистрировать пропавшие цветы\n\
             /sell_bouquet - отметить проданный букет\n\
             /lost_bouquet - отметить пропавший букет\n\
             /cancel - отменить текущее действие\n",
        );
        if self.is_admin(chat) {
            text.push_str(
                "\nТолько для администраторов:\n\
                 /report - отчет по букетам и пропавшим цветам\n\
                 /add_user - добавить пользователя\n\
                 /del_user - удалить пользователя\n\
                 /users_list - список администраторов и пользователей\n",
            );
        }
        text.push_str("\nПожалуйста, вводите команды в точности так, как они указаны.");
        Reply::Text(text)
    }

    pub fn cancel(&mut self, chat: i64) -> Reply {
        match self.sessions.remove(&chat) {
            Some(awaiting) => {
                log::info!("↩️ Chat {} cancelled {:?}", chat, awaiting);
                Reply::text("Действие отменено.")
            }
            None => Reply::text("Нечего отменять."),
        }
    }

    pub fn add_bouquet(&mut self, chat: i64) -> Reply {
        if !self.permits(chat, Role::User) {
            return Reply::text(ACCESS_DENIED);
        }

        // ключ букета уникален среди всех владельцев: по нему букет ищется при продаже
        let owner = chat.to_string();
        let bouquets = &self.records.bouquets;
        let bouquet_key =
            self.unique_timestamp(|key| bouquets.values().any(|owned| owned.contains_key(key)));
        self.records
            .bouquets
            .entry(owner)
            .or_default()
            .insert(bouquet_key.clone(), Bouquet::new());

        self.begin(
            chat,
            Awaiting::BouquetPrice { bouquet_key },
            "Введите стоимость нового букета:",
        )
    }

    pub fn add_lost_flowers(&mut self, chat: i64) -> Reply {
        if !self.permits(chat, Role::User) {
            return Reply::text(ACCESS_DENIED);
        }

        let taken = self.records.lost_flowers.get(&chat.to_string());
        let timestamp =
            self.unique_timestamp(|key| taken.is_some_and(|events| events.contains_key(key)));
        self.begin(chat, Awaiting::LostFlowers { timestamp }, FORMAT_HINT)
    }

    pub fn begin_resolve(&mut self, chat: i64, resolution: Resolution) -> Reply {
        if !self.permits(chat, Role::User) {
            return Reply::text(ACCESS_DENIED);
        }
        self.begin(chat, Awaiting::ResolvePrice { resolution }, "Введите цену букета:")
    }

    pub fn report(&mut self, chat: i64) -> Reply {
        if !self.permits(chat, Role::Admin) {
            return Reply::text(ACCESS_DENIED);
        }
        self.sessions.remove(&chat);

        let workbook = report::generate(
            &self.records.bouquets,
            &self.records.lost_flowers,
            &self.records.users,
        );
        if workbook.is_empty() {
            return Reply::text("Нет данных для отчета.");
        }

        match report::render(&workbook, &self.report_path) {
            Ok(()) => Reply::Document {
                path: self.report_path.clone(),
                caption: report::REPORT_CAPTION.to_string(),
            },
            Err(e) => {
                log::error!("❌ Report generation failed: {}", e);
                Reply::text(format!("Произошла ошибка при создании отчета: {}", e))
            }
        }
    }

    /// Очередное текстовое сообщение из чата
    pub fn handle_text(&mut self, chat: i64, text: &str) -> Result<Reply, FlowError> {
        let Some(awaiting) = self.sessions.remove(&chat) else {
            return Ok(Reply::text(
                "Сейчас я ничего не жду. Используйте /help, чтобы увидеть команды.",
            ));
        };

        let step = match awaiting {
            Awaiting::BouquetPrice { bouquet_key } => self.on_bouquet_price(chat, bouquet_key, text),
            Awaiting::BouquetComposition { bouquet_key } => {
                self.on_bouquet_composition(chat, bouquet_key, text)?
            }
            Awaiting::LostFlowers { timestamp } => self.on_lost_flowers(chat, timestamp, text)?,
            Awaiting::ResolvePrice { resolution } => self.on_resolve_price(chat, resolution, text),
            Awaiting::NewUserId => self.on_new_user_id(text),
            Awaiting::NewUserName { user_id } => self.on_new_user_name(user_id, text)?,
            Awaiting::DeleteUserId => self.on_delete_user_id(text),
            Awaiting::DeleteConfirmation { user_id } => self.on_delete_confirmation(user_id, text)?,
        };

        if let Some(next) = step.next {
            self.sessions.insert(chat, next);
        }
        Ok(step.reply)
    }

    fn bouquet_mut(&mut self, chat: i64, bouquet_key: &str) -> Option<&mut Bouquet> {
        self.records
            .bouquets
            .get_mut(&chat.to_string())
            .and_then(|owned| owned.get_mut(bouquet_key))
    }

    fn on_bouquet_price(&mut self, chat: i64, bouquet_key: String, text: &str) -> Step {
        let Some(price) = parse_price(text) else {
            return Step::then(
                Reply::prompt("Пожалуйста, введите корректную стоимость в виде числа"),
                Awaiting::BouquetPrice { bouquet_key },
            );
        };

        match self.bouquet_mut(chat, &bouquet_key) {
            Some(bouquet) => {
                bouquet.price = price;
                Step::then(
                    Reply::prompt(FORMAT_HINT),
                    Awaiting::BouquetComposition { bouquet_key },
                )
            }
            None => Step::done(Reply::text(
                "Букет не найден. Начните заново с команды /add_bouquet.",
            )),
        }
    }

    fn on_bouquet_composition(
        &mut self,
        chat: i64,
        bouquet_key: String,
        text: &str,
    ) -> Result<Step, FlowError> {
        let parsed = parse_flower_lines(text);
        let Some(bouquet) = self.bouquet_mut(chat, &bouquet_key) else {
            return Ok(Step::done(Reply::text(
                "Букет не найден. Начните заново с команды /add_bouquet.",
            )));
        };

        // корректные строки применяются сразу, даже если в сообщении есть ошибки
        for (flower, quantity) in parsed.entries.iter().cloned() {
            bouquet.composition.insert(flower, quantity);
        }

        if !parsed.is_valid() {
            return Ok(Step::then(
                Reply::prompt(FORMAT_ERROR),
                Awaiting::BouquetComposition { bouquet_key },
            ));
        }

        bouquet.sold_flag = false;
        let summary = bouquet.composition_summary();
        let price = bouquet.price;
        self.records.save_bouquets()?;

        log::info!("💐 Bouquet {} added by {}: {} ({})", bouquet_key, chat, price, summary);
        Ok(Step::done(Reply::text("Букет успешно добавлен!")))
    }

    fn on_lost_flowers(&mut self, chat: i64, timestamp: String, text: &str) -> Result<Step, FlowError> {
        let parsed = parse_flower_lines(text);
        if !parsed.is_valid() {
            return Ok(Step::then(
                Reply::prompt(FORMAT_ERROR),
                Awaiting::LostFlowers { timestamp },
            ));
        }

        let flowers: Composition = parsed.entries.into_iter().collect();
        self.records
            .lost_flowers
            .entry(chat.to_string())
            .or_default()
            .insert(timestamp.clone(), flowers);
        self.records.save_lost_flowers()?;

        log::info!("🥀 Lost flowers reported by {} at {}", chat, timestamp);
        Ok(Step::done(Reply::text("Пропавшие цветы успешно учтены!")))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::database::Document;

    #[test]
    fn add_bouquet_scenario() {
        let (mut flow, backend) = coordinator();

        assert_eq!(flow.add_bouquet(SELLER), Reply::prompt("Введите стоимость нового букета:"));
        assert_eq!(flow.handle_text(SELLER, "15.0").unwrap(), Reply::prompt(FORMAT_HINT));
        assert_eq!(
            flow.handle_text(SELLER, "роза 3\nтюльпан 5").unwrap(),
            Reply::text("Букет успешно добавлен!")
        );
        assert!(flow.session(SELLER).is_none());

        let owned = &flow.records().bouquets["2"];
        let bouquet = owned.values().next().unwrap();
        assert_eq!(bouquet.price, 15.0);
        assert_eq!(
            bouquet.composition,
            Composition::from([("роза".to_string(), 3), ("тюльпан".to_string(), 5)])
        );
        assert!(!bouquet.sold_flag);

        let saved = backend.document(Document::Bouquets).unwrap();
        assert!(saved.contains("тюльпан"));
    }

    #[test]
    fn bad_price_keeps_waiting_for_price() {
        let (mut flow, backend) = coordinator();
        flow.add_bouquet(SELLER);

        for _ in 0..3 {
            let reply = flow.handle_text(SELLER, "дорого").unwrap();
            assert!(matches!(reply, Reply::Prompt(_)));
            assert!(matches!(flow.session(SELLER), Some(Awaiting::BouquetPrice { .. })));
        }

        flow.handle_text(SELLER, "12,5").unwrap();
        assert!(matches!(flow.session(SELLER), Some(Awaiting::BouquetComposition { .. })));
        assert!(backend.document(Document::Bouquets).is_none());
    }

    #[test]
    fn bad_composition_line_keeps_earlier_lines() {
        let (mut flow, backend) = coordinator();
        flow.add_bouquet(SELLER);
        flow.handle_text(SELLER, "10").unwrap();

        let reply = flow.handle_text(SELLER, "роза 3\nтюльпан много").unwrap();
        assert_eq!(reply, Reply::prompt(FORMAT_ERROR));
        assert!(matches!(flow.session(SELLER), Some(Awaiting::BouquetComposition { .. })));

        let bouquet = flow.records().bouquets["2"].values().next().unwrap();
        assert_eq!(bouquet.composition.get("роза"), Some(&3));
        assert!(backend.document(Document::Bouquets).is_none());

        flow.handle_text(SELLER, "тюльпан 4").unwrap();
        let bouquet = flow.records().bouquets["2"].values().next().unwrap();
        assert_eq!(bouquet.composition.len(), 2);
        assert!(backend.document(Document::Bouquets).is_some());
    }

    #[test]
    fn cancel_clears_session_without_touching_data() {
        let (mut flow, backend) = coordinator();
        flow.add_lost_flowers(SELLER);

        assert_eq!(flow.cancel(SELLER), Reply::text("Действие отменено."));
        assert!(flow.session(SELLER).is_none());
        assert!(flow.records().lost_flowers.is_empty());
        assert!(backend.document(Document::LostFlowers).is_none());
        assert_eq!(flow.cancel(SELLER), Reply::text("Нечего отменять."));
    }

    #[test]
    fn new_command_replaces_pending_flow() {
        let (mut flow, _) = coordinator();
        flow.add_bouquet(SELLER);
        flow.add_lost_flowers(SELLER);

        assert!(matches!(flow.session(SELLER), Some(Awaiting::LostFlowers { .. })));
        flow.handle_text(SELLER, "лилия 2").unwrap();
        assert_eq!(flow.records().lost_flowers["2"].len(), 1);
    }

    #[test]
    fn lost_flowers_reprompt_whole_input() {
        let (mut flow, _) = coordinator();
        flow.add_lost_flowers(SELLER);

        let reply = flow.handle_text(SELLER, "лилия 2\nроза").unwrap();
        assert_eq!(reply, Reply::prompt(FORMAT_ERROR));
        assert!(flow.records().lost_flowers.is_empty());

        let reply = flow.handle_text(SELLER, "лилия 2").unwrap();
        assert_eq!(reply, Reply::text("Пропавшие цветы успешно учтены!"));
        let events = &flow.records().lost_flowers["2"];
        assert_eq!(events.values().next().unwrap().get("лилия"), Some(&2));
    }

    #[test]
    fn strangers_are_denied() {
        let (mut flow, _) = coordinator();
        assert_eq!(flow.add_bouquet(STRANGER), Reply::text(ACCESS_DENIED));
        assert_eq!(flow.add_lost_flowers(STRANGER), Reply::text(ACCESS_DENIED));
        assert_eq!(flow.begin_resolve(STRANGER, Resolution::Sold), Reply::text(ACCESS_DENIED));
        assert!(flow.session(STRANGER).is_none());
        assert!(flow.records().bouquets.is_empty());
    }

    #[test]
    fn unauthorized_report_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let mut flow = coordinator_with(crate::database::MemoryBackend::new(), path.clone());
        add_bouquet(&mut flow, SELLER, "10", "роза 1");

        assert_eq!(flow.report(SELLER), Reply::text(ACCESS_DENIED));
        assert_eq!(flow.report(STRANGER), Reply::text(ACCESS_DENIED));
        assert!(!path.exists());
    }

    #[test]
    fn lost_flowers_then_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let mut flow = coordinator_with(crate::database::MemoryBackend::new(), path.clone());

        flow.add_lost_flowers(SELLER);
        flow.handle_text(SELLER, "лилия 2").unwrap();

        let reply = flow.report(ADMIN);
        assert_eq!(
            reply,
            Reply::Document {
                path: path.clone(),
                caption: report::REPORT_CAPTION.to_string(),
            }
        );
        assert!(path.exists());

        let records = flow.records();
        let workbook = report::generate(&records.bouquets, &records.lost_flowers, &records.users);
        let sheet = workbook.sheet_with_prefix("Lost_flowers").unwrap();
        assert_eq!(sheet.rows.len(), 1);
        let row = &sheet.rows[0];
        assert_eq!(row[0], report::Cell::Number(2.0));
        assert_eq!(row[1], report::Cell::Text("Иван".to_string()));
        assert_eq!(row[2], report::Cell::Text("2024-03-01T10:00:00.000000".to_string()));
        assert_eq!(row[3], report::Cell::Text("лилия".to_string()));
        assert_eq!(row[4], report::Cell::Number(2.0));
    }

    #[test]
    fn report_render_failure_is_reported_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.xlsx");
        let mut flow = coordinator_with(crate::database::MemoryBackend::new(), path.clone());
        add_bouquet(&mut flow, SELLER, "10", "роза 1");

        let Reply::Text(text) = flow.report(ADMIN) else {
            panic!("expected an error text");
        };
        assert!(text.starts_with("Произошла ошибка при создании отчета: "));
        assert!(!path.exists());
    }

    #[test]
    fn write_failures_surface_as_store_errors() {
        let mut flow = coordinator_with(ReadOnlyBackend, PathBuf::from("unused-report.xlsx"));

        flow.add_bouquet(SELLER);
        flow.handle_text(SELLER, "20").unwrap();
        let err = flow.handle_text(SELLER, "роза 3").unwrap_err();
        assert!(matches!(
            err,
            FlowError::Store(StoreError::Write {
                document: Document::Bouquets,
                ..
            })
        ));

        flow.add_lost_flowers(SELLER);
        let err = flow.handle_text(SELLER, "лилия 2").unwrap_err();
        assert!(matches!(
            err,
            FlowError::Store(StoreError::Write {
                document: Document::LostFlowers,
                ..
            })
        ));

        // букет остался в памяти открытым, но и продажа не сохраняется
        flow.begin_resolve(SELLER, Resolution::Sold);
        let Reply::Options { options, .. } = flow.handle_text(SELLER, "20").unwrap() else {
            panic!("expected options");
        };
        let err = flow.select(SELLER, &options[0].token).unwrap_err();
        assert!(matches!(err, FlowError::Store(StoreError::Write { .. })));

        flow.add_user(ADMIN);
        flow.handle_text(ADMIN, "555").unwrap();
        let err = flow.handle_text(ADMIN, "Пётр").unwrap_err();
        assert!(matches!(
            err,
            FlowError::Store(StoreError::Write {
                document: Document::Users,
                ..
            })
        ));
    }

    #[test]
    fn empty_report_is_reported_as_text() {
        let (mut flow, _) = coordinator();
        assert_eq!(flow.report(ADMIN), Reply::text("Нет данных для отчета."));
    }

    #[test]
    fn help_lists_admin_commands_only_for_admins() {
        let (flow, _) = coordinator();
        let Reply::Text(admin_help) = flow.help(ADMIN) else { panic!() };
        let Reply::Text(seller_help) = flow.help(SELLER) else { panic!() };
        assert!(admin_help.contains("/report"));
        assert!(!seller_help.contains("/report"));
    }

    #[test]
    fn taken_timestamps_are_skipped() {
        let (flow, _) = coordinator();
        let taken = ["2024-03-01T10:00:00.000000", "2024-03-01T10:00:00.000001"];
        assert_eq!(
            flow.unique_timestamp(|key| taken.contains(&key)),
            "2024-03-01T10:00:00.000002"
        );
    }

    #[test]
    fn text_without_flow_gets_hint() {
        let (mut flow, _) = coordinator();
        let reply = flow.handle_text(SELLER, "привет").unwrap();
        assert!(matches!(reply, Reply::Text(text) if text.contains("/help")));
    }
}
