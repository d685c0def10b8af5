use super::Resolution;

/// Чего бот ждёт от конкретного чата следующим сообщением.
///
/// Живёт только в памяти: при перезапуске все незавершённые диалоги теряются.
#[derive(Debug, Clone, PartialEq)]
pub enum Awaiting {
    BouquetPrice { bouquet_key: String },
    BouquetComposition { bouquet_key: String },
    LostFlowers { timestamp: String },
    ResolvePrice { resolution: Resolution },
    NewUserId,
    NewUserName { user_id: String },
    DeleteUserId,
    DeleteConfirmation { user_id: String },
}
