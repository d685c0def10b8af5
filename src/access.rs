use std::collections::HashSet;

use crate::models::{Role, UserDirectory};

pub const ACCESS_DENIED: &str = "У вас нет прав доступа к этой команде.";

/// Проверка прав по спискам администраторов и пользователей.
///
/// Администраторы из окружения (`ADMIN_CHAT_ID`) объединяются с разделом
/// `admins` файла пользователей. Файловые списки читаются из текущего
/// состояния `UserDirectory`, поэтому добавление и удаление пользователей
/// действует сразу, без перезапуска.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    static_admins: HashSet<String>,
}

impl AccessControl {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            static_admins: admins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_admin(&self, users: &UserDirectory, chat_id: &str) -> bool {
        self.static_admins.contains(chat_id) || users.role_of(chat_id) == Some(Role::Admin)
    }

    pub fn is_authorized_user(&self, users: &UserDirectory, chat_id: &str) -> bool {
        self.is_admin(users, chat_id) || users.role_of(chat_id) == Some(Role::User)
    }

    pub fn permits(&self, users: &UserDirectory, chat_id: &str, required: Role) -> bool {
        match required {
            Role::Admin => self.is_admin(users, chat_id),
            Role::User => self.is_authorized_user(users, chat_id),
        }
    }
}
