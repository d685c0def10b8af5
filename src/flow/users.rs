use crate::access::ACCESS_DENIED;
use crate::models::{Awaiting, Role, UserRecord};

use super::{Coordinator, FlowError, Reply, Step};

fn users_info(users: &[UserRecord]) -> String {
    if users.is_empty() {
        return "Список пуст.".to_string();
    }
    users
        .iter()
        .map(|u| format!("- {} ({})", u.name, u.chat_id))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_chat_id(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

impl Coordinator {
    pub fn add_user(&mut self, chat: i64) -> Reply {
        if !self.permits(chat, Role::Admin) {
            return Reply::text(ACCESS_DENIED);
        }
        self.begin(chat, Awaiting::NewUserId, "Введите ID пользователя:")
    }

    pub fn del_user(&mut self, chat: i64) -> Reply {
        if !self.permits(chat, Role::Admin) {
            return Reply::text(ACCESS_DENIED);
        }
        self.begin(chat, Awaiting::DeleteUserId, "Введите ID пользователя:")
    }

    pub fn users_list(&self, chat: i64) -> Reply {
        if !self.permits(chat, Role::Admin) {
            return Reply::text(ACCESS_DENIED);
        }
        let users = &self.records.users;
        Reply::text(format!(
            "Администраторы:\n{}\n\nПользователи:\n{}",
            users_info(&users.admins),
            users_info(&users.users)
        ))
    }

    pub(super) fn on_new_user_id(&mut self, text: &str) -> Step {
        let user_id = text.trim();
        if self.records.users.contains(user_id) || self.is_admin_id(user_id) {
            return Step::done(Reply::text("Этот id уже есть в списке пользователей"));
        }
        if !is_chat_id(user_id) {
            return Step::then(
                Reply::prompt("Пожалуйста, введите корректный id в виде числа"),
                Awaiting::NewUserId,
            );
        }
        Step::then(
            Reply::prompt("Введите имя пользователя:"),
            Awaiting::NewUserName {
                user_id: user_id.to_string(),
            },
        )
    }

    pub(super) fn on_new_user_name(&mut self, user_id: String, text: &str) -> Result<Step, FlowError> {
        let name = text.trim();
        if name.is_empty() {
            return Ok(Step::then(
                Reply::prompt("Введите имя пользователя:"),
                Awaiting::NewUserName { user_id },
            ));
        }

        self.records.users.add_user(&user_id, name);
        self.records.save_users()?;

        log::info!("👤 User {} ({}) added", name, user_id);
        Ok(Step::done(Reply::text(format!(
            "Пользователь {} ({}) добавлен с ролью users",
            name, user_id
        ))))
    }

    pub(super) fn on_delete_user_id(&mut self, text: &str) -> Step {
        let user_id = text.trim();
        if !is_chat_id(user_id) {
            return Step::then(
                Reply::prompt("Пожалуйста, введите корректный id в виде числа"),
                Awaiting::DeleteUserId,
            );
        }
        match self.records.users.role_of(user_id) {
            None if self.is_admin_id(user_id) => {
                Step::done(Reply::text("Администратора нельзя удалить через бота."))
            }
            None => Step::done(Reply::text("Этого пользователя и так нет в списке")),
            Some(Role::Admin) => Step::done(Reply::text("Администратора нельзя удалить через бота.")),
            Some(Role::User) => Step::then(
                Reply::prompt(format!(
                    "Вы уверены, что хотите удалить пользователя {}?\nНапишите да или нет",
                    user_id
                )),
                Awaiting::DeleteConfirmation {
                    user_id: user_id.to_string(),
                },
            ),
        }
    }

    pub(super) fn on_delete_confirmation(&mut self, user_id: String, text: &str) -> Result<Step, FlowError> {
        let answer = text.trim().to_lowercase();
        if !matches!(answer.as_str(), "да" | "удалить") {
            return Ok(Step::done(Reply::text("Удаление пользователя отменено.")));
        }

        if self.records.users.remove_user(&user_id) {
            self.records.save_users()?;
            log::info!("👤 User {} removed", user_id);
        }
        Ok(Step::done(Reply::text(format!("Пользователь {} удален.", user_id))))
    }

    fn is_admin_id(&self, chat_id: &str) -> bool {
        self.access.is_admin(&self.records.users, chat_id)
    }
}
