use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(deserialize_with = "chat_id_from_any")]
    pub chat_id: String,
    #[serde(default)]
    pub name: String,
}

/// Содержимое admin_users.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDirectory {
    #[serde(default)]
    pub admins: Vec<UserRecord>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

impl UserDirectory {
    pub fn role_of(&self, chat_id: &str) -> Option<Role> {
        if self.admins.iter().any(|u| u.chat_id == chat_id) {
            Some(Role::Admin)
        } else if self.users.iter().any(|u| u.chat_id == chat_id) {
            Some(Role::User)
        } else {
            None
        }
    }

    pub fn contains(&self, chat_id: &str) -> bool {
        self.role_of(chat_id).is_some()
    }

    /// Имя для отчёта; администраторы имеют приоритет
    pub fn name_of(&self, chat_id: &str) -> Option<&str> {
        self.admins
            .iter()
            .chain(self.users.iter())
            .find(|u| u.chat_id == chat_id)
            .map(|u| u.name.as_str())
    }

    pub fn add_user(&mut self, chat_id: &str, name: &str) {
        self.users.push(UserRecord {
            chat_id: chat_id.to_string(),
            name: name.to_string(),
        });
    }

    /// Удаляет только из списка пользователей, администраторы не трогаются
    pub fn remove_user(&mut self, chat_id: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.chat_id != chat_id);
        self.users.len() != before
    }
}

// В старых файлах chat_id записан то числом, то строкой
fn chat_id_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
