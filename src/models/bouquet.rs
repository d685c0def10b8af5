use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Состав: название цветка -> количество
pub type Composition = BTreeMap<String, u32>;

/// chat id владельца -> время создания (ISO-8601) -> букет
pub type Bouquets = BTreeMap<String, BTreeMap<String, Bouquet>>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bouquet {
    pub price: f64,
    #[serde(default)]
    pub composition: Composition,
    #[serde(default, with = "flag")]
    pub sold_flag: bool,
    #[serde(default, with = "flag")]
    pub is_lost: bool,
    #[serde(default)]
    pub seller_id: String,
    #[serde(default)]
    pub sold_at: String,
}

/// Чем закончилась судьба букета
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Sold,
    Lost,
}

impl Resolution {
    /// Имя поля, которое выставляется в 1
    pub fn field(self) -> &'static str {
        match self {
            Resolution::Sold => "sold_flag",
            Resolution::Lost => "is_lost",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "sold_flag" => Some(Resolution::Sold),
            "is_lost" => Some(Resolution::Lost),
            _ => None,
        }
    }
}

impl Bouquet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ещё не продан и не потерян
    pub fn is_open(&self) -> bool {
        !self.sold_flag && !self.is_lost
    }

    pub fn resolution(&self) -> Option<Resolution> {
        if self.sold_flag {
            Some(Resolution::Sold)
        } else if self.is_lost {
            Some(Resolution::Lost)
        } else {
            None
        }
    }

    pub fn resolve(&mut self, resolution: Resolution, seller_id: &str, at: &str) {
        match resolution {
            Resolution::Sold => self.sold_flag = true,
            Resolution::Lost => self.is_lost = true,
        }
        self.seller_id = seller_id.to_string();
        self.sold_at = at.to_string();
    }

    /// "роза: 3, тюльпан: 5"
    pub fn composition_summary(&self) -> String {
        self.composition
            .iter()
            .map(|(name, quantity)| format!("{}: {}", name, quantity))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Флаги хранятся как 0/1, старые файлы могут содержать true/false.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
            Null(()),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(value) => value,
            Raw::Int(value) => value != 0,
            Raw::Null(()) => false,
        })
    }
}
