use std::collections::BTreeMap;

use super::Composition;

/// chat id сообщившего -> время (ISO-8601) -> пропавшие цветы
pub type LostFlowers = BTreeMap<String, BTreeMap<String, Composition>>;

/// Количество событий о пропаже по всем сотрудникам
pub fn event_count(lost: &LostFlowers) -> usize {
    lost.values().map(BTreeMap::len).sum()
}
