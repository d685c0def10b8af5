//! Продажа и потеря букета: поиск по цене и выбор кнопкой.

use crate::access::ACCESS_DENIED;
use crate::models::{Awaiting, Bouquet, Bouquets, Resolution, Role};

use super::parsing::parse_price;
use super::{Coordinator, FlowError, Reply, ReplyOption, Step};

const TOKEN_PREFIX: &str = "resolve";
// Telegram ограничивает число кнопок в сообщении
pub const MAX_OPTIONS: usize = 30;

/// Содержимое кнопки выбора: что сделать, кто выбрал, какой букет.
///
/// Владелец букета в токен не входит (лимит callback data 64 байта), букет ищется по
/// метке времени среди всех владельцев, см. [`holder_of`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveToken {
    pub resolution: Resolution,
    pub resolver: i64,
    pub bouquet_key: String,
}

impl ResolveToken {
    pub fn encode(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            TOKEN_PREFIX,
            self.resolution.field(),
            self.resolver,
            self.bouquet_key
        )
    }

    pub fn decode(data: &str) -> Option<Self> {
        let mut parts = data.splitn(4, '|');
        if parts.next()? != TOKEN_PREFIX {
            return None;
        }
        let resolution = Resolution::from_field(parts.next()?)?;
        let resolver = parts.next()?.parse().ok()?;
        let bouquet_key = parts.next()?.to_string();
        if bouquet_key.is_empty() {
            return None;
        }
        Some(Self {
            resolution,
            resolver,
            bouquet_key,
        })
    }

    pub fn matches(data: &str) -> bool {
        data.starts_with(TOKEN_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub owner: String,
    pub bouquet_key: String,
    pub bouquet: Bouquet,
}

/// Открытые букеты всех владельцев с точно такой ценой.
///
/// Сравнение цен строгое (`==`): цены всегда вводятся вручную короткими десятичными числами.
#[allow(clippy::float_cmp)]
pub fn find_open_by_price(bouquets: &Bouquets, price: f64) -> Vec<Candidate> {
    bouquets
        .iter()
        .flat_map(|(owner, owned)| {
            owned.iter().map(move |(key, bouquet)| (owner, key, bouquet))
        })
        .filter(|(_, _, bouquet)| bouquet.is_open() && bouquet.price == price)
        .map(|(owner, key, bouquet)| Candidate {
            owner: owner.clone(),
            bouquet_key: key.clone(),
            bouquet: bouquet.clone(),
        })
        .collect()
}

/// Владелец букета с ключом `bouquet_key`.
///
/// Новые ключи уникальны среди всех владельцев, но в старых файлах один ключ
/// мог достаться нескольким. Тогда выбирается открытый букет, как в списке вариантов.
fn holder_of(bouquets: &Bouquets, bouquet_key: &str) -> Option<String> {
    let mut holders = bouquets
        .iter()
        .filter_map(|(owner, owned)| owned.get(bouquet_key).map(|bouquet| (owner, bouquet)));
    let first = holders.next()?;
    let holder = if first.1.is_open() {
        first
    } else {
        holders.find(|(_, bouquet)| bouquet.is_open()).unwrap_or(first)
    };
    Some(holder.0.clone())
}

fn success_text(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Sold => "Букет успешно продан!",
        Resolution::Lost => "Букет отмечен как пропавший.",
    }
}

fn already_resolved_text(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Sold => "Этот букет уже отмечен как проданный.",
        Resolution::Lost => "Этот букет уже отмечен как пропавший.",
    }
}

impl Coordinator {
    pub(super) fn on_resolve_price(&mut self, chat: i64, resolution: Resolution, text: &str) -> Step {
        let Some(price) = parse_price(text) else {
            return Step::then(
                Reply::prompt("Пожалуйста, введите корректную цену в виде числа."),
                Awaiting::ResolvePrice { resolution },
            );
        };

        let candidates = find_open_by_price(&self.records.bouquets, price);
        if candidates.is_empty() {
            return Step::done(Reply::text(format!("Букетов по цене {} руб. не найдено.", price)));
        }

        let total = candidates.len();
        let mut text = String::from("Выберите букет:\n\n");
        let mut options = Vec::with_capacity(total.min(MAX_OPTIONS));
        for (number, candidate) in candidates
            .iter()
            .take(MAX_OPTIONS)
            .enumerate()
            .map(|(i, c)| (i + 1, c))
        {
            text.push_str(&format!(
                "{}. {} руб. ({})\nСостав: {}\n\n",
                number,
                candidate.bouquet.price,
                candidate.bouquet_key,
                candidate.bouquet.composition_summary()
            ));
            options.push(ReplyOption {
                label: number.to_string(),
                token: ResolveToken {
                    resolution,
                    resolver: chat,
                    bouquet_key: candidate.bouquet_key.clone(),
                }
                .encode(),
            });
        }

        if total > MAX_OPTIONS {
            text.push_str(&format!("Показаны первые {} из {} букетов.", MAX_OPTIONS, total));
        }

        log::info!("🔎 {} open bouquets at {} for chat {}", total, price, chat);
        Step::done(Reply::Options { text, options })
    }

    /// Нажатие кнопки с вариантом. Повторное закрытие уже закрытого букета отклоняется.
    pub fn select(&mut self, chat: i64, data: &str) -> Result<Reply, FlowError> {
        if !self.permits(chat, Role::User) {
            return Ok(Reply::text(ACCESS_DENIED));
        }
        let Some(token) = ResolveToken::decode(data) else {
            log::warn!("⚠️ Unknown option {:?} from chat {}", data, chat);
            return Ok(Reply::text("Неизвестный вариант."));
        };

        let resolved_at = self.now();
        let seller_id = token.resolver.to_string();
        let Some(bouquet) = holder_of(&self.records.bouquets, &token.bouquet_key)
            .and_then(|owner| self.records.bouquets.get_mut(&owner))
            .and_then(|owned| owned.get_mut(&token.bouquet_key))
        else {
            return Ok(Reply::text("Букет не найден."));
        };

        if let Some(previous) = bouquet.resolution() {
            log::warn!(
                "⚠️ Bouquet {} already resolved ({:?}), ignoring {:?} from {}",
                token.bouquet_key,
                previous,
                token.resolution,
                chat
            );
            return Ok(Reply::text(already_resolved_text(previous)));
        }

        bouquet.resolve(token.resolution, &seller_id, &resolved_at);
        self.records.save_bouquets()?;

        log::info!(
            "✅ Bouquet {} marked {} by {}",
            token.bouquet_key,
            token.resolution.field(),
            seller_id
        );
        Ok(Reply::text(success_text(token.resolution)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::database::{Document, MemoryBackend};

    fn options(reply: Reply) -> Vec<ReplyOption> {
        match reply {
            Reply::Options { options, .. } => options,
            other => panic!("expected options, got {:?}", other),
        }
    }

    #[test]
    fn token_round_trip_keeps_timestamp_colons() {
        let token = ResolveToken {
            resolution: Resolution::Lost,
            resolver: -100200300,
            bouquet_key: "2024-03-01T10:00:00.000000".to_string(),
        };
        let encoded = token.encode();
        assert!(encoded.len() <= 64, "callback data limit");
        assert_eq!(ResolveToken::decode(&encoded), Some(token));
        assert_eq!(ResolveToken::decode("cancel"), None);
        assert_eq!(ResolveToken::decode("resolve|price|1|x"), None);
    }

    #[test]
    fn created_bouquet_is_found_by_exact_price() {
        let (mut flow, _) = coordinator();
        let key = add_bouquet(&mut flow, SELLER, "12,5", "роза 3");

        let found = find_open_by_price(&flow.records().bouquets, 12.5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bouquet_key, key);
        assert_eq!(found[0].owner, "2");
    }

    #[test]
    fn price_match_is_exact_float_equality() {
        let (mut flow, _) = coordinator();
        add_bouquet(&mut flow, SELLER, "0.3", "роза 1");

        assert_eq!(find_open_by_price(&flow.records().bouquets, 0.3).len(), 1);
        // вычисленная цена не совпадает с введённой
        assert!(find_open_by_price(&flow.records().bouquets, 0.1 + 0.2).is_empty());
    }

    #[test]
    fn sell_flow_resolves_selected_bouquet() {
        let (mut flow, backend) = coordinator();
        let first = add_bouquet(&mut flow, SELLER, "20", "роза 3");
        let second = add_bouquet(&mut flow, ADMIN, "20", "пион 1");
        add_bouquet(&mut flow, SELLER, "30", "лилия 5");

        flow.begin_resolve(ADMIN, Resolution::Sold);
        let options = options(flow.handle_text(ADMIN, "20").unwrap());
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "1");
        assert!(flow.session(ADMIN).is_none());

        let picked = options
            .iter()
            .find(|o| ResolveToken::decode(&o.token).unwrap().bouquet_key == second)
            .unwrap();
        assert_eq!(
            flow.select(ADMIN, &picked.token).unwrap(),
            Reply::text("Букет успешно продан!")
        );

        let sold = &flow.records().bouquets["1"][&second];
        assert!(sold.sold_flag);
        assert!(!sold.is_lost);
        assert_eq!(sold.seller_id, "1");
        assert!(!sold.sold_at.is_empty());
        assert!(flow.records().bouquets["2"][&first].is_open());
        assert!(backend.document(Document::Bouquets).unwrap().contains("\"seller_id\": \"1\""));

        // проданный букет больше не предлагается
        flow.begin_resolve(ADMIN, Resolution::Sold);
        assert_eq!(options_len(flow.handle_text(ADMIN, "20").unwrap()), 1);
    }

    fn options_len(reply: Reply) -> usize {
        options(reply).len()
    }

    #[test]
    fn lost_flow_sets_only_is_lost() {
        let (mut flow, _) = coordinator();
        let key = add_bouquet(&mut flow, SELLER, "15", "роза 3");

        flow.begin_resolve(SELLER, Resolution::Lost);
        let options = options(flow.handle_text(SELLER, "15.0").unwrap());
        flow.select(SELLER, &options[0].token).unwrap();

        let bouquet = &flow.records().bouquets["2"][&key];
        assert!(bouquet.is_lost);
        assert!(!bouquet.sold_flag);
        assert_eq!(bouquet.seller_id, "2");
    }

    #[test]
    fn second_resolution_is_rejected() {
        let (mut flow, _) = coordinator();
        let key = add_bouquet(&mut flow, SELLER, "15", "роза 3");

        flow.begin_resolve(SELLER, Resolution::Sold);
        let stale = options(flow.handle_text(SELLER, "15").unwrap()).remove(0);
        flow.select(SELLER, &stale.token).unwrap();
        let first = flow.records().bouquets["2"][&key].clone();

        let lost_token = ResolveToken {
            resolution: Resolution::Lost,
            resolver: ADMIN,
            bouquet_key: key.clone(),
        }
        .encode();
        assert_eq!(
            flow.select(ADMIN, &lost_token).unwrap(),
            Reply::text("Этот букет уже отмечен как проданный.")
        );
        assert_eq!(
            flow.select(SELLER, &stale.token).unwrap(),
            Reply::text("Этот букет уже отмечен как проданный.")
        );
        assert_eq!(flow.records().bouquets["2"][&key], first);
    }

    #[test]
    fn no_match_ends_flow() {
        let (mut flow, _) = coordinator();
        flow.begin_resolve(SELLER, Resolution::Sold);
        assert_eq!(
            flow.handle_text(SELLER, "99").unwrap(),
            Reply::text("Букетов по цене 99 руб. не найдено.")
        );
        assert!(flow.session(SELLER).is_none());
    }

    #[test]
    fn bad_price_keeps_waiting() {
        let (mut flow, _) = coordinator();
        flow.begin_resolve(SELLER, Resolution::Sold);
        flow.handle_text(SELLER, "сто").unwrap();
        assert_eq!(
            flow.session(SELLER),
            Some(&Awaiting::ResolvePrice {
                resolution: Resolution::Sold
            })
        );
    }

    #[test]
    fn long_candidate_lists_are_capped() {
        let (mut flow, _) = coordinator();
        for _ in 0..MAX_OPTIONS + 5 {
            add_bouquet(&mut flow, SELLER, "10", "роза 1");
        }

        flow.begin_resolve(SELLER, Resolution::Sold);
        let Reply::Options { text, options } = flow.handle_text(SELLER, "10").unwrap() else {
            panic!("expected options");
        };
        assert_eq!(options.len(), MAX_OPTIONS);
        assert!(text.contains(&format!("Показаны первые {} из {} букетов.", MAX_OPTIONS, MAX_OPTIONS + 5)));
    }

    #[test]
    fn shared_key_resolves_the_listed_open_bouquet() {
        let key = "2024-03-01T10:00:00.000000";
        let legacy = format!(
            r#"{{"1": {{"{key}": {{"price": 20, "composition": {{"роза": 1}}, "sold_flag": 1, "seller_id": "1"}}}},
                "2": {{"{key}": {{"price": 20, "composition": {{"пион": 2}}, "sold_flag": 0}}}}}}"#
        );
        let backend = MemoryBackend::new().with_document(Document::Bouquets, &legacy);
        let mut flow = coordinator_with(backend, "unused-report.xlsx".into());

        flow.begin_resolve(SELLER, Resolution::Sold);
        let options = options(flow.handle_text(SELLER, "20").unwrap());
        assert_eq!(options.len(), 1);

        assert_eq!(
            flow.select(SELLER, &options[0].token).unwrap(),
            Reply::text("Букет успешно продан!")
        );
        let bouquets = &flow.records().bouquets;
        assert!(bouquets["2"][key].sold_flag);
        assert_eq!(bouquets["2"][key].seller_id, "2");
        assert_eq!(bouquets["1"][key].seller_id, "1");
    }

    #[test]
    fn new_bouquet_keys_are_unique_across_owners() {
        // первая отметка StepClock уже занята букетом другого владельца
        let legacy = r#"{"1": {"2024-03-01T10:00:00.000000": {"price": 5, "composition": {"роза": 1}}}}"#;
        let backend = MemoryBackend::new().with_document(Document::Bouquets, legacy);
        let mut flow = coordinator_with(backend, "unused-report.xlsx".into());

        let key = add_bouquet(&mut flow, SELLER, "5", "пион 1");
        assert_eq!(key, "2024-03-01T10:00:00.000001");
    }

    #[test]
    fn vanished_or_foreign_selections() {
        let (mut flow, _) = coordinator();
        let token = ResolveToken {
            resolution: Resolution::Sold,
            resolver: SELLER,
            bouquet_key: "2000-01-01T00:00:00.000000".to_string(),
        }
        .encode();

        assert_eq!(flow.select(SELLER, &token).unwrap(), Reply::text("Букет не найден."));
        assert_eq!(flow.select(STRANGER, &token).unwrap(), Reply::text(ACCESS_DENIED));
        assert_eq!(flow.select(SELLER, "garbage").unwrap(), Reply::text("Неизвестный вариант."));
    }
}
