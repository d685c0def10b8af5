use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("не указано название цветка")]
    EmptyName,
    #[error("название цветка содержит цифры")]
    DigitInName,
    #[error("количество должно быть целым положительным числом")]
    BadQuantity,
}

/// Цена: допускается и ',' и '.' как десятичный разделитель
pub fn parse_price(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(',', ".");
    let price: f64 = normalized.parse().ok()?;
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Одна строка вида `<название> <количество>`.
///
/// Все слова, кроме последнего, образуют название; последнее слово - количество.
pub fn parse_flower_line(line: &str) -> Result<(String, u32), LineError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((quantity, name)) = tokens.split_last() else {
        return Err(LineError::EmptyName);
    };

    let name = name.join(" ");
    if name.is_empty() {
        return Err(LineError::EmptyName);
    }
    if name.chars().any(char::is_numeric) {
        return Err(LineError::DigitInName);
    }

    match quantity.parse::<u32>() {
        Ok(quantity) if quantity > 0 => Ok((name, quantity)),
        _ => Err(LineError::BadQuantity),
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ParsedLines {
    pub entries: Vec<(String, u32)>,
    pub rejected: Vec<(String, LineError)>,
}

impl ParsedLines {
    /// Все строки разобраны и есть хотя бы одна запись
    pub fn is_valid(&self) -> bool {
        self.rejected.is_empty() && !self.entries.is_empty()
    }
}

/// Разбирает многострочный ввод; пустые строки пропускаются
pub fn parse_flower_lines(text: &str) -> ParsedLines {
    let mut parsed = ParsedLines::default();

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match parse_flower_line(line) {
            Ok(entry) => parsed.entries.push(entry),
            Err(e) => parsed.rejected.push((line.to_string(), e)),
        }
    }

    parsed
}
