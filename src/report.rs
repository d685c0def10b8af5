use std::path::Path;

use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, XlsxError};
use thiserror::Error;

use crate::models::{Bouquets, LostFlowers, UserDirectory};

pub const REPORT_CAPTION: &str = "Отчет по букетам и пропавшим цветам";

const BOUQUET_HEADERS: [&str; 11] = [
    "chat_id",
    "name",
    "date",
    "price",
    "Название цветка",
    "Количество",
    "sold_flag",
    "is_lost",
    "seller_id",
    "seller_name",
    "sold_at",
];

const LOST_HEADERS: [&str; 5] = ["chat_id", "name", "timestamp", "Название цветка", "Количество"];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("xlsx error: {0}")]
    Xlsx(#[from] XlsxError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    /// chat id пишется числом, если это число
    fn chat_id(chat_id: &str) -> Self {
        match chat_id.parse::<i64>() {
            Ok(id) => Cell::Number(id as f64),
            Err(_) => Cell::Text(chat_id.to_string()),
        }
    }

    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn flag(value: bool) -> Self {
        Cell::Number(if value { 1.0 } else { 0.0 })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    #[cfg(test)]
    pub fn sheet_with_prefix(&self, prefix: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name.starts_with(prefix))
    }
}

// Имя листа берётся по последней обработанной метке времени: первые 10 символов (дата)
fn sheet_name(prefix: &str, last_timestamp: &str) -> String {
    let date: String = last_timestamp.chars().take(10).collect();
    format!("{}_{}", prefix, date)
}

fn bouquet_sheet(bouquets: &Bouquets, users: &UserDirectory) -> Option<Sheet> {
    let mut rows = Vec::new();
    let mut last_key = None;

    for (owner, owned) in bouquets {
        let owner_name = users.name_of(owner).unwrap_or_default();
        for (created_at, bouquet) in owned {
            last_key = Some(created_at.as_str());
            let seller_name = users.name_of(&bouquet.seller_id).unwrap_or_default();

            for (flower, quantity) in &bouquet.composition {
                rows.push(vec![
                    Cell::chat_id(owner),
                    Cell::text(owner_name),
                    Cell::text(created_at.as_str()),
                    Cell::Number(bouquet.price),
                    Cell::text(flower.as_str()),
                    Cell::Number(f64::from(*quantity)),
                    Cell::flag(bouquet.sold_flag),
                    Cell::flag(bouquet.is_lost),
                    Cell::text(bouquet.seller_id.as_str()),
                    Cell::text(seller_name),
                    Cell::text(bouquet.sold_at.as_str()),
                ]);
            }
        }
    }

    last_key.map(|key| Sheet {
        name: sheet_name("Bouquets", key),
        headers: BOUQUET_HEADERS.to_vec(),
        rows,
    })
}

fn lost_flowers_sheet(lost_flowers: &LostFlowers, users: &UserDirectory) -> Option<Sheet> {
    let mut rows = Vec::new();
    let mut last_key = None;

    for (reporter, events) in lost_flowers {
        let reporter_name = users.name_of(reporter).unwrap_or_default();
        for (timestamp, flowers) in events {
            last_key = Some(timestamp.as_str());
            for (flower, quantity) in flowers {
                rows.push(vec![
                    Cell::chat_id(reporter),
                    Cell::text(reporter_name),
                    Cell::text(timestamp.as_str()),
                    Cell::text(flower.as_str()),
                    Cell::Number(f64::from(*quantity)),
                ]);
            }
        }
    }

    last_key.map(|key| Sheet {
        name: sheet_name("Lost_flowers", key),
        headers: LOST_HEADERS.to_vec(),
        rows,
    })
}

/// Сводит букеты и пропажи в листы отчёта. Пустое хранилище не даёт листа.
pub fn generate(bouquets: &Bouquets, lost_flowers: &LostFlowers, users: &UserDirectory) -> Workbook {
    let sheets = [
        bouquet_sheet(bouquets, users),
        lost_flowers_sheet(lost_flowers, users),
    ]
    .into_iter()
    .flatten()
    .collect();

    Workbook { sheets }
}

/// Записывает отчёт в xlsx-файл
pub fn render(workbook: &Workbook, path: &Path) -> Result<(), ReportError> {
    let mut xlsx = XlsxWorkbook::new();
    let header_format = Format::new().set_bold();

    for sheet in &workbook.sheets {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        for (index, row) in sheet.rows.iter().enumerate() {
            let row_num = index as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(text) => worksheet.write_string(row_num, col as u16, text)?,
                    Cell::Number(number) => worksheet.write_number(row_num, col as u16, *number)?,
                };
            }
        }

        worksheet.autofit();
    }

    xlsx.save(path)?;
    log::info!("📊 Report written to {}", path.display());
    Ok(())
}
