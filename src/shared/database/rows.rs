use crate::features::expenses::models::{Category, Expense};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::Row;

/// 経費テーブル共通のSELECT列（この順で `expense_from_row` が読む）
pub const EXPENSE_COLUMNS: &str = "id, amount, description, category, date";

/// 日付のSQLite保存形式
pub fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// 先頭5列から経費を復元する
pub fn expense_from_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let category: String = row.get(3)?;
    let date: String = row.get(4)?;

    Ok(Expense {
        id: row.get(0)?,
        amount: row.get(1)?,
        description: row.get(2)?,
        category: category
            .parse::<Category>()
            .map_err(|e| conversion_error(3, e))?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| conversion_error(4, e))?,
    })
}

fn conversion_error<E>(index: usize, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}
