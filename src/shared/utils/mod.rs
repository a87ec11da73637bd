use crate::shared::errors::{AppError, AppResult};
use chrono::{Datelike, NaiveDate};

/// 説明文の最大文字数
pub const MAX_DESCRIPTION_LENGTH: usize = 200;

/// 新しい経費IDを生成する
///
/// # 戻り値
/// UUID v4 の文字列表現
pub fn generate_expense_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 日付文字列のバリデーション
///
/// # 引数
/// * `date_str` - 日付文字列（YYYY-MM-DD形式）
///
/// # 戻り値
/// 解析済みの日付、または無効な場合はエラー
///
/// # バリデーション規則
/// - YYYY-MM-DD形式であること
/// - 実在する日付であること
/// - 1900年以降、2100年以前であること
pub fn parse_date(date_str: &str) -> AppResult<NaiveDate> {
    if date_str.len() != 10
        || date_str.chars().nth(4) != Some('-')
        || date_str.chars().nth(7) != Some('-')
    {
        return Err(AppError::validation("date must be in YYYY-MM-DD format"));
    }

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("invalid date: {date_str}")))?;

    validate_date(date)?;
    Ok(date)
}

/// 日付の範囲チェック
pub fn validate_date(date: NaiveDate) -> AppResult<()> {
    if !(1900..=2100).contains(&date.year()) {
        return Err(AppError::validation("date must be between 1900 and 2100"));
    }
    Ok(())
}

/// 金額のバリデーション
///
/// # バリデーション規則
/// - 有限の数値であること
/// - 0以上であること
/// - 10桁以内であること
pub fn validate_amount(amount: f64) -> AppResult<()> {
    if !amount.is_finite() {
        return Err(AppError::validation("amount must be a finite number"));
    }

    if amount < 0.0 {
        return Err(AppError::validation("amount must not be negative"));
    }

    if amount >= 10_000_000_000.0 {
        return Err(AppError::validation("amount must have at most 10 digits"));
    }

    Ok(())
}

/// 文字列の長さバリデーション
///
/// # 引数
/// * `text` - 検証対象の文字列
/// * `max_length` - 最大文字数
/// * `field_name` - フィールド名（エラーメッセージ用）
pub fn validate_text_length(text: &str, max_length: usize, field_name: &str) -> AppResult<()> {
    let char_count = text.chars().count();
    if char_count > max_length {
        return Err(AppError::validation(format!(
            "{field_name} must be at most {max_length} characters (got {char_count})"
        )));
    }
    Ok(())
}

/// 必須フィールドの取り出し
///
/// 欠けている場合は `Missing required field: <name>` のバリデーションエラー
pub fn require_field<T>(value: Option<T>, field_name: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::validation(format!("Missing required field: {field_name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_expense_id_uniqueness() {
        let id1 = generate_expense_id();
        let id2 = generate_expense_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );

        assert!(parse_date("2024/01/15").is_err());
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("1899-12-31").is_err());
        assert!(parse_date("24-1-15").is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(0.0).is_ok());
        assert!(validate_amount(12.5).is_ok());

        assert!(validate_amount(-0.01).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
        assert!(validate_amount(10_000_000_000.0).is_err());
    }

    #[test]
    fn test_validate_text_length() {
        assert!(validate_text_length("Coffee", 10, "description").is_ok());
        assert!(validate_text_length("コーヒー", 4, "description").is_ok());

        let result = validate_text_length("a".repeat(11).as_str(), 10, "description");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_require_field() {
        assert_eq!(require_field(Some(3), "amount").unwrap(), 3);

        let err = require_field::<f64>(None, "amount").unwrap_err();
        assert_eq!(err.user_message(), "Missing required field: amount");
    }
}
