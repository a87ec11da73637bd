// 端末表示用の整形

use crate::features::expenses::models::Category;
use crate::features::expenses::summary::ExpenseSummary;
use crate::features::sync::models::ExpenseView;
use std::fmt::Write;

/// 未同期レコードの印
pub const PENDING_MARKER: &str = "*";

/// 経費一覧を表形式で整形する
pub fn render_view(view: &[ExpenseView], online: bool) -> String {
    let mut out = String::new();
    let status = if online { "オンライン" } else { "オフライン" };
    let _ = writeln!(out, "[{status}] {}件", view.len());

    if view.is_empty() {
        let _ = writeln!(out, "経費はまだありません");
        return out;
    }

    let _ = writeln!(
        out,
        "  {:<36}  {:<10}  {:<13}  {:>12}  説明",
        "ID", "日付", "カテゴリ", "金額"
    );
    for item in view {
        let marker = if item.pending { PENDING_MARKER } else { " " };
        let expense = &item.expense;
        let _ = writeln!(
            out,
            "{marker} {:<36}  {}  {:<13}  {:>12.2}  {}",
            expense.id, expense.date, expense.category, expense.amount, expense.description
        );
    }

    if view.iter().any(|item| item.pending) {
        let _ = writeln!(out, "({PENDING_MARKER} = 未同期)");
    }
    out
}

/// 期間別合計を整形する
pub fn render_summary(summary: &ExpenseSummary) -> String {
    format!(
        "今日: {:.2}  直近7日間: {:.2}  今月: {:.2}\n",
        summary.today, summary.week, summary.month
    )
}

/// カテゴリ別合計を整形する
pub fn render_category_totals(totals: &[(Category, f64)]) -> String {
    let mut out = String::new();
    for (category, total) in totals {
        let _ = writeln!(out, "  {:<13}  {:>12.2}", category.as_str(), total);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::expenses::models::Expense;
    use chrono::NaiveDate;

    fn coffee() -> Expense {
        Expense {
            id: "1".to_string(),
            amount: 12.5,
            description: "Coffee".to_string(),
            category: Category::Food,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    #[test]
    fn test_pending_marker_is_shown() {
        let output = render_view(&[ExpenseView::pending(coffee())], false);
        assert!(output.starts_with("[オフライン] 1件"));
        assert!(output.contains("* 1"));
        assert!(output.contains("12.50"));
        assert!(output.contains("未同期"));
    }

    #[test]
    fn test_clean_rows_have_no_marker() {
        let output = render_view(&[ExpenseView::clean(coffee())], true);
        assert!(output.contains("  1 "));
        assert!(!output.contains("未同期"));
    }

    #[test]
    fn test_render_summary() {
        let summary = ExpenseSummary {
            today: 1.0,
            week: 2.5,
            month: 10.0,
        };
        assert_eq!(
            render_summary(&summary),
            "今日: 1.00  直近7日間: 2.50  今月: 10.00\n"
        );
    }

    #[test]
    fn test_render_category_totals() {
        let output = render_category_totals(&[(Category::Rent, 900.0)]);
        assert!(output.contains("Rent"));
        assert!(output.contains("900.00"));
    }
}
