/// 経費機能モジュール
///
/// このモジュールは経費データに関するドメイン定義を提供します：
/// - 経費レコード・カテゴリ・入力DTO
/// - 入力のバリデーション
/// - 今日／直近7日間／今月の期間別集計
pub mod models;
pub mod summary;

// モデル
pub use models::{Category, Expense, ExpenseDraft, ExpenseInput};

// 集計
pub use summary::{summarize, summarize_now, totals_by_category, ExpenseSummary, SummaryWindows};
