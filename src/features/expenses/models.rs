use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{
    require_field, validate_amount, validate_date, validate_text_length, MAX_DESCRIPTION_LENGTH,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 経費カテゴリ（固定の列挙）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    Rent,
    Entertainment,
    Other,
}

impl Category {
    /// 表示順の全カテゴリ
    pub const ALL: [Category; 5] = [
        Category::Food,
        Category::Transport,
        Category::Rent,
        Category::Entertainment,
        Category::Other,
    ];

    /// ワイヤー形式の名前
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Rent => "Rent",
            Category::Entertainment => "Entertainment",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    /// 大文字小文字を区別せずに解析する
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                AppError::validation(format!(
                    "unknown category: {s} (expected Food, Transport, Rent, Entertainment or Other)"
                ))
            })
    }
}

/// 経費データモデル（リモートとの送受信形式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub amount: f64,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
}

impl Expense {
    /// 下書きとIDから経費を組み立てる
    pub fn from_draft(id: impl Into<String>, draft: ExpenseDraft) -> Self {
        Self {
            id: id.into(),
            amount: draft.amount,
            description: draft.description,
            category: draft.category,
            date: draft.date,
        }
    }

    /// 内容フィールドを検証する
    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::validation("Missing required field: id"));
        }
        validate_amount(self.amount)?;
        if self.description.trim().is_empty() {
            return Err(AppError::validation("Missing required field: description"));
        }
        validate_text_length(&self.description, MAX_DESCRIPTION_LENGTH, "description")?;
        validate_date(self.date)?;
        Ok(())
    }
}

/// IDを含まない経費の内容（ユーザー入力）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub amount: f64,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
}

impl From<&Expense> for ExpenseDraft {
    fn from(expense: &Expense) -> Self {
        Self {
            amount: expense.amount,
            description: expense.description.clone(),
            category: expense.category,
            date: expense.date,
        }
    }
}

/// 作成・更新リクエストのボディ
///
/// 必須項目の欠落を検出するため、すべてのフィールドをOptionで受け取る。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl ExpenseInput {
    /// 作成リクエストとして検証する（id を含む全項目が必須）
    pub fn into_new_expense(self) -> AppResult<Expense> {
        let id = require_field(self.id.filter(|id| !id.trim().is_empty()), "id")?;
        let draft = Self::into_draft(self.amount, self.description, self.category, self.date)?;
        let expense = Expense::from_draft(id, draft);
        expense.validate()?;
        Ok(expense)
    }

    /// 更新リクエストとして検証する（id はパスから与えられ、ボディの id は無視）
    pub fn into_update(self, id: &str) -> AppResult<Expense> {
        let draft = Self::into_draft(self.amount, self.description, self.category, self.date)?;
        let expense = Expense::from_draft(id, draft);
        expense.validate()?;
        Ok(expense)
    }

    fn into_draft(
        amount: Option<f64>,
        description: Option<String>,
        category: Option<Category>,
        date: Option<NaiveDate>,
    ) -> AppResult<ExpenseDraft> {
        Ok(ExpenseDraft {
            amount: require_field(amount, "amount")?,
            description: require_field(
                description.filter(|d| !d.trim().is_empty()),
                "description",
            )?,
            category: require_field(category, "category")?,
            date: require_field(date, "date")?,
        })
    }
}
