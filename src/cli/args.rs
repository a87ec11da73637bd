use crate::features::expenses::models::{Category, Expense, ExpenseDraft};
use crate::shared::errors::AppResult;
use crate::shared::utils::parse_date;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// 個人経費トラッカー（オフライン対応クライアント）
#[derive(Debug, Parser)]
#[command(name = "keihi")]
#[command(about = "Personal expense tracker that keeps working offline", long_about = None)]
pub struct Cli {
    /// Remote record service URL (overrides API_SERVER_URL)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Local database file (overrides KEIHI_LOCAL_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the merged expense list and summary
    List,

    /// Record a new expense
    Add(AddArgs),

    /// Change fields of an existing expense
    Edit(EditArgs),

    /// Delete an expense
    Delete {
        /// Expense ID
        id: String,
    },

    /// Show today / week / month totals and per-category totals
    Summary,

    /// Push pending changes and refresh from the remote service
    Sync,

    /// Keep probing the remote service and sync on every reconnect (Enter re-probes)
    Watch,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub amount: f64,

    #[arg(long)]
    pub description: String,

    #[arg(long, value_parser = parse_category)]
    pub category: Category,

    /// YYYY-MM-DD (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,
}

impl AddArgs {
    pub fn into_draft(self) -> ExpenseDraft {
        ExpenseDraft {
            amount: self.amount,
            description: self.description,
            category: self.category,
            date: self.date.unwrap_or_else(|| Local::now().date_naive()),
        }
    }
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Expense ID
    pub id: String,

    #[arg(long)]
    pub amount: Option<f64>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_category)]
    pub category: Option<Category>,

    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,
}

impl EditArgs {
    /// 指定されたフィールドだけを既存の値に上書きする
    pub fn apply_to(&self, existing: &Expense) -> ExpenseDraft {
        let mut draft = ExpenseDraft::from(existing);
        if let Some(amount) = self.amount {
            draft.amount = amount;
        }
        if let Some(description) = &self.description {
            draft.description = description.clone();
        }
        if let Some(category) = self.category {
            draft.category = category;
        }
        if let Some(date) = self.date {
            draft.date = date;
        }
        draft
    }
}

fn parse_category(raw: &str) -> AppResult<Category> {
    raw.parse()
}
