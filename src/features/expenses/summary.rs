// 期間別集計モジュール

use super::models::{Category, Expense};
use chrono::{Datelike, Duration, Local, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// 今日・直近7日間・今月の合計
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub today: f64,
    pub week: f64,
    pub month: f64,
}

/// 集計に使う3つの時間窓（すべて終端は `now`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryWindows {
    pub now: NaiveDateTime,
    pub day_start: NaiveDateTime,
    pub week_start: NaiveDateTime,
    pub month_start: NaiveDateTime,
}

impl SummaryWindows {
    /// ローカル時刻 `now` から時間窓を計算する
    pub fn at(now: NaiveDateTime) -> Self {
        let today = now.date();
        let first_of_month = today - Duration::days(i64::from(today.day0()));

        Self {
            now,
            day_start: today.and_time(NaiveTime::MIN),
            week_start: now - Duration::days(7),
            month_start: first_of_month.and_time(NaiveTime::MIN),
        }
    }

    /// 週の窓が月の窓に含まれるかどうか（月初から7日未満は含まれない）
    pub fn windows_nest(&self) -> bool {
        self.month_start <= self.week_start
    }

    fn contains(start: NaiveDateTime, end: NaiveDateTime, instant: NaiveDateTime) -> bool {
        start <= instant && instant <= end
    }
}

/// 経費の日付をその日のローカル0時として扱う
fn expense_instant(expense: &Expense) -> NaiveDateTime {
    expense.date.and_time(NaiveTime::MIN)
}

/// 指定時刻を基準に期間別の合計を計算する
///
/// キャッシュはせず、毎回作業セット全体から計算し直す。
pub fn summarize<'a, I>(expenses: I, now: NaiveDateTime) -> ExpenseSummary
where
    I: IntoIterator<Item = &'a Expense>,
{
    let windows = SummaryWindows::at(now);
    let mut summary = ExpenseSummary::default();

    for expense in expenses {
        let instant = expense_instant(expense);
        if SummaryWindows::contains(windows.day_start, windows.now, instant) {
            summary.today += expense.amount;
        }
        if SummaryWindows::contains(windows.week_start, windows.now, instant) {
            summary.week += expense.amount;
        }
        if SummaryWindows::contains(windows.month_start, windows.now, instant) {
            summary.month += expense.amount;
        }
    }

    summary
}

/// 現在のローカル時刻で集計する
pub fn summarize_now<'a, I>(expenses: I) -> ExpenseSummary
where
    I: IntoIterator<Item = &'a Expense>,
{
    summarize(expenses, Local::now().naive_local())
}

/// カテゴリ別の合計（全期間、金額のないカテゴリは除く）
pub fn totals_by_category<'a, I>(expenses: I) -> Vec<(Category, f64)>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut totals = [0.0_f64; Category::ALL.len()];
    let mut seen = [false; Category::ALL.len()];

    for expense in expenses {
        if let Some(index) = Category::ALL.iter().position(|c| *c == expense.category) {
            totals[index] += expense.amount;
            seen[index] = true;
        }
    }

    Category::ALL
        .iter()
        .zip(totals.iter().zip(seen.iter()))
        .filter(|(_, (_, seen))| **seen)
        .map(|(category, (total, _))| (*category, *total))
        .collect()
}
