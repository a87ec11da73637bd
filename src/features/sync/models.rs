use crate::features::expenses::models::Expense;
use crate::shared::errors::AppError;
use std::fmt;
use std::str::FromStr;

/// ローカルレコードの同期状態（リモートには送らない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// リモートと一致している
    Clean,
    /// まだリモートに作成されていない
    PendingCreate,
    /// ローカルの編集がリモートに未反映
    PendingUpdate,
    /// オフライン中に削除された（リモート確認待ちの墓標）
    PendingDelete,
}

impl SyncState {
    /// SQLiteに保存する名前
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Clean => "clean",
            SyncState::PendingCreate => "pending_create",
            SyncState::PendingUpdate => "pending_update",
            SyncState::PendingDelete => "pending_delete",
        }
    }

    pub fn is_pending(&self) -> bool {
        *self != SyncState::Clean
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clean" => Ok(SyncState::Clean),
            "pending_create" => Ok(SyncState::PendingCreate),
            "pending_update" => Ok(SyncState::PendingUpdate),
            "pending_delete" => Ok(SyncState::PendingDelete),
            other => Err(AppError::Database(format!("unknown sync state: {other}"))),
        }
    }
}

/// ローカルストア上のレコード
#[derive(Debug, Clone, PartialEq)]
pub struct LocalExpense {
    pub expense: Expense,
    pub state: SyncState,
}

impl LocalExpense {
    pub fn new(expense: Expense, state: SyncState) -> Self {
        Self { expense, state }
    }

    /// リモートと同期済みかどうか
    pub fn synced(&self) -> bool {
        self.state == SyncState::Clean
    }
}

/// 表示用の作業セットの1件
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseView {
    pub expense: Expense,
    /// 未同期の変更がある
    pub pending: bool,
}

impl ExpenseView {
    pub fn clean(expense: Expense) -> Self {
        Self {
            expense,
            pending: false,
        }
    }

    pub fn pending(expense: Expense) -> Self {
        Self {
            expense,
            pending: true,
        }
    }
}

/// 1回の送信スイープの結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// 反映に成功した件数
    pub pushed: usize,
    /// 失敗して保留のまま残った件数
    pub failed: usize,
    /// 通信エラーで途中終了したか
    pub aborted: bool,
}
