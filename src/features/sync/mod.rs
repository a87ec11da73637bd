/// オフライン/オンライン同期機能モジュール
///
/// ローカルストアとリモートサービスの照合を担う：
/// - ローカルSQLiteストアとレコードごとの同期状態
/// - リモートAPIクライアント
/// - 接続監視（定期プローブ・ナッジ・デバウンス）
/// - 送信スイープとマージ
pub mod connectivity;
pub mod local_store;
pub mod models;
pub mod reconciler;
pub mod remote;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use connectivity::{nudge_channel, Connectivity, ConnectivityHandle, ConnectivityMonitor};
pub use local_store::LocalStore;
pub use models::{ExpenseView, LocalExpense, PushReport, SyncState};
pub use reconciler::Reconciler;
pub use remote::{HttpExpenseApi, RemoteExpenseApi};
pub use service::SyncService;
