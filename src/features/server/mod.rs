/// 経費レコードサービス（リモート側）
///
/// `/expenses` に対するフラットなCRUDエンドポイント：
/// - リポジトリ（JSONファイル / SQLite）
/// - ルーティングとリクエスト処理
/// - hyperによる待ち受けループ
pub mod handlers;
pub mod http;
pub mod repository;

pub use http::{ExpenseServer, RunningServer};
pub use repository::{open_repository, ExpenseRepository, JsonFileRepository, SqliteRepository};
