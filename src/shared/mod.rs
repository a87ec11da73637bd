/// 共有モジュール
///
/// サーバーとクライアントの両方で使用される共通機能：
/// - エラーハンドリング
/// - 環境設定
/// - データベース接続
/// - ユーティリティ関数
pub mod config;
pub mod database;
pub mod errors;
pub mod utils;

pub use errors::{AppError, AppResult, ErrorSeverity};
